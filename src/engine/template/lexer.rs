//! Lexer -- splits template source into text runs and tokenized actions.

use crate::errors::{RecipeError, Result};

pub const LEFT_DELIM: &str = "{{";
pub const RIGHT_DELIM: &str = "}}";

/// Token inside a `{{ ... }}` action
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `.name` or `$name`
    Field(String),
    /// bare `.`
    Dot,
    Identifier(String),
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Pipe,
    OpenParen,
    CloseParen,
}

/// Top-level template item
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    Action(Vec<Token>),
}

/// Lexer for template source
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Split the whole source into items, applying `{{-` / `-}}` trim markers
    /// and dropping `{{/* comments */}}`.
    pub fn items(mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut trim_next_text = false;

        loop {
            let rest = &self.source[self.pos..];
            let Some(start) = rest.find(LEFT_DELIM) else {
                push_text(&mut items, rest, trim_next_text, false);
                break;
            };

            let mut body_start = self.pos + start + LEFT_DELIM.len();
            let trim_left = self.source[body_start..].starts_with("- ")
                || self.source[body_start..].starts_with("-\t")
                || self.source[body_start..].starts_with("-\n");
            if trim_left {
                body_start += 1;
            }
            push_text(&mut items, &rest[..start], trim_next_text, trim_left);

            let Some(end_rel) = self.source[body_start..].find(RIGHT_DELIM) else {
                return Err(RecipeError::TemplateSyntax(format!(
                    "unclosed action starting at byte {}",
                    self.pos + start
                )));
            };
            let mut body = &self.source[body_start..body_start + end_rel];
            self.pos = body_start + end_rel + RIGHT_DELIM.len();

            trim_next_text = false;
            if body.ends_with(" -") || body.ends_with("\t-") || body.ends_with("\n-") {
                body = &body[..body.len() - 1];
                trim_next_text = true;
            }

            let trimmed = body.trim();
            if trimmed.starts_with("/*") {
                if !trimmed.ends_with("*/") {
                    return Err(RecipeError::TemplateSyntax(
                        "unclosed comment".to_string(),
                    ));
                }
                continue;
            }
            if trimmed.is_empty() {
                return Err(RecipeError::TemplateSyntax("missing value for command".into()));
            }
            items.push(Item::Action(tokenize(trimmed)?));
        }

        Ok(items)
    }
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// Tokenize the inside of a single action
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        match ch {
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen);
                i += 1;
            }
            '"' => {
                let (s, next) = read_quoted(&chars, i)?;
                tokens.push(Token::String(s));
                i = next;
            }
            '`' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '`')
                    .ok_or_else(|| RecipeError::TemplateSyntax("unterminated raw string".into()))?;
                tokens.push(Token::String(chars[i + 1..i + 1 + close].iter().collect()));
                i += close + 2;
            }
            '.' | '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_field_char(chars[end]) {
                    end += 1;
                }
                if end == start {
                    if ch == '$' {
                        return Err(RecipeError::TemplateSyntax("bare '$' is not supported".into()));
                    }
                    tokens.push(Token::Dot);
                } else {
                    tokens.push(Token::Field(chars[start..end].iter().collect()));
                }
                i = end;
            }
            c if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars, i)) => {
                let start = i;
                i += 1;
                let mut is_float = false;
                while i < chars.len() {
                    let d = chars[i];
                    if d.is_ascii_digit() {
                        i += 1;
                    } else if d == '.' && !is_float && next_is_digit(&chars, i) {
                        is_float = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let token = if is_float {
                    text.parse::<f64>().map(Token::Float).ok()
                } else {
                    text.parse::<i64>().map(Token::Integer).ok()
                };
                tokens.push(token.ok_or_else(|| {
                    RecipeError::TemplateSyntax(format!("bad number syntax: {}", text))
                })?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Boolean(true),
                    "false" => Token::Boolean(false),
                    _ => Token::Identifier(word),
                });
            }
            other => {
                return Err(RecipeError::TemplateSyntax(format!(
                    "unexpected character {:?} in action",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)
}

fn read_quoted(chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut s = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((s, i + 1)),
            '\\' => {
                i += 1;
                match chars.get(i) {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(*c),
                    None => break,
                }
                i += 1;
            }
            c => {
                s.push(c);
                i += 1;
            }
        }
    }
    Err(RecipeError::TemplateSyntax("unterminated quoted string".into()))
}
