//! Parser -- turns lexer items into a tree of [`Node`]s.

use super::lexer::{Item, Token};
use crate::engine::value::Value;
use crate::errors::{RecipeError, Result};

/// Template tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// `cmd | cmd | cmd`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

/// One stage of a pipeline: a function call or a single operand
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Field(String),
    Dot,
    Function(String),
    Literal(Value),
    Sub(Pipeline),
}

/// How a nested list ended
#[derive(Debug, PartialEq)]
enum Terminator {
    Eof,
    End,
    Else,
    ElseIf(Pipeline),
}

/// Parser over lexer items
#[derive(Debug)]
pub struct Parser {
    items: Vec<Item>,
    pos: usize,
}

impl Parser {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items, pos: 0 }
    }

    /// Parse the full template
    pub fn parse(mut self) -> Result<Vec<Node>> {
        let (nodes, term) = self.parse_list()?;
        match term {
            Terminator::Eof => Ok(nodes),
            Terminator::End => Err(syntax("unexpected {{end}}")),
            Terminator::Else | Terminator::ElseIf(_) => Err(syntax("unexpected {{else}}")),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.get(self.pos).cloned() {
            self.pos += 1;
            match item {
                Item::Text(t) => nodes.push(Node::Text(t)),
                Item::Action(tokens) => match tokens.first() {
                    Some(Token::Identifier(kw)) if kw == "end" => {
                        expect_no_args(&tokens, "end")?;
                        return Ok((nodes, Terminator::End));
                    }
                    Some(Token::Identifier(kw)) if kw == "else" => {
                        return match tokens.get(1) {
                            None => Ok((nodes, Terminator::Else)),
                            Some(Token::Identifier(next)) if next == "if" => {
                                Ok((nodes, Terminator::ElseIf(parse_pipeline(&tokens[2..])?)))
                            }
                            Some(_) => Err(syntax("unexpected tokens after else")),
                        };
                    }
                    Some(Token::Identifier(kw)) if kw == "if" => {
                        let first = parse_pipeline(&tokens[1..])?;
                        nodes.push(self.parse_if(first)?);
                    }
                    Some(Token::Identifier(kw)) if kw == "range" => {
                        let pipeline = parse_pipeline(&tokens[1..])?;
                        nodes.push(self.parse_range(pipeline)?);
                    }
                    _ => nodes.push(Node::Action(parse_pipeline(&tokens)?)),
                },
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, first: Pipeline) -> Result<Node> {
        let mut branches = Vec::new();
        let mut condition = first;
        loop {
            let (body, term) = self.parse_list()?;
            branches.push((condition, body));
            match term {
                Terminator::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                Terminator::ElseIf(next) => condition = next,
                Terminator::Else => {
                    let (otherwise, term) = self.parse_list()?;
                    if term != Terminator::End {
                        return Err(syntax("expected {{end}} after {{else}}"));
                    }
                    return Ok(Node::If {
                        branches,
                        otherwise,
                    });
                }
                Terminator::Eof => return Err(syntax("unclosed {{if}}")),
            }
        }
    }

    fn parse_range(&mut self, pipeline: Pipeline) -> Result<Node> {
        let (body, term) = self.parse_list()?;
        let otherwise = match term {
            Terminator::End => Vec::new(),
            Terminator::Else => {
                let (otherwise, term) = self.parse_list()?;
                if term != Terminator::End {
                    return Err(syntax("expected {{end}} after {{else}}"));
                }
                otherwise
            }
            Terminator::ElseIf(_) => return Err(syntax("{{else if}} inside {{range}}")),
            Terminator::Eof => return Err(syntax("unclosed {{range}}")),
        };
        Ok(Node::Range {
            pipeline,
            body,
            otherwise,
        })
    }
}

fn syntax(msg: &str) -> RecipeError {
    RecipeError::TemplateSyntax(msg.to_string())
}

fn expect_no_args(tokens: &[Token], keyword: &str) -> Result<()> {
    if tokens.len() > 1 {
        return Err(syntax(&format!("unexpected tokens after {}", keyword)));
    }
    Ok(())
}

/// Parse a token slice into a pipeline
pub fn parse_pipeline(tokens: &[Token]) -> Result<Pipeline> {
    if tokens.is_empty() {
        return Err(syntax("missing value for command"));
    }

    let mut commands = Vec::new();
    let mut current: Vec<Arg> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Pipe => {
                if current.is_empty() {
                    return Err(syntax("missing command before '|'"));
                }
                commands.push(Command {
                    args: std::mem::take(&mut current),
                });
            }
            Token::OpenParen => {
                let close = matching_paren(tokens, i)?;
                current.push(Arg::Sub(parse_pipeline(&tokens[i + 1..close])?));
                i = close;
            }
            Token::CloseParen => return Err(syntax("unexpected ')'")),
            Token::Field(name) => current.push(Arg::Field(name.clone())),
            Token::Dot => current.push(Arg::Dot),
            Token::Identifier(name) => current.push(Arg::Function(name.clone())),
            Token::String(s) => current.push(Arg::Literal(Value::Str(s.clone()))),
            Token::Integer(n) => current.push(Arg::Literal(Value::Int(*n))),
            Token::Float(f) => current.push(Arg::Literal(Value::Float(*f))),
            Token::Boolean(b) => current.push(Arg::Literal(Value::Bool(*b))),
        }
        i += 1;
    }

    if current.is_empty() {
        return Err(syntax("missing command after '|'"));
    }
    commands.push(Command { args: current });

    Ok(Pipeline { commands })
}

fn matching_paren(tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (idx, tok) in tokens.iter().enumerate().skip(open) {
        match tok {
            Token::OpenParen => depth += 1,
            Token::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx);
                }
            }
            _ => {}
        }
    }
    Err(syntax("unclosed '('"))
}
