//! Built-in template functions.
//!
//! String helpers take their subject as the LAST argument so they compose in
//! pipelines: `{{ .csv | split "," | join " " }}`.

use colored::Colorize;
use rand::Rng;
use regex::Regex;

use super::TemplateData;
use crate::engine::background::TaskStatus;
use crate::engine::value::{split_lines, Value};

type CallResult = std::result::Result<Value, String>;

/// Invoke a function by name
pub fn call(name: &str, args: &[Value], data: &dyn TemplateData) -> CallResult {
    match name {
        // strings
        "split" => {
            let (sep, s) = two_str(name, args)?;
            if sep.is_empty() {
                return Ok(Value::List(s.chars().map(String::from).collect()));
            }
            Ok(Value::List(s.split(sep.as_str()).map(str::to_string).collect()))
        }
        "join" => {
            arity(name, args, 2)?;
            Ok(Value::Str(args[1].as_list().join(&args[0].render())))
        }
        "trim" => Ok(Value::Str(one(name, args)?.render().trim().to_string())),
        "trimPrefix" => {
            let (p, s) = two_str(name, args)?;
            Ok(Value::Str(s.strip_prefix(p.as_str()).unwrap_or(&s).to_string()))
        }
        "trimSuffix" => {
            let (p, s) = two_str(name, args)?;
            Ok(Value::Str(s.strip_suffix(p.as_str()).unwrap_or(&s).to_string()))
        }
        "replace" => {
            arity(name, args, 3)?;
            Ok(Value::Str(
                args[2].render().replace(&args[0].render(), &args[1].render()),
            ))
        }
        "contains" => {
            let (sub, s) = two_str(name, args)?;
            Ok(Value::Bool(s.contains(sub.as_str())))
        }
        "hasPrefix" => {
            let (p, s) = two_str(name, args)?;
            Ok(Value::Bool(s.starts_with(p.as_str())))
        }
        "hasSuffix" => {
            let (p, s) = two_str(name, args)?;
            Ok(Value::Bool(s.ends_with(p.as_str())))
        }
        "upper" => Ok(Value::Str(one(name, args)?.render().to_uppercase())),
        "lower" => Ok(Value::Str(one(name, args)?.render().to_lowercase())),
        "lines" => Ok(Value::List(split_lines(&one(name, args)?.render()))),
        "grep" => {
            let (pattern, s) = two_str(name, args)?;
            let re = Regex::new(&pattern).map_err(|e| format!("invalid pattern: {}", e))?;
            let kept: Vec<&str> = s.lines().filter(|l| re.is_match(l)).collect();
            Ok(Value::Str(kept.join("\n")))
        }
        "cut" => {
            arity(name, args, 3)?;
            let delim = args[0].render();
            let field = args[1]
                .as_i64()
                .ok_or_else(|| format!("field must be an integer, got {:?}", args[1].render()))?;
            if field < 1 {
                return Err("field numbers start at 1".to_string());
            }
            let picked: Vec<String> = args[2]
                .render()
                .lines()
                .map(|line| {
                    line.split(delim.as_str())
                        .nth(field as usize - 1)
                        .unwrap_or("")
                        .to_string()
                })
                .collect();
            Ok(Value::Str(picked.join("\n")))
        }
        "len" => Ok(Value::Int(match one(name, args)? {
            Value::List(items) => items.len() as i64,
            other => other.render().chars().count() as i64,
        })),
        "default" => {
            arity(name, args, 2)?;
            if args[1].is_truthy() {
                Ok(args[1].clone())
            } else {
                Ok(args[0].clone())
            }
        }
        "printf" => {
            let (fmt, rest) = args
                .split_first()
                .ok_or_else(|| "printf needs a format string".to_string())?;
            Ok(Value::Str(sprintf(&fmt.render(), rest)?))
        }

        // arithmetic
        "add" => fold(name, args, |a, b| a + b),
        "sub" => {
            let (a, b) = two_num(name, args)?;
            Ok(Value::number(a - b))
        }
        "mul" => fold(name, args, |a, b| a * b),
        "div" => {
            let (a, b) = two_num(name, args)?;
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok(Value::number(a / b))
        }
        "mod" => {
            let (a, b) = two_num(name, args)?;
            if b == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok(Value::number(a % b))
        }
        "round" => {
            let (x, places) = with_places(name, args, 0)?;
            let factor = 10f64.powi(places);
            Ok(Value::number((x * factor).round() / factor))
        }
        "ceil" => Ok(Value::number(num(name, one(name, args)?)?.ceil())),
        "floor" => Ok(Value::number(num(name, one(name, args)?)?.floor())),
        "abs" => Ok(Value::number(num(name, one(name, args)?)?.abs())),
        "min" => fold(name, args, f64::min),
        "max" => fold(name, args, f64::max),
        "pow" => {
            let (a, b) = two_num(name, args)?;
            Ok(Value::number(a.powf(b)))
        }
        "sqrt" => {
            let x = num(name, one(name, args)?)?;
            if x < 0.0 {
                return Err("square root of a negative number".to_string());
            }
            Ok(Value::number(x.sqrt()))
        }
        "log" => {
            let x = num(name, one(name, args)?)?;
            if x <= 0.0 {
                return Err("logarithm of a non-positive number".to_string());
            }
            Ok(Value::number(x.ln()))
        }
        "percent" => {
            let (part, total) = two_num(name, args)?;
            if total == 0.0 {
                return Ok(Value::Int(0));
            }
            Ok(Value::number(part / total * 100.0))
        }
        "percentf" => {
            if args.len() != 2 && args.len() != 3 {
                return Err(format!("expected 2 or 3 arguments, got {}", args.len()));
            }
            let part = num(name, &args[0])?;
            let total = num(name, &args[1])?;
            let places = match args.get(2) {
                Some(p) => p
                    .as_i64()
                    .filter(|p| (0..=10).contains(p))
                    .ok_or_else(|| "places must be an integer between 0 and 10".to_string())?
                    as usize,
                None => 1,
            };
            let pct = if total == 0.0 { 0.0 } else { part / total * 100.0 };
            Ok(Value::Str(format!("{:.*}%", places, pct)))
        }
        "randInt" => {
            arity(name, args, 2)?;
            let lo = int(name, &args[0])?;
            let hi = int(name, &args[1])?;
            if lo > hi {
                return Err(format!("min {} is greater than max {}", lo, hi));
            }
            Ok(Value::Int(rand::rng().random_range(lo..=hi)))
        }

        // comparison and logic
        "eq" => {
            let (a, b) = two(name, args)?;
            Ok(Value::Bool(loose_eq(a, b)))
        }
        "ne" => {
            let (a, b) = two(name, args)?;
            Ok(Value::Bool(!loose_eq(a, b)))
        }
        "lt" => compare(name, args, |a, b| a < b),
        "le" => compare(name, args, |a, b| a <= b),
        "gt" => compare(name, args, |a, b| a > b),
        "ge" => compare(name, args, |a, b| a >= b),
        "and" => Ok(Value::Bool(!args.is_empty() && args.iter().all(Value::is_truthy))),
        "or" => Ok(Value::Bool(args.iter().any(Value::is_truthy))),
        "not" => Ok(Value::Bool(!one(name, args)?.is_truthy())),

        // color
        "color" => {
            let (color, s) = two_str(name, args)?;
            Ok(styled(data, s, |t| t.color(color.as_str()).to_string()))
        }
        "bold" => Ok(styled(data, one(name, args)?.render(), |t| t.bold().to_string())),
        "dim" => Ok(styled(data, one(name, args)?.render(), |t| t.dimmed().to_string())),
        "italic" => Ok(styled(data, one(name, args)?.render(), |t| t.italic().to_string())),
        "underline" => Ok(styled(data, one(name, args)?.render(), |t| {
            t.underline().to_string()
        })),
        "red" | "green" | "yellow" | "blue" | "magenta" | "cyan" => Ok(styled(
            data,
            one(name, args)?.render(),
            |t| t.color(name).to_string(),
        )),

        // background tasks
        "taskStatus" => {
            let id = one(name, args)?.render();
            Ok(Value::Str(
                data.task(&id)
                    .map(|t| t.status.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ))
        }
        "taskOutput" => {
            let id = one(name, args)?.render();
            Ok(Value::Str(data.task(&id).map(|t| t.output).unwrap_or_default()))
        }
        "taskError" => {
            let id = one(name, args)?.render();
            Ok(Value::Str(data.task(&id).map(|t| t.error).unwrap_or_default()))
        }
        "taskDone" => {
            let id = one(name, args)?.render();
            Ok(Value::Bool(
                data.task(&id)
                    .map(|t| t.status != TaskStatus::Pending)
                    .unwrap_or(false),
            ))
        }
        "tasksPending" => {
            arity(name, args, 0)?;
            Ok(Value::Int(data.pending_tasks() as i64))
        }

        _ => Err(format!("function {:?} not defined", name)),
    }
}

fn styled(data: &dyn TemplateData, text: String, paint: impl Fn(&str) -> String) -> Value {
    if data.color_enabled() {
        Value::Str(paint(&text))
    } else {
        Value::Str(text)
    }
}

fn arity(name: &str, args: &[Value], n: usize) -> std::result::Result<(), String> {
    if args.len() != n {
        return Err(format!(
            "{} expects {} argument{}, got {}",
            name,
            n,
            if n == 1 { "" } else { "s" },
            args.len()
        ));
    }
    Ok(())
}

fn one<'a>(name: &str, args: &'a [Value]) -> std::result::Result<&'a Value, String> {
    arity(name, args, 1)?;
    Ok(&args[0])
}

fn two<'a>(name: &str, args: &'a [Value]) -> std::result::Result<(&'a Value, &'a Value), String> {
    arity(name, args, 2)?;
    Ok((&args[0], &args[1]))
}

fn two_str(name: &str, args: &[Value]) -> std::result::Result<(String, String), String> {
    let (a, b) = two(name, args)?;
    Ok((a.render(), b.render()))
}

fn num(name: &str, v: &Value) -> std::result::Result<f64, String> {
    v.as_f64()
        .ok_or_else(|| format!("{} expects a number, got {:?}", name, v.render()))
}

fn int(name: &str, v: &Value) -> std::result::Result<i64, String> {
    v.as_i64()
        .ok_or_else(|| format!("{} expects an integer, got {:?}", name, v.render()))
}

fn two_num(name: &str, args: &[Value]) -> std::result::Result<(f64, f64), String> {
    let (a, b) = two(name, args)?;
    Ok((num(name, a)?, num(name, b)?))
}

fn fold(name: &str, args: &[Value], f: impl Fn(f64, f64) -> f64) -> CallResult {
    if args.len() < 2 {
        return Err(format!("{} expects at least 2 arguments, got {}", name, args.len()));
    }
    let mut acc = num(name, &args[0])?;
    for arg in &args[1..] {
        acc = f(acc, num(name, arg)?);
    }
    Ok(Value::number(acc))
}

fn with_places(name: &str, args: &[Value], default: i32) -> std::result::Result<(f64, i32), String> {
    match args {
        [x] => Ok((num(name, x)?, default)),
        [x, places] => {
            let p = int(name, places)?;
            if !(0..=15).contains(&p) {
                return Err("places must be between 0 and 15".to_string());
            }
            Ok((num(name, x)?, p as i32))
        }
        _ => Err(format!("{} expects 1 or 2 arguments, got {}", name, args.len())),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if !matches!(a, Value::Str(_)) || !matches!(b, Value::Str(_)) => x == y,
        _ => a.render() == b.render(),
    }
}

fn compare(name: &str, args: &[Value], f: impl Fn(f64, f64) -> bool) -> CallResult {
    let (a, b) = two_num(name, args)?;
    Ok(Value::Bool(f(a, b)))
}

/// Minimal printf: `%s %v %d %f %.Nf %%`
fn sprintf(fmt: &str, args: &[Value]) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_arg = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = digits.parse().ok();
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v' | 'd' | 'f')) => {
                let arg = next_arg
                    .next()
                    .ok_or_else(|| format!("missing argument for %{}", verb))?;
                match verb {
                    'd' => out.push_str(&int("printf", arg)?.to_string()),
                    'f' => {
                        let f = num("printf", arg)?;
                        out.push_str(&format!("{:.*}", precision.unwrap_or(6), f));
                    }
                    _ => out.push_str(&arg.render()),
                }
            }
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    Ok(out)
}
