//! Template scanner and parser.
//!
//! The grammar is deliberately small: literal text interleaved with
//! `{{ ... }}` expressions, where an expression is either a dotted path
//! or a helper invocation with quoted-literal and path arguments.

use crate::error::{RuleError, RuleResult};
use crate::template::helpers;

/// One argument to a helper invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Double-quoted string literal.
    Literal(String),
    /// Bare dotted path resolved against the context.
    Path(String),
}

/// One parsed `{{ ... }}` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted path interpolation.
    Path(String),
    /// Helper invocation with arguments.
    Helper {
        /// Registered helper name.
        name: String,
        /// Arguments in source order.
        args: Vec<Arg>,
    },
}

/// A template segment: literal text or an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Verbatim text.
    Text(String),
    /// A `{{ ... }}` expression.
    Expr(Expr),
}

/// Check whether a string contains template syntax at all.
pub fn is_template(s: &str) -> bool {
    s.contains("{{")
}

/// Parse a template string into segments.
pub fn parse(template: &str) -> RuleResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            RuleError::Template(format!("Unterminated expression in template: {}", template))
        })?;
        segments.push(Segment::Expr(parse_expr(after[..end].trim())?));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }

    Ok(segments)
}

fn parse_expr(inner: &str) -> RuleResult<Expr> {
    let tokens = tokenize(inner)?;

    match tokens.split_first() {
        None => Err(RuleError::Template(
            "Empty template expression".to_string(),
        )),
        Some((Token::Quoted(_), _)) => Err(RuleError::Template(format!(
            "Expression cannot start with a string literal: {}",
            inner
        ))),
        Some((Token::Word(first), rest)) => {
            if !helpers::is_helper(first) {
                if !rest.is_empty() {
                    return Err(RuleError::Template(format!("Unknown helper: {}", first)));
                }
                if !is_valid_path(first) {
                    return Err(RuleError::Template(format!(
                        "Invalid path expression: {}",
                        first
                    )));
                }
                return Ok(Expr::Path(first.clone()));
            }

            if !helpers::arity_ok(first, rest.len()) {
                return Err(RuleError::Template(format!(
                    "Helper '{}' called with {} argument(s)",
                    first,
                    rest.len()
                )));
            }

            let args = rest
                .iter()
                .map(|token| match token {
                    Token::Quoted(s) => Ok(Arg::Literal(s.clone())),
                    Token::Word(word) => {
                        if !is_valid_path(word) {
                            return Err(RuleError::Template(format!(
                                "Invalid path argument: {}",
                                word
                            )));
                        }
                        Ok(Arg::Path(word.clone()))
                    }
                })
                .collect::<RuleResult<Vec<_>>>()?;

            Ok(Expr::Helper {
                name: first.clone(),
                args,
            })
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

fn tokenize(input: &str) -> RuleResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            tokens.push(Token::Quoted(read_quoted(&mut chars, input)?));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

/// Read a quoted literal after its opening quote. `\"` and `\\` unescape;
/// any other escape is kept verbatim so regex classes like `\d` survive.
fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    input: &str,
) -> RuleResult<String> {
    let mut value = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Ok(value),
            '\\' => match chars.next() {
                Some('\\') => value.push('\\'),
                Some('"') => value.push('"'),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => {
                    return Err(RuleError::Template(format!(
                        "Unterminated escape in expression: {}",
                        input
                    )));
                }
            },
            other => value.push(other),
        }
    }

    Err(RuleError::Template(format!(
        "Unterminated string literal in expression: {}",
        input
    )))
}

/// Path segments are identifiers or bare array indices.
fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            if segment.is_empty() {
                return false;
            }
            if segment.chars().all(|c| c.is_ascii_digit()) {
                return true;
            }
            let starts_ok = segment
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic() || c == '_')
                .unwrap_or(false);
            starts_ok
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
