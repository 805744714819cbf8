//! Positional phrase formatting.
//!
//! Phrases use composite placeholders: `{0}`, `{1,8}` (right-aligned in 8
//! columns), `{1,-8}` (left-aligned) and `{0:spec}`. Parameters are plain
//! strings, so a format spec is accepted and ignored. `{{` and `}}` produce
//! literal braces.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unbalanced brace at position {0}")]
    UnbalancedBrace(usize),

    #[error("malformed placeholder '{{{0}}}'")]
    MalformedPlaceholder(String),

    #[error("placeholder index {index} is out of range for {count} parameter(s)")]
    IndexOutOfRange { index: usize, count: usize },
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*(?:,\s*(-?\d+)\s*)?(?::[^{}]*)?$").expect("placeholder pattern is valid")
    })
}

/// Substitute `params` into the placeholders of `template`.
pub fn format_positional<S: AsRef<str>>(template: &str, params: &[S]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let body_start = position + 1;
                let body_len = template[body_start..]
                    .find('}')
                    .ok_or(FormatError::UnbalancedBrace(position))?;
                let body = &template[body_start..body_start + body_len];
                out.push_str(&substitute(body, params)?);

                let closing = body_start + body_len;
                while matches!(chars.peek(), Some((i, _)) if *i <= closing) {
                    chars.next();
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::UnbalancedBrace(position));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn substitute<S: AsRef<str>>(body: &str, params: &[S]) -> Result<String, FormatError> {
    let malformed = || FormatError::MalformedPlaceholder(body.to_string());

    let captures = placeholder_pattern().captures(body).ok_or_else(malformed)?;
    let index: usize = captures[1].parse().map_err(|_| malformed())?;
    let value: &str = params
        .get(index)
        .map(|param| param.as_ref())
        .ok_or(FormatError::IndexOutOfRange {
            index,
            count: params.len(),
        })?;

    let Some(alignment) = captures.get(2) else {
        return Ok(value.to_string());
    };
    let alignment: i64 = alignment.as_str().parse().map_err(|_| malformed())?;
    // std formatting only accepts widths up to u16::MAX
    let width = u16::try_from(alignment.unsigned_abs()).map_err(|_| malformed())? as usize;

    Ok(if alignment < 0 {
        format!("{:<width$}", value, width = width)
    } else {
        format!("{:>width$}", value, width = width)
    })
}

/// Split a delimiter-joined parameter string, dropping empty pieces.
pub fn split_params(raw: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return if raw.is_empty() { Vec::new() } else { vec![raw.to_string()] };
    }

    raw.split(delimiter)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
