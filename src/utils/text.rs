use std::fmt::Display;
use std::str::FromStr;

use crate::core::error::{Error, Result};

/// Returns the remainder of `line` after `key`, if the line starts with it.
pub fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim_start().strip_prefix(key).map(str::trim)
}

pub fn parse_value<T>(token: &str, line: usize) -> Result<T>
where
    T: FromStr,
{
    token
        .trim()
        .parse::<T>()
        .map_err(|_| Error::parse(line, format!("cannot parse '{}'", token.trim())))
}

pub fn parse_sequence<T>(text: &str, line: usize) -> Result<Vec<T>>
where
    T: FromStr,
{
    text.split_whitespace()
        .map(|token| parse_value(token, line))
        .collect()
}

/// Splits `"[a b c] rest"` into `("a b c", "rest")`.
pub fn split_bracketed(text: &str, line: usize) -> Result<(&str, &str)> {
    let text = text.trim_start();
    let body = text
        .strip_prefix('[')
        .ok_or_else(|| Error::parse(line, format!("expected '[' in '{text}'")))?;
    let close = body
        .find(']')
        .ok_or_else(|| Error::parse(line, format!("missing ']' in '{text}'")))?;
    Ok((&body[..close], body[close + 1..].trim_start()))
}

pub fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shortest round-trip form of `x`, switching to exponent notation for very
/// large or very small magnitudes so that e.g. `f64::MAX` stays readable.
pub fn format_number(x: f64) -> String {
    let a = x.abs();
    if a.is_finite() && a != 0.0 && !(1e-5..1e16).contains(&a) {
        format!("{x:e}")
    } else {
        format!("{x}")
    }
}

pub fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|&v| format_number(v))
        .collect::<Vec<_>>()
        .join(" ")
}
