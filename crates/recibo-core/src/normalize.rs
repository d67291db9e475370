//! Cleanup of raw strings into numbers, dates and identifiers.
//!
//! Every function here is total: bad input degrades to `0`, an empty
//! string, or the input itself, never to an error.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::heuristics::patterns::{ASTERISKS, DATE_SPANISH_LONG, DATE_YMD, WHITESPACE};

/// Parse a loosely formatted amount.
///
/// Keeps digits, `.` and `-`; only the last decimal point survives, so
/// thousands separators written as commas or dots are dropped. A bare
/// leading `.` reads as `0.`. Anything unparseable is `0`.
///
/// ```
/// use recibo_core::normalize::coerce_number;
///
/// assert_eq!(coerce_number("$ 2,773.44"), 2773.44);
/// assert_eq!(coerce_number("abc"), 0.0);
/// ```
pub fn coerce_number(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let cleaned = match kept.rfind('.') {
        Some(last) => {
            let (int_part, frac_part) = kept.split_at(last);
            format!("{}{}", int_part.replace('.', ""), frac_part)
        }
        None => kept,
    };

    let cleaned = if let Some(rest) = cleaned.strip_prefix('.') {
        format!("0.{}", rest)
    } else if let Some(rest) = cleaned.strip_prefix("-.") {
        format!("-0.{}", rest)
    } else {
        cleaned
    };

    finite(cleaned.parse::<f64>().unwrap_or(0.0))
}

/// Coerce any JSON value to a finite number.
pub fn coerce_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => finite(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => coerce_number(s),
        _ => 0.0,
    }
}

/// Replace NaN and infinities with `0`.
pub fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Round to two decimals; non-finite values become `0`.
pub fn round_cents(value: f64) -> f64 {
    finite((value * 100.0).round() / 100.0)
}

/// JSON value as a trimmed string; numbers are printed, other types are empty.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Strip separators from a tax identifier and upper-case it.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalize a date to ISO `YYYY-MM-DD` when its reading is unambiguous.
///
/// Year-first numeric forms, RFC 3339 timestamps, English and Spanish
/// month names are converted. Day/month numeric forms such as `19/11/2024`
/// are returned unchanged since day-first and month-first readings cannot
/// be told apart in general. Unparseable input is returned trimmed.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    parse_date(trimmed)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    if let Some(caps) = DATE_YMD.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_SPANISH_LONG.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month = spanish_month_to_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    ["%B %d, %Y", "%B %d %Y", "%d %B %Y", "%b %d, %Y", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn spanish_month_to_number(month: &str) -> Option<u32> {
    let number = match month.to_lowercase().as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    Some(number)
}

/// Collapse whitespace and runs of asterisks in a line description.
pub fn clean_description(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw.trim(), " ");
    ASTERISKS.replace_all(&collapsed, "*").into_owned()
}

/// Upper-case and strip Spanish diacritics, for keyword matching.
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'Á' | 'à' | 'À' | 'ä' | 'Ä' => 'A',
            'é' | 'É' | 'è' | 'È' | 'ë' | 'Ë' => 'E',
            'í' | 'Í' | 'ì' | 'Ì' | 'ï' | 'Ï' => 'I',
            'ó' | 'Ó' | 'ò' | 'Ò' | 'ö' | 'Ö' => 'O',
            'ú' | 'Ú' | 'ù' | 'Ù' | 'ü' | 'Ü' => 'U',
            'ñ' | 'Ñ' => 'N',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}
