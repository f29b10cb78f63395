//! Value normalizers shared by every pipeline stage.
//!
//! Amounts are fixed-point integer cents throughout the engine; the float
//! world ends here.

use std::fmt;

use crate::sheet::CellValue;

/// An amount that could not be read as a currency value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountParseError {
    pub value: String,
}

impl fmt::Display for AmountParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse amount '{}'", self.value)
    }
}

impl std::error::Error for AmountParseError {}

/// Parse locale-formatted currency text into integer cents.
///
/// Strips the "R$" symbol, non-breaking spaces and blanks. When both "." and
/// "," appear, "." is the thousands separator and "," the decimal point; a
/// lone "," is the decimal point. The result is rounded half-up at two
/// decimal places.
pub fn parse_amount(text: &str) -> Result<i64, AmountParseError> {
    let mut s: String = text
        .replace("R$", "")
        .replace('\u{a0}', "")
        .replace(' ', "");
    if s.contains(',') && s.contains('.') {
        s = s.replace('.', "").replace(',', ".");
    } else if s.contains(',') {
        s = s.replace(',', ".");
    }
    cents_from_decimal_str(&s).ok_or_else(|| AmountParseError {
        value: text.to_string(),
    })
}

/// Zero-fallback boundary for row-level parsing: bad amounts count as zero,
/// per the recoverable error policy.
pub fn parse_amount_or_zero(text: &str) -> i64 {
    parse_amount(text).unwrap_or(0)
}

/// Cents from any cell: numbers are already decimal, text goes through the
/// locale-aware parser, everything else is zero.
pub fn cell_cents(cell: &CellValue) -> i64 {
    match cell {
        CellValue::Number(n) => cents_from_f64(*n),
        CellValue::Text(s) => parse_amount_or_zero(s),
        _ => 0,
    }
}

/// Cents from a float cell, rounded half-up at two decimal places.
pub fn cents_from_f64(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Canonical decimal rendering of cents: `-123456` → `"-1234.56"`.
pub fn cents_to_string(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Cents as the f64 value written into output cells.
pub fn cents_to_value(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Parse a canonical "1234.56"-style string into cents, rounding half-up on
/// a third decimal digit. `None` for anything that is not a plain decimal.
fn cents_from_decimal_str(s: &str) -> Option<i64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let digits: Vec<u8> = frac_part.bytes().map(|b| b - b'0').collect();
    let frac_cents = i64::from(*digits.first().unwrap_or(&0)) * 10
        + i64::from(*digits.get(1).unwrap_or(&0));
    let round_up = digits.get(2).is_some_and(|&d| d >= 5);

    let cents = whole.checked_mul(100)? + frac_cents + i64::from(round_up);
    Some(if negative { -cents } else { cents })
}

/// Normalize a name for fuzzy matching: uppercase, `.` `-` `/` become
/// spaces, whitespace runs collapse to one space. Idempotent and total.
pub fn normalize_name(name: &str) -> String {
    let replaced: String = name
        .to_uppercase()
        .chars()
        .map(|c| if matches!(c, '.' | '-' | '/') { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize header text for column matching: newlines become spaces, then
/// trim and uppercase.
pub fn normalize_header(text: &str) -> String {
    text.replace('\n', " ").trim().to_uppercase()
}

/// Normalize a process id cell.
pub fn clean_id(text: &str) -> String {
    text.trim().to_string()
}
