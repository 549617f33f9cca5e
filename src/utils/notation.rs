//! Conversion between the fractional handicap notation and decimal lines.
//!
//! A token is a whole number of goals/runs followed by an optional fraction:
//!
//! | token  | line            |
//! |--------|-----------------|
//! | `N`    | N               |
//! | `N.k`  | N + 0.05k       |
//! | `N半`  | N + 0.50        |
//! | `N半k` | N + 0.50 + 0.05k|
//!
//! with `k` in 1..=9. The mapping is computed from the digits, so it works for
//! any whole part that fits in an `i64` line.

use crate::error::NotationError;
use crate::models::Line;

const HALF: char = '半';
const HALF_STEPS: i64 = 10;

/// Convert a handicap token to a decimal line.
///
/// Besides canonical tokens this accepts full-width digits, a leading sign,
/// `N/k` and `0k` as aliases for `N.k`/`0.k`, and `N.0` for `N`.
pub fn to_line(token: &str) -> Result<Line, NotationError> {
    let normalized = normalize(token);
    if normalized.is_empty() {
        return Err(NotationError::Empty);
    }

    let (negative, body) = match normalized.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, normalized.strip_prefix('+').unwrap_or(&normalized)),
    };

    let steps = parse_magnitude(body, token)?;
    Ok(Line::from_steps(if negative { -steps } else { steps }))
}

/// Convert a decimal line to its canonical handicap token
pub fn to_notation(line: Line) -> String {
    let steps = line.steps();
    let sign = if steps < 0 { "-" } else { "" };
    let magnitude = steps.unsigned_abs();
    let whole = magnitude / Line::STEPS_PER_UNIT as u64;
    let rem = magnitude % Line::STEPS_PER_UNIT as u64;

    match rem {
        0 => format!("{}{}", sign, whole),
        1..=9 => format!("{}{}.{}", sign, whole, rem),
        10 => format!("{}{}{}", sign, whole, HALF),
        _ => format!("{}{}{}{}", sign, whole, HALF, rem - HALF_STEPS as u64),
    }
}

/// True when `token` is already in the form `to_notation` produces
pub fn is_canonical(token: &str) -> bool {
    to_line(token).map_or(false, |line| to_notation(line) == token)
}

fn normalize(token: &str) -> String {
    token
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_digit(c as u32 - '０' as u32, 10).unwrap_or(c),
            '．' => '.',
            '／' => '/',
            '＋' => '+',
            '－' => '-',
            _ => c,
        })
        .collect()
}

fn parse_magnitude(body: &str, token: &str) -> Result<i64, NotationError> {
    if let Some((whole, frac)) = body.split_once(HALF) {
        let base = whole_steps(whole, token)?;
        let extra = if frac.is_empty() {
            0
        } else {
            fraction_digit(frac, token, 1)?
        };
        return base
            .checked_add(HALF_STEPS + extra)
            .ok_or_else(|| overflow(token));
    }

    if let Some((whole, frac)) = body.split_once('.') {
        let base = whole_steps(whole, token)?;
        let digit = fraction_digit(frac, token, 0)?;
        return base.checked_add(digit).ok_or_else(|| overflow(token));
    }

    if let Some((whole, frac)) = body.split_once('/') {
        let base = whole_steps(whole, token)?;
        let digit = fraction_digit(frac, token, 1)?;
        return base.checked_add(digit).ok_or_else(|| overflow(token));
    }

    // "02" shorthand for "0.2"
    if body.len() == 2 && body.starts_with('0') {
        return fraction_digit(&body[1..], token, 1);
    }

    whole_steps(body, token)
}

fn whole_steps(whole: &str, token: &str) -> Result<i64, NotationError> {
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unrecognized(token));
    }
    let units: i64 = whole.parse().map_err(|_| overflow(token))?;
    units
        .checked_mul(Line::STEPS_PER_UNIT)
        .ok_or_else(|| overflow(token))
}

/// A single fractional digit, each worth one 0.05 step
fn fraction_digit(frac: &str, token: &str, min: i64) -> Result<i64, NotationError> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unrecognized(token));
    }
    if frac.len() != 1 {
        return Err(NotationError::DigitOutOfRange {
            token: token.to_string(),
        });
    }
    let digit = i64::from(frac.as_bytes()[0] - b'0');
    if digit < min {
        return Err(NotationError::DigitOutOfRange {
            token: token.to_string(),
        });
    }
    Ok(digit)
}

fn unrecognized(token: &str) -> NotationError {
    NotationError::Unrecognized {
        token: token.to_string(),
    }
}

fn overflow(token: &str) -> NotationError {
    NotationError::Overflow {
        token: token.to_string(),
    }
}
