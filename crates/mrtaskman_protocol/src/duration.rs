//! Parsing for the human-friendly duration strings used in task configs
//! (`"12m"`, `"2h30m"`, `"90s"`). Ported from the original `parsetime.ParseTimeDelta`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("empty duration string")]
    Empty,
    #[error("invalid duration component '{0}' in '{1}'")]
    InvalidComponent(String, String),
    #[error("unknown duration unit '{0}' in '{1}'")]
    UnknownUnit(char, String),
}

/// Parses a duration string made of `<number><unit>` runs, e.g. `"2h30m"`,
/// `"12m"`, `"45s"`. Units: `h` (hours), `m` (minutes), `s` (seconds). Runs may
/// be combined in any order but each unit should appear at most once.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut number = String::new();

    for ch in trimmed.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }

        if number.is_empty() {
            return Err(DurationParseError::InvalidComponent(
                ch.to_string(),
                trimmed.to_string(),
            ));
        }

        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::InvalidComponent(number.clone(), trimmed.to_string()))?;
        number.clear();

        let seconds = match ch {
            'h' => value * 3600.0,
            'm' => value * 60.0,
            's' => value,
            other => return Err(DurationParseError::UnknownUnit(other, trimmed.to_string())),
        };

        total += Duration::from_secs_f64(seconds);
    }

    if !number.is_empty() {
        return Err(DurationParseError::InvalidComponent(
            number,
            trimmed.to_string(),
        ));
    }

    Ok(total)
}
