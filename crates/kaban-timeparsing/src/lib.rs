//! Date expression parsing for the kaban board engine.
//!
//! One implementation of the relative-date mini-language, shared by the
//! scorers, the Markdown codec, and the front-ends:
//!
//! - ISO dates (`2024-06-15`) and RFC 3339 datetimes
//! - offset shorthands: `1h`, `2d`, `1w`, `3m` (months, 30-day approximation)
//! - `today`, `tomorrow`, `yesterday`
//! - `in N days` / `in N hours` / `in N weeks`
//! - weekday names, optionally with `next` or `last`
//!
//! Every expression is interpreted against an explicit `now` so that callers
//! (and tests) stay deterministic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

/// Error type for date expression parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("empty date expression")]
    Empty,

    #[error("unrecognized date expression: {0:?}")]
    Unrecognized(String),

    #[error("offset amount out of range in {0:?}")]
    OutOfRange(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, TimeParseError>;

/// Parses a date expression relative to `now`.
pub fn parse_date_expr(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = input.trim();
    if expr.is_empty() {
        return Err(TimeParseError::Empty);
    }
    let lower = expr.to_ascii_lowercase();

    // Absolute forms first.
    if let Ok(dt) = expr.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    // Named days.
    match lower.as_str() {
        "today" => return Ok(midnight(now.date_naive())),
        "tomorrow" => return Ok(midnight(now.date_naive() + Duration::days(1))),
        "yesterday" => return Ok(midnight(now.date_naive() - Duration::days(1))),
        _ => {}
    }

    // Offset shorthand: <N><unit> with unit in h/d/w/m.
    if let Some(result) = parse_offset(&lower, now)? {
        return Ok(result);
    }

    // "in N days" and friends.
    if let Some(rest) = lower.strip_prefix("in ") {
        if let Some(result) = parse_spelled_offset(rest, now)? {
            return Ok(result);
        }
    }

    // Weekday names, optionally prefixed with next/last.
    if let Some(result) = parse_weekday_expr(&lower, now) {
        return Ok(result);
    }

    Err(TimeParseError::Unrecognized(expr.to_string()))
}

/// Midnight UTC of the given date.
fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Parses `<N><unit>` shorthand. Returns `Ok(None)` if the shape does not
/// match, so other rules can try.
fn parse_offset(expr: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let Some((unit_idx, unit)) = expr.char_indices().last() else {
        return Ok(None);
    };
    let digits = &expr[..unit_idx];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    let n: i64 = digits
        .parse()
        .map_err(|_| TimeParseError::OutOfRange(expr.to_string()))?;
    let duration = match unit {
        'h' => Duration::hours(n),
        'd' => Duration::days(n),
        'w' => Duration::weeks(n),
        'm' => Duration::days(n * 30),
        _ => return Ok(None),
    };
    now.checked_add_signed(duration)
        .map(Some)
        .ok_or_else(|| TimeParseError::OutOfRange(expr.to_string()))
}

/// Parses `N days` / `N hours` / `N weeks` after an `in ` prefix.
fn parse_spelled_offset(rest: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let mut parts = rest.split_whitespace();
    let (Some(amount), Some(unit)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };
    if parts.next().is_some() {
        return Ok(None);
    }
    let Ok(n) = amount.parse::<i64>() else {
        return Ok(None);
    };
    let duration = match unit {
        "day" | "days" => Duration::days(n),
        "hour" | "hours" => Duration::hours(n),
        "week" | "weeks" => Duration::weeks(n),
        _ => return Ok(None),
    };
    now.checked_add_signed(duration)
        .map(Some)
        .ok_or_else(|| TimeParseError::OutOfRange(rest.to_string()))
}

/// Parses `monday`, `next tuesday`, `last friday`, ...
fn parse_weekday_expr(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (direction, name) = match expr.split_once(' ') {
        Some(("next", rest)) => (1, rest),
        Some(("last", rest)) => (-1, rest),
        Some(_) => return None,
        None => (1, expr),
    };
    let target = parse_weekday(name)?;
    let today = now.date_naive();
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;

    let date = if direction > 0 {
        // The coming occurrence, always strictly in the future.
        let mut ahead = (wanted - current).rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        today + Duration::days(ahead)
    } else {
        // The most recent occurrence, always strictly in the past.
        let mut back = (current - wanted).rem_euclid(7);
        if back == 0 {
            back = 7;
        }
        today - Duration::days(back)
    };
    Some(midnight(date))
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// 2024-06-12 was a Wednesday.
    fn fixed_now() -> DateTime<Utc> {
        "2024-06-12T10:30:00Z".parse().unwrap()
    }

    fn date(s: &str) -> DateTime<Utc> {
        midnight(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn iso_date() {
        assert_eq!(
            parse_date_expr("2024-06-15", fixed_now()).unwrap(),
            date("2024-06-15")
        );
    }

    #[test]
    fn rfc3339_datetime() {
        let dt = parse_date_expr("2024-06-15T08:00:00Z", fixed_now()).unwrap();
        assert_eq!(dt, "2024-06-15T08:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn named_days() {
        let now = fixed_now();
        assert_eq!(parse_date_expr("today", now).unwrap(), date("2024-06-12"));
        assert_eq!(
            parse_date_expr("tomorrow", now).unwrap(),
            date("2024-06-13")
        );
        assert_eq!(
            parse_date_expr("yesterday", now).unwrap(),
            date("2024-06-11")
        );
    }

    #[test]
    fn offset_shorthand() {
        let now = fixed_now();
        assert_eq!(parse_date_expr("1h", now).unwrap(), now + Duration::hours(1));
        assert_eq!(parse_date_expr("2d", now).unwrap(), now + Duration::days(2));
        assert_eq!(parse_date_expr("1w", now).unwrap(), now + Duration::weeks(1));
        assert_eq!(
            parse_date_expr("2m", now).unwrap(),
            now + Duration::days(60)
        );
    }

    #[test]
    fn spelled_offset() {
        let now = fixed_now();
        assert_eq!(
            parse_date_expr("in 3 days", now).unwrap(),
            now + Duration::days(3)
        );
        assert_eq!(
            parse_date_expr("in 1 week", now).unwrap(),
            now + Duration::weeks(1)
        );
    }

    #[test]
    fn weekdays() {
        let now = fixed_now(); // Wednesday
        assert_eq!(parse_date_expr("friday", now).unwrap(), date("2024-06-14"));
        assert_eq!(
            parse_date_expr("next friday", now).unwrap(),
            date("2024-06-14")
        );
        // Same weekday rolls a full week forward, never "today".
        assert_eq!(
            parse_date_expr("next wednesday", now).unwrap(),
            date("2024-06-19")
        );
        assert_eq!(
            parse_date_expr("last friday", now).unwrap(),
            date("2024-06-07")
        );
        assert_eq!(
            parse_date_expr("last wednesday", now).unwrap(),
            date("2024-06-05")
        );
    }

    #[test]
    fn case_insensitive() {
        let now = fixed_now();
        assert_eq!(
            parse_date_expr("Tomorrow", now).unwrap(),
            date("2024-06-13")
        );
        assert_eq!(
            parse_date_expr("NEXT MONDAY", now).unwrap(),
            date("2024-06-17")
        );
    }

    #[test]
    fn rejects_garbage() {
        let now = fixed_now();
        assert_eq!(parse_date_expr("", now), Err(TimeParseError::Empty));
        assert!(matches!(
            parse_date_expr("someday", now),
            Err(TimeParseError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_date_expr("12x", now),
            Err(TimeParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn deterministic_for_fixed_now() {
        let now = fixed_now();
        let a = parse_date_expr("in 3 days", now).unwrap();
        let b = parse_date_expr("in 3 days", now).unwrap();
        assert_eq!(a, b);
    }
}
