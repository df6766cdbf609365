// src/schedule/cron_expr.rs
use std::collections::BTreeSet;
use std::str::FromStr;

use cron::Schedule;

use super::ScheduleError;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const DAY_FULL_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Accepts classic 5-field crontab lines (minute first) as well as the
/// seconds-first 6/7-field form and `@daily`-style shorthands.
///
/// Numeric days of week use crontab numbering (0 and 7 are Sunday, 1 is
/// Monday). The `cron` crate counts from 1 = Sunday, so the day-of-week
/// field is rewritten to day names before it is handed over.
pub fn parse_cron(expr: &str) -> Result<Schedule, ScheduleError> {
    let trimmed = expr.trim();
    let invalid = |reason: String| ScheduleError::InvalidCronExpression {
        expression: expr.to_string(),
        reason,
    };

    let mut fields: Vec<String> = match trimmed.split_whitespace().count() {
        0 => return Err(invalid("expression is empty".into())),
        1 if trimmed.starts_with('@') => {
            return Schedule::from_str(trimmed).map_err(|e| invalid(e.to_string()))
        }
        5 => std::iter::once("0")
            .chain(trimmed.split_whitespace())
            .map(str::to_string)
            .collect(),
        6 | 7 => trimmed.split_whitespace().map(str::to_string).collect(),
        n => return Err(invalid(format!("expected 5, 6 or 7 fields, got {n}"))),
    };

    let days = day_of_week_names(&fields[5])
        .ok_or_else(|| invalid(format!("invalid day-of-week field `{}`", fields[5])))?;
    fields[5] = days;

    Schedule::from_str(&fields.join(" ")).map_err(|e| invalid(e.to_string()))
}

pub fn is_valid_cron(expr: &str) -> bool {
    parse_cron(expr).is_ok()
}

/// Day number in 0..=7 (7 kept as-is so `5-7` stays an ascending range).
fn day_number(token: &str) -> Option<u32> {
    if let Ok(n) = token.parse::<u32>() {
        return (n <= 7).then_some(n);
    }
    let lower = token.to_ascii_lowercase();
    DAY_NAMES
        .iter()
        .zip(DAY_FULL_NAMES)
        .position(|(short, full)| lower == short.to_ascii_lowercase() || lower == full)
        .map(|i| i as u32)
}

fn expand_day_part(part: &str) -> Option<Vec<u32>> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)?),
        None => (part, 1),
    };
    let (start, end) = match range {
        "*" | "?" => (0, 6),
        _ => match range.split_once('-') {
            Some((a, b)) => (day_number(a)?, day_number(b)?),
            // `a/n` runs from `a` through Saturday.
            None => {
                let d = day_number(range)?;
                (d, if part.contains('/') { d.max(6) } else { d })
            }
        },
    };
    if start > end {
        return None;
    }
    Some((start..=end).step_by(step).map(|d| d % 7).collect())
}

/// Rewrites a crontab day-of-week field into a list of day names.
fn day_of_week_names(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }
    let mut days = BTreeSet::new();
    for part in field.split(',') {
        days.extend(expand_day_part(part)?);
    }
    if days.is_empty() {
        return None;
    }
    Some(
        days.into_iter()
            .map(|d| DAY_NAMES[d as usize])
            .collect::<Vec<_>>()
            .join(","),
    )
}
