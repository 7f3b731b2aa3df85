//! Years of experience: the model's total when it gives a usable one, else the
//! explicit per-position durations plus the merged union of dated positions.
//! A second total leaves internships out.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::dossier::parser::RawExperience;

static PRESENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(présent|present|aujourd'?hui|actuel|now|current|ce\s*jour|ongoing|en\s+cours)")
        .unwrap()
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// "03/2020", "3-2020", "03.2020"
static MONTH_SLASH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(0?[1-9]|1[0-2])\s*[/.\-]\s*(?:19|20)\d{2}\b").unwrap());

/// "2020-03", "2020/03"
static YEAR_DASH_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\s*[/\-]\s*(0[1-9]|1[0-2])\b").unwrap());

/// One amount of a duration, with an optional month unit: "2 ans", "6 mois", "3.5".
static DURATION_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:(mois|months?)\b)?").unwrap());

static INTERNSHIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(stage|stagiaire|intern|internship)\b").unwrap());

/// Longest believable career; anything above is a calendar year or noise.
const MAX_CAREER_YEARS: f64 = 60.0;

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("janvier", 1),
    ("feb", 2),
    ("february", 2),
    ("fév", 2),
    ("fev", 2),
    ("février", 2),
    ("fevrier", 2),
    ("mar", 3),
    ("march", 3),
    ("mars", 3),
    ("apr", 4),
    ("april", 4),
    ("avr", 4),
    ("avril", 4),
    ("may", 5),
    ("mai", 5),
    ("jun", 6),
    ("june", 6),
    ("juin", 6),
    ("jul", 7),
    ("july", 7),
    ("juil", 7),
    ("juillet", 7),
    ("aug", 8),
    ("august", 8),
    ("août", 8),
    ("aout", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("septembre", 9),
    ("oct", 10),
    ("october", 10),
    ("octobre", 10),
    ("nov", 11),
    ("november", 11),
    ("novembre", 11),
    ("dec", 12),
    ("december", 12),
    ("déc", 12),
    ("décembre", 12),
    ("decembre", 12),
];

/// Parses a free-form CV date. A bare year resolves to January for a start
/// date and December for an end date.
pub fn parse_cv_date(text: &str, is_end: bool, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if PRESENT.is_match(text) {
        return Some(today);
    }

    let year: i32 = YEAR.find(text)?.as_str().parse().ok()?;
    let month = month_in(text).unwrap_or(if is_end { 12 } else { 1 });
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_in(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let named = lower
        .split(|c: char| !c.is_alphabetic())
        .find_map(|token| MONTHS.iter().find(|(name, _)| *name == token))
        .map(|(_, month)| *month);
    if named.is_some() {
        return named;
    }

    MONTH_SLASH_YEAR
        .captures(text)
        .or_else(|| YEAR_DASH_MONTH.captures(text))
        .and_then(|caps| caps[1].parse().ok())
}

/// How the dates of one position resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySpan {
    /// Both ends known. `open_ended` when the end was missing or unreadable and
    /// the position is taken as still running.
    Dated {
        start: NaiveDate,
        end: NaiveDate,
        open_ended: bool,
    },
    MissingStart,
    /// End before start; left out of every total.
    Inverted,
}

impl EntrySpan {
    pub fn interval(self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            EntrySpan::Dated { start, end, .. } => Some((start, end)),
            _ => None,
        }
    }
}

/// Resolves the dates of one position against `today`.
pub fn entry_span(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> EntrySpan {
    let Some(start) = start.and_then(|start| parse_cv_date(start, false, today)) else {
        return EntrySpan::MissingStart;
    };
    let (end, open_ended) = match end.and_then(|end| parse_cv_date(end, true, today)) {
        Some(end) => (end, false),
        None => (today, true),
    };
    if end < start {
        EntrySpan::Inverted
    } else {
        EntrySpan::Dated {
            start,
            end,
            open_ended,
        }
    }
}

pub fn is_internship(role: &str) -> bool {
    INTERNSHIP.is_match(role)
}

fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = (end.year() - start.year()) as i64 * 12 + end.month() as i64 - start.month() as i64;
    months.max(0)
}

/// Duration of a span in years, to one decimal.
pub fn interval_years((start, end): (NaiveDate, NaiveDate)) -> f64 {
    (months_between(start, end) as f64 / 12.0 * 10.0).round() / 10.0
}

/// Sorts and merges overlapping spans.
pub fn merge_intervals(mut intervals: Vec<(NaiveDate, NaiveDate)>) -> Vec<(NaiveDate, NaiveDate)> {
    intervals.sort_by_key(|(start, _)| *start);

    let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// A duration in years from a number or text like "3.5 years", "18 mois" or
/// "2 ans 6 mois". Text naming a calendar year ("depuis 2015", "2019 - 2021")
/// is not a duration.
pub fn parse_duration(value: &Value) -> Option<f64> {
    let years = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            if YEAR.is_match(s) {
                return None;
            }
            let mut total = None;
            for caps in DURATION_PART.captures_iter(s) {
                let amount: f64 = caps[1].replace(',', ".").parse().ok()?;
                let part = if caps.get(2).is_some() {
                    amount / 12.0
                } else {
                    amount
                };
                total = Some(total.unwrap_or(0.0) + part);
            }
            total?
        }
        _ => return None,
    };
    (years.is_finite() && (0.0..=MAX_CAREER_YEARS).contains(&years)).then_some(years)
}

/// Explicit durations plus the merged union of positions known only by their dates.
fn derived_years<'a>(experience: impl Iterator<Item = &'a RawExperience> + Clone) -> f64 {
    let explicit: f64 = experience.clone().filter_map(|e| e.explicit_years).sum();
    let dated = experience
        .filter(|e| e.explicit_years.is_none())
        .filter_map(|e| e.span.interval())
        .collect();
    let months: i64 = merge_intervals(dated)
        .into_iter()
        .map(|(start, end)| months_between(start, end))
        .sum();

    explicit + months as f64 / 12.0
}

/// Total years of experience, rounded to the nearest integer. Never fails.
pub(crate) fn total_years(reported: Option<&Value>, experience: &[RawExperience]) -> u32 {
    match reported.and_then(parse_duration) {
        Some(total) => round_years(total),
        None => round_years(derived_years(experience.iter())),
    }
}

/// Years without internships. Equal to `total` when no position is an
/// internship, and never above it.
pub(crate) fn years_excluding_internships(experience: &[RawExperience], total: u32) -> u32 {
    if !experience.iter().any(|e| e.internship) {
        return total;
    }
    round_years(derived_years(experience.iter().filter(|e| !e.internship))).min(total)
}

fn round_years(years: f64) -> u32 {
    if years.is_finite() && years > 0.0 {
        years.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}
