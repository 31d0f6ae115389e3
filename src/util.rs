use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Wire format used by the GitHub GraphQL API for timestamps.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| Error::Parse(format!("invalid timestamp: {s}")))
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub fn looks_like_timestamp(s: &str) -> bool {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT).is_ok()
}

pub fn add_days(t: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    t + Duration::days(days)
}

pub fn minus_days(t: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    t - Duration::days(days)
}

pub fn created_before(created: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    created < cutoff
}

pub fn created_after(created: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    created > cutoff
}

pub fn in_period(t: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= t && t <= end
}

/// Which repositories count towards a category, compared against each
/// repository's creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedFilter {
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    Between(DateTime<Utc>, DateTime<Utc>),
}

impl CreatedFilter {
    pub fn matches(&self, created: DateTime<Utc>) -> bool {
        match *self {
            CreatedFilter::Before(cutoff) => created_before(created, cutoff),
            CreatedFilter::After(cutoff) => created_after(created, cutoff),
            CreatedFilter::Between(start, end) => in_period(created, start, end),
        }
    }
}

static REPO_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.[^/]+/(?P<owner>[^/]+)/(?P<name>[^/]+?)/?$")
        .expect("repository link pattern is valid")
});

/// Extracts the owner login and repository name from a GitHub repository URL.
pub fn owner_and_name(link: &str) -> Result<(String, String)> {
    let captures = REPO_LINK
        .captures(link.trim())
        .ok_or_else(|| Error::Parse(format!("invalid repository link: {link}")))?;
    Ok((captures["owner"].to_string(), captures["name"].to_string()))
}
