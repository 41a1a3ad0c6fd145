//! Field normalization for extracted listings.
//!
//! Listing text arrives with relative dates, decorative emoji and optional
//! salary annotations. These helpers turn it into canonical values. None of
//! them fail: anything unparseable falls back to a documented default, and the
//! only hard boundary left is [`NewJob::validate`].

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{NewJob, RawCandidate};

/// Absolute date formats, tried in order.
const DATE_FORMATS: [&str; 3] = ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"];

/// Markers that mean "posted recently"; they resolve to ingestion time.
const RELATIVE_MARKERS: [&str; 2] = ["h ago", "d ago"];

const LOCATION_GLYPHS: [char; 5] = ['🏠', '📍', '🌍', '🌎', '🌏'];
const SALARY_GLYPHS: [char; 3] = ['💰', '💵', '💲'];

pub const DEFAULT_LOCATION: &str = "Remote";
pub const MISSING_TEXT: &str = "N/A";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Resolve a posting date, falling back to `now` for relative or unknown text.
///
/// # Arguments
///
/// * `raw` - Date text as printed on the card, if the card had one
/// * `now` - Ingestion timestamp used for relative or unparseable dates
///
/// # Returns
///
/// Midnight of the parsed calendar date, or `now` when the text is missing,
/// relative (`"2h ago"`, `"3d ago"`) or in none of the known formats.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_posting_date(Some("2h ago"), now), now);
/// assert_eq!(parse_posting_date(Some("2024-01-05"), now).to_string(), "2024-01-05 00:00:00");
/// ```
pub fn parse_posting_date(raw: Option<&str>, now: NaiveDateTime) -> NaiveDateTime {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return now;
    };
    if RELATIVE_MARKERS.iter().any(|marker| text.contains(marker)) {
        return now;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| {
            debug!(raw = text, "Unrecognised posting date; using ingestion time");
            now
        })
}

/// Trim every tag. Order and duplicates are kept.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| tag.trim().to_string()).collect()
}

/// Strip location glyphs and collapse whitespace. Nothing left means remote.
pub fn normalize_location(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !LOCATION_GLYPHS.contains(c)).collect();
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        DEFAULT_LOCATION.to_string()
    } else {
        collapsed.into_owned()
    }
}

/// Strip currency glyphs. Blank salaries are treated as absent.
pub fn normalize_salary(raw: Option<&str>) -> Option<String> {
    let stripped: String = raw?.chars().filter(|c| !SALARY_GLYPHS.contains(c)).collect();
    let trimmed = stripped.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Fold the salary annotation into the description.
pub fn compose_description(salary: Option<&str>, description: &str) -> String {
    format!("Salary: {}\n\n{}", salary.unwrap_or(MISSING_TEXT), description)
}

/// Build a staged job from a candidate and its detail description.
///
/// The result is not validated yet; see [`NewJob::validate`].
pub fn normalize_candidate(
    candidate: &RawCandidate,
    description: &str,
    job_type: &str,
    now: NaiveDateTime,
) -> NewJob {
    let salary = normalize_salary(candidate.salary.as_deref());
    NewJob {
        title: candidate.title.trim().to_string(),
        company: candidate.company.trim().to_string(),
        location: normalize_location(&candidate.location),
        job_type: job_type.trim().to_string(),
        posting_date: parse_posting_date(candidate.posted.as_deref(), now),
        tags: normalize_tags(&candidate.tags),
        description: compose_description(salary.as_deref(), description),
        url: candidate.detail_url.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_relative_dates_resolve_to_now() {
        assert_eq!(parse_posting_date(Some("2h ago"), now()), now());
        assert_eq!(parse_posting_date(Some("3d ago"), now()), now());
    }

    #[test]
    fn test_unparseable_or_missing_dates_resolve_to_now() {
        assert_eq!(parse_posting_date(Some("garbage"), now()), now());
        assert_eq!(parse_posting_date(Some("   "), now()), now());
        assert_eq!(parse_posting_date(None, now()), now());
        assert_eq!(parse_posting_date(Some("February 30, 2024"), now()), now());
    }

    #[test]
    fn test_absolute_dates_parse_at_midnight() {
        assert_eq!(
            parse_posting_date(Some("January 5, 2024"), now()),
            midnight(2024, 1, 5)
        );
        assert_eq!(
            parse_posting_date(Some("Jan 05, 2024"), now()),
            midnight(2024, 1, 5)
        );
        assert_eq!(
            parse_posting_date(Some(" 2023-11-30 "), now()),
            midnight(2023, 11, 30)
        );
    }

    #[test]
    fn test_tags_are_trimmed_not_deduplicated() {
        let tags = vec![" Life ".to_string(), "P&C".to_string(), "Life".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["Life", "P&C", "Life"]);
        assert!(normalize_tags(&[]).is_empty());
    }

    #[test]
    fn test_location_glyphs_and_fallback() {
        assert_eq!(normalize_location("🏠 United   Kingdom "), "United Kingdom");
        assert_eq!(normalize_location("🏠"), "Remote");
        assert_eq!(normalize_location("  "), "Remote");
    }

    #[test]
    fn test_salary_folding() {
        let salary = normalize_salary(Some("💰 $50,000 "));
        assert_eq!(salary.as_deref(), Some("$50,000"));
        assert_eq!(
            compose_description(salary.as_deref(), "Great role"),
            "Salary: $50,000\n\nGreat role"
        );
        assert_eq!(
            compose_description(None, "Great role"),
            "Salary: N/A\n\nGreat role"
        );
        assert_eq!(normalize_salary(Some("💰")), None);
        assert_eq!(normalize_salary(None), None);
    }

    #[test]
    fn test_normalize_candidate() {
        let candidate = RawCandidate {
            title: " Senior Actuary ".to_string(),
            company: "Acme Life".to_string(),
            location: "🏠".to_string(),
            detail_url: "https://www.actuarylist.com/actuarial-jobs/42".to_string(),
            tags: vec![" Life ".to_string()],
            salary: Some("$50,000".to_string()),
            posted: Some("January 5, 2024".to_string()),
        };
        let job = normalize_candidate(&candidate, "Great role", "Full-time", now());
        assert_eq!(job.title, "Senior Actuary");
        assert_eq!(job.location, "Remote");
        assert_eq!(job.tags, vec!["Life"]);
        assert_eq!(job.posting_date, midnight(2024, 1, 5));
        assert_eq!(job.description, "Salary: $50,000\n\nGreat role");
        assert_eq!(job.job_type, "Full-time");
    }
}
