//! Small helpers shared by the pipeline.
//!
//! - Listing page URL construction
//! - String truncation for log fields
//! - Storage location preparation

use std::io;
use std::path::Path;

use tracing::debug;
use url::Url;

/// URL of listing page `page`.
///
/// Page 1 is the base URL itself; later pages add a `page` query parameter.
///
/// # Examples
///
/// ```ignore
/// let base = Url::parse("https://www.actuarylist.com/").unwrap();
/// assert_eq!(page_url(&base, 1).as_str(), "https://www.actuarylist.com/");
/// assert_eq!(page_url(&base, 3).as_str(), "https://www.actuarylist.com/?page=3");
/// ```
pub fn page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    if page > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }
    url
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or before `max` bytes and
/// get `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Create the directory a file will live in, if it has one.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            debug!(dir = %parent.display(), "Ensured parent directory");
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        let base = Url::parse("https://www.actuarylist.com/").unwrap();
        assert_eq!(page_url(&base, 1).as_str(), "https://www.actuarylist.com/");
        assert_eq!(
            page_url(&base, 2).as_str(),
            "https://www.actuarylist.com/?page=2"
        );
        assert_eq!(
            page_url(&base, 19).as_str(),
            "https://www.actuarylist.com/?page=19"
        );
    }

    #[test]
    fn test_page_url_keeps_existing_query() {
        let base = Url::parse("https://jobs.example.com/list?region=eu").unwrap();
        assert_eq!(
            page_url(&base, 4).as_str(),
            "https://jobs.example.com/list?region=eu&page=4"
        );
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.ends_with("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let result = truncate_for_log("💰💰", 5);
        assert_eq!(result, "💰…(+4 bytes)");
    }

    #[test]
    fn test_ensure_parent_dir_without_parent() {
        assert!(ensure_parent_dir(Path::new("jobs.db")).is_ok());
    }
}
