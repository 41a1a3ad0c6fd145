//! Listing and detail page extraction.
//!
//! The default selectors target the listings site's job cards:
//!
//! ```text
//! <article>
//!   <p class="Job_job-card__position__ic1rc">Pricing Actuary</p>
//!   <p class="Job_job-card__company__7T9qY">Acme Re</p>
//!   <a class="Job_job-card__country__GRVhK">United States</a>
//!   <p class="Job_job-card__salary__QZswp">💰 $120,000</p>
//!   <a class="Job_job-page-link__a5I5g" href="/actuarial-jobs/123"></a>
//!   <span class="tag">Pricing</span>
//! </article>
//! ```
//!
//! Class names carry build hashes, so matching is on the stable class prefix
//! (`[class*='job-card__position']`) rather than the full class.

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::ConfigError;
use crate::fetch::PageFetcher;
use crate::models::RawCandidate;
use crate::normalize::MISSING_TEXT;

/// CSS selectors used to pick listing fields apart.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListingSelectors {
    /// One match per listing block.
    pub card: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Link to the detail page; must carry `href`.
    pub link: String,
    pub tags: String,
    pub salary: String,
    pub posted: String,
    /// Element holding the description label on detail pages.
    pub description_marker: String,
    /// First element of this kind after the marker holds the description.
    pub description_block: String,
    pub description_label: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: "article".to_string(),
            title: "p[class*='job-card__position']".to_string(),
            company: "p[class*='job-card__company']".to_string(),
            location: "a[class*='job-card__country']".to_string(),
            link: "a[class*='job-page-link']".to_string(),
            tags: "span.tag".to_string(),
            salary: "p[class*='job-card__salary']".to_string(),
            posted: "[class*='job-card__posted']".to_string(),
            description_marker: "p".to_string(),
            description_block: "ul".to_string(),
            description_label: "Job Description".to_string(),
        }
    }
}

impl ListingSelectors {
    /// Every CSS selector with its field name.
    pub fn entries(&self) -> [(&'static str, &str); 10] {
        [
            ("card", self.card.as_str()),
            ("title", self.title.as_str()),
            ("company", self.company.as_str()),
            ("location", self.location.as_str()),
            ("link", self.link.as_str()),
            ("tags", self.tags.as_str()),
            ("salary", self.salary.as_str()),
            ("posted", self.posted.as_str()),
            ("description_marker", self.description_marker.as_str()),
            ("description_block", self.description_block.as_str()),
        ]
    }

    pub fn compile(&self) -> Result<CompiledSelectors, ConfigError> {
        let parse = |name: &str, css: &str| {
            Selector::parse(css).map_err(|e| {
                ConfigError::Invalid(format!("selector {name} '{css}' does not parse: {e}"))
            })
        };
        Ok(CompiledSelectors {
            card: parse("card", &self.card)?,
            title: parse("title", &self.title)?,
            company: parse("company", &self.company)?,
            location: parse("location", &self.location)?,
            link: parse("link", &self.link)?,
            tags: parse("tags", &self.tags)?,
            salary: parse("salary", &self.salary)?,
            posted: parse("posted", &self.posted)?,
            description_marker: parse("description_marker", &self.description_marker)?,
            description_block: parse("description_block", &self.description_block)?,
            description_label: self.description_label.trim().to_string(),
        })
    }
}

/// Parsed form of [`ListingSelectors`], built once per run.
#[derive(Debug)]
pub struct CompiledSelectors {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    link: Selector,
    tags: Selector,
    salary: Selector,
    posted: Selector,
    description_marker: Selector,
    description_block: Selector,
    description_label: String,
}

/// Candidates found on one listing page.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    pub candidates: Vec<RawCandidate>,
    /// Blocks skipped for a missing or blank title, company or location, or
    /// a missing link.
    pub dropped: usize,
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    block.select(selector).next().map(text_of)
}

/// Like [`first_text`], but an element with no text counts as missing.
fn required_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    first_text(block, selector).filter(|text| !text.is_empty())
}

/// Pull candidates out of one listing page.
///
/// Detail links are resolved against `page_url`, so relative and absolute
/// `href`s both end up absolute.
///
/// # Arguments
///
/// * `html` - Raw listing page markup
/// * `page_url` - Address the page was fetched from
/// * `selectors` - Compiled card and field selectors
///
/// # Returns
///
/// An [`ExtractedPage`] with one candidate per complete block, in page order,
/// and the number of blocks dropped as incomplete.
#[instrument(level = "debug", skip_all, fields(%page_url))]
pub fn extract_listings(html: &str, page_url: &Url, selectors: &CompiledSelectors) -> ExtractedPage {
    let document = Html::parse_document(html);
    let mut page = ExtractedPage::default();

    for block in document.select(&selectors.card) {
        match extract_block(block, page_url, selectors) {
            Some(candidate) => page.candidates.push(candidate),
            None => page.dropped += 1,
        }
    }

    debug!(
        candidates = page.candidates.len(),
        dropped = page.dropped,
        "Extracted listing blocks"
    );
    page
}

fn extract_block(
    block: ElementRef<'_>,
    page_url: &Url,
    selectors: &CompiledSelectors,
) -> Option<RawCandidate> {
    let title = required_text(block, &selectors.title)?;
    let company = required_text(block, &selectors.company)?;
    let location = required_text(block, &selectors.location)?;
    let href = block
        .select(&selectors.link)
        .next()
        .and_then(|link| link.value().attr("href"))?;
    let detail_url = match page_url.join(href.trim()) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!(href, error = %e, "Unresolvable detail link; skipping block");
            return None;
        }
    };

    Some(RawCandidate {
        title,
        company,
        location,
        detail_url,
        tags: block.select(&selectors.tags).map(text_of).collect(),
        salary: first_text(block, &selectors.salary),
        posted: first_text(block, &selectors.posted),
    })
}

/// Find the itemized block that follows the description label.
///
/// The block is the first `description_block` match after the marker in
/// document order, not necessarily a sibling of it.
pub fn parse_description(html: &str, selectors: &CompiledSelectors) -> Option<String> {
    let document = Html::parse_document(html);
    let mut seen_marker = false;

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if !seen_marker {
            seen_marker = selectors.description_marker.matches(&element)
                && text_of(element) == selectors.description_label;
        } else if selectors.description_block.matches(&element) {
            let text = element
                .text()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .join("\n");
            return (!text.is_empty()).then_some(text);
        }
    }
    None
}

/// Fetch a detail page and return its description, or `"N/A"`.
#[instrument(level = "debug", skip_all, fields(url = %detail_url))]
pub async fn fetch_description<F: PageFetcher>(
    fetcher: &F,
    detail_url: &str,
    selectors: &CompiledSelectors,
) -> String {
    let url = match Url::parse(detail_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Detail URL does not parse; no description");
            return MISSING_TEXT.to_string();
        }
    };
    match fetcher.fetch(&url).await {
        Ok(html) => parse_description(&html, selectors).unwrap_or_else(|| {
            info!("Detail page has no description section");
            MISSING_TEXT.to_string()
        }),
        Err(e) => {
            warn!(error = %e, "Detail fetch failed; no description");
            MISSING_TEXT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    const LISTING_PAGE: &str = r#"
<html><body>
  <article>
    <p class="Job_job-card__position__ic1rc"> Pricing Actuary </p>
    <p class="Job_job-card__company__7T9qY">Acme Re</p>
    <a class="Job_job-card__country__GRVhK">🏠 United States</a>
    <p class="Job_job-card__salary__QZswp">💰 $120,000</p>
    <p class="Job_job-card__posted__x1">2h ago</p>
    <a class="Job_job-page-link__a5I5g" href="/actuarial-jobs/123"></a>
    <span class="tag"> Pricing </span><span class="tag">Life</span>
  </article>
  <article>
    <p class="Job_job-card__position__ic1rc">Missing company</p>
    <a class="Job_job-card__country__GRVhK">Canada</a>
    <a class="Job_job-page-link__a5I5g" href="/actuarial-jobs/124"></a>
  </article>
  <article>
    <p class="Job_job-card__position__ZZ">Reserving Analyst</p>
    <p class="Job_job-card__company__ZZ">Beta Mutual</p>
    <a class="Job_job-card__country__ZZ">UK</a>
    <a class="Job_job-page-link__ZZ" href="https://other.example.com/jobs/9"></a>
  </article>
  <article>
    <p class="Job_job-card__position__ic1rc">No link</p>
    <p class="Job_job-card__company__7T9qY">Gamma</p>
    <a class="Job_job-card__country__GRVhK">US</a>
  </article>
</body></html>
"#;

    fn selectors() -> CompiledSelectors {
        ListingSelectors::default().compile().unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://www.actuarylist.com/?page=2").unwrap()
    }

    #[test]
    fn test_extracts_complete_blocks_and_drops_incomplete_ones() {
        let page = extract_listings(LISTING_PAGE, &page_url(), &selectors());
        assert_eq!(page.candidates.len(), 2);
        assert_eq!(page.dropped, 2);

        let first = &page.candidates[0];
        assert_eq!(first.title, "Pricing Actuary");
        assert_eq!(first.company, "Acme Re");
        assert_eq!(first.location, "🏠 United States");
        assert_eq!(first.detail_url, "https://www.actuarylist.com/actuarial-jobs/123");
        assert_eq!(first.tags, vec!["Pricing", "Life"]);
        assert_eq!(first.salary.as_deref(), Some("💰 $120,000"));
        assert_eq!(first.posted.as_deref(), Some("2h ago"));

        let second = &page.candidates[1];
        assert_eq!(second.detail_url, "https://other.example.com/jobs/9");
        assert!(second.tags.is_empty());
        assert_eq!(second.salary, None);
        assert_eq!(second.posted, None);
    }

    #[test]
    fn test_blank_required_fields_drop_the_block() {
        let html = r#"
<article>
  <p class="Job_job-card__position__a">Pricing Actuary</p>
  <p class="Job_job-card__company__b">Acme Re</p>
  <a class="Job_job-card__country__c">  </a>
  <a class="Job_job-page-link__d" href="/jobs/1"></a>
</article>
<article>
  <p class="Job_job-card__position__a"> </p>
  <p class="Job_job-card__company__b">Acme Re</p>
  <a class="Job_job-card__country__c">Canada</a>
  <a class="Job_job-page-link__d" href="/jobs/2"></a>
</article>
<article>
  <p class="Job_job-card__position__a">Life Actuary</p>
  <p class="Job_job-card__company__b"></p>
  <a class="Job_job-card__country__c">Canada</a>
  <a class="Job_job-page-link__d" href="/jobs/3"></a>
</article>"#;
        let page = extract_listings(html, &page_url(), &selectors());
        assert!(page.candidates.is_empty());
        assert_eq!(page.dropped, 3);
    }

    #[test]
    fn test_page_without_cards_yields_nothing() {
        let page = extract_listings("<html><body><p>Down for maintenance</p></body></html>", &page_url(), &selectors());
        assert!(page.candidates.is_empty());
        assert_eq!(page.dropped, 0);
    }

    #[test]
    fn test_description_follows_marker() {
        let html = r#"
<div>
  <p>About</p><ul><li>Not this</li></ul>
  <section><p>Job Description</p></section>
  <div><ul>
    <li>Price life products</li>
    <li>Mentor analysts</li>
  </ul></div>
</div>"#;
        assert_eq!(
            parse_description(html, &selectors()).as_deref(),
            Some("Price life products\nMentor analysts")
        );
    }

    #[test]
    fn test_description_absent_without_marker_or_block() {
        assert_eq!(parse_description("<ul><li>x</li></ul>", &selectors()), None);
        assert_eq!(parse_description("<p>Job Description</p><p>text</p>", &selectors()), None);
        assert_eq!(parse_description("<p>Job Description</p><ul> </ul>", &selectors()), None);
    }

    struct OnePage(Result<&'static str, u16>);

    impl PageFetcher for OnePage {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.0.map(str::to_string).map_err(|status| FetchError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_description_falls_back_to_na() {
        let ok = OnePage(Ok("<p>Job Description</p><ul><li>Great role</li></ul>"));
        assert_eq!(fetch_description(&ok, "https://x.test/1", &selectors()).await, "Great role");

        let missing = OnePage(Ok("<p>Nothing here</p>"));
        assert_eq!(fetch_description(&missing, "https://x.test/1", &selectors()).await, "N/A");

        let failing = OnePage(Err(500));
        assert_eq!(fetch_description(&failing, "https://x.test/1", &selectors()).await, "N/A");

        assert_eq!(fetch_description(&ok, "not a url", &selectors()).await, "N/A");
    }
}
