//! Listing-site scrapers.
//!
//! Scraping a listings site is a two-phase affair:
//!
//! 1. **Listing pages**: each paginated page holds repeated listing blocks;
//!    [`listings::extract_listings`] turns one page into [`RawCandidate`]s
//! 2. **Detail pages**: each candidate links to a page carrying the long
//!    description; [`listings::fetch_description`] pulls it out
//!
//! Extraction matches on structure and attributes, never on free text, and a
//! block that is missing a required field is skipped rather than treated as an
//! error. Markup drift therefore degrades to fewer candidates, not a crash.
//!
//! [`RawCandidate`]: crate::models::RawCandidate

pub mod listings;
