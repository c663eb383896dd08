//! HTML accepted-paper listings for the security venues.
//!
//! Each venue's page has its own structure, so the parsing lives in one
//! [`ListingFormat`] per venue while [`ListingAdapter`] owns the shared work:
//! URL construction, fetching, and handing the page to the format.
//!
//! Listing parsers never fail on a missing element. A record without an
//! author block or link simply has those fields empty.

mod ccs;
mod ieee_sp;
mod ndss;
mod usenix;

pub use ccs::CcsListing;
pub use ieee_sp::IeeeSpListing;
pub use ndss::NdssListing;
pub use usenix::UsenixListing;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{info, instrument};
use url::Url;

use super::{SourceAdapter, SourceError, Venue, non_empty};
use crate::fetch::Fetcher;
use crate::store::NewPaper;

/// Listing URLs that do not follow their venue's template.
const URL_OVERRIDES: &[(&str, i32, &str)] = &[(
    "usenix-security",
    2025,
    "https://www.usenix.org/conference/usenixsecurity25/technical-sessions",
)];

/// Parser for one venue's accepted-papers page.
pub trait ListingFormat: Send + Sync {
    /// Registry key, e.g. `"ndss"`.
    fn adapter_name(&self) -> &'static str;

    /// URL template with a `{year}` placeholder.
    fn url_template(&self) -> &'static str;

    /// Extracts papers from the page body. `page_url` resolves relative links.
    fn parse(&self, html: &str, page_url: &Url, year: i32, conference: &str) -> Vec<NewPaper>;
}

/// Listing URL for `venue_tag` in `year`.
///
/// The override table wins; otherwise `{year}` in `template` is replaced by
/// the two-digit year before 2025 and the full year from 2025 on.
#[must_use]
pub fn listing_url(venue_tag: &str, template: &str, year: i32) -> String {
    if let Some((_, _, url)) = URL_OVERRIDES
        .iter()
        .find(|(tag, y, _)| *tag == venue_tag && *y == year)
    {
        return (*url).to_string();
    }
    let rendered = if year < 2025 {
        format!("{:02}", year.rem_euclid(100))
    } else {
        year.to_string()
    };
    template.replace("{year}", &rendered)
}

/// Crawls an HTML listing with one [`ListingFormat`].
pub struct ListingAdapter {
    fetcher: Fetcher,
    format: Box<dyn ListingFormat>,
    base_url: Option<String>,
}

impl ListingAdapter {
    /// Creates an adapter fetching from the venue's public site.
    #[must_use]
    pub fn new(fetcher: Fetcher, format: impl ListingFormat + 'static) -> Self {
        Self {
            fetcher,
            format: Box::new(format),
            base_url: None,
        }
    }

    /// Creates an adapter whose listing URLs keep their path but use
    /// `base_url` as origin (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        fetcher: Fetcher,
        format: impl ListingFormat + 'static,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            format: Box::new(format),
            base_url: Some(base_url.into()),
        }
    }

    fn page_url(&self, venue: &Venue, year: i32) -> Result<Url, SourceError> {
        let public = listing_url(venue.tag, self.format.url_template(), year);
        let mut url = Url::parse(&public)
            .map_err(|e| SourceError::parse(self.format.adapter_name(), e.to_string()))?;
        if let Some(base) = &self.base_url {
            let origin = Url::parse(base)
                .map_err(|e| SourceError::parse(self.format.adapter_name(), e.to_string()))?;
            let path = url.path().to_string();
            url = origin
                .join(&path)
                .map_err(|e| SourceError::parse(self.format.adapter_name(), e.to_string()))?;
        }
        Ok(url)
    }
}

impl std::fmt::Debug for ListingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingAdapter")
            .field("format", &self.format.adapter_name())
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for ListingAdapter {
    fn name(&self) -> &str {
        self.format.adapter_name()
    }

    #[instrument(skip(self, venue), fields(adapter = self.format.adapter_name(), venue = venue.tag))]
    async fn crawl(&self, venue: &Venue, year: i32) -> Result<Vec<NewPaper>, SourceError> {
        let url = self.page_url(venue, year)?;
        info!(url = %url, "fetching accepted-papers listing");
        let body = self.fetcher.get_text(url.as_str(), &[]).await?;
        let papers = self.format.parse(&body, &url, year, venue.conference);
        info!(count = papers.len(), "listing parsed");
        Ok(papers)
    }
}

// ==================== shared parsing helpers ====================

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Parses a CSS selector at static init; panics on invalid selector.
pub(crate) fn compile_static_selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid static selector '{css}': {e}"))
}

/// Element text with whitespace collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `href` made absolute against the page URL.
pub(crate) fn absolute_link(page_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    page_url.join(href).ok().map(String::from)
}

/// Builds a listing record; authors are kept as one raw entry.
pub(crate) fn listing_paper(
    conference: &str,
    year: i32,
    title: &str,
    authors: &str,
    url: Option<String>,
) -> NewPaper {
    let mut paper = NewPaper::new(title.trim(), conference);
    paper.year = Some(year);
    paper.authors = non_empty(Some(authors)).into_iter().collect();
    paper.url = url;
    paper
}
