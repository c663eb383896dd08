//! DBLP search API adapter.
//!
//! Queries `"<venue key> <year>"` against the publication search endpoint
//! and maps each hit into a [`NewPaper`]. DBLP's JSON is loosely typed: a
//! single author arrives as an object instead of a one-element list, `ee`
//! may be a string or a list, and `year` is a string.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{SourceAdapter, SourceError, Venue, non_empty};
use crate::fetch::Fetcher;
use crate::store::NewPaper;

/// Default DBLP publication search endpoint.
pub const DBLP_API_URL: &str = "https://dblp.org/search/publ/api";

/// Largest page DBLP serves for one query.
pub const DEFAULT_MAX_RESULTS: u32 = 1000;

const ADAPTER_NAME: &str = "dblp";

// ==================== DBLP Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DblpAuthor {
    Named { text: String },
    Plain(String),
}

impl DblpAuthor {
    fn into_name(self) -> String {
        match self {
            Self::Named { text } | Self::Plain(text) => text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DblpAuthors {
    author: Option<OneOrMany<DblpAuthor>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Year {
    Text(String),
    Number(i32),
}

impl Year {
    fn value(&self) -> Option<i32> {
        match self {
            Self::Text(text) => text.trim().parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DblpInfo {
    title: Option<String>,
    authors: Option<DblpAuthors>,
    year: Option<Year>,
    url: Option<String>,
    ee: Option<OneOrMany<String>>,
    doi: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DblpHit {
    info: DblpInfo,
}

// ==================== DblpAdapter ====================

/// Crawls a venue-year through the DBLP search API.
#[derive(Debug, Clone)]
pub struct DblpAdapter {
    fetcher: Fetcher,
    api_url: String,
    max_results: u32,
}

impl DblpAdapter {
    /// Creates an adapter against the public endpoint.
    #[must_use]
    pub fn new(fetcher: Fetcher, max_results: u32) -> Self {
        Self::with_base_url(fetcher, DBLP_API_URL, max_results)
    }

    /// Creates an adapter against a custom endpoint (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(fetcher: Fetcher, api_url: impl Into<String>, max_results: u32) -> Self {
        Self {
            fetcher,
            api_url: api_url.into(),
            max_results: max_results.max(1),
        }
    }

    /// Searches DBLP by title and returns the best hit.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] when the query fails and
    /// [`SourceError::Parse`] when the payload is not a DBLP result.
    #[instrument(skip(self), fields(adapter = ADAPTER_NAME))]
    pub async fn search_by_title(
        &self,
        title: &str,
        conference: &str,
    ) -> Result<Option<NewPaper>, SourceError> {
        let body = self
            .fetcher
            .get_text(
                &self.api_url,
                &[("q", title), ("format", "json"), ("h", "1")],
            )
            .await?;
        let papers = parse_response(&body, conference, None, None)?;
        Ok(papers.into_iter().next())
    }
}

#[async_trait]
impl SourceAdapter for DblpAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    #[instrument(skip(self, venue), fields(adapter = ADAPTER_NAME, venue = venue.tag))]
    async fn crawl(&self, venue: &Venue, year: i32) -> Result<Vec<NewPaper>, SourceError> {
        let query = format!("{} {year}", venue.dblp_key);
        let max_results = self.max_results.to_string();
        info!(query = %query, "querying DBLP");

        let body = self
            .fetcher
            .get_text(
                &self.api_url,
                &[("q", query.as_str()), ("format", "json"), ("h", max_results.as_str())],
            )
            .await?;

        let papers = parse_response(&body, venue.conference, Some(venue.dblp_key), Some(year))?;
        info!(count = papers.len(), "DBLP records parsed");
        Ok(papers)
    }
}

/// Parses a DBLP search response.
///
/// With `venue_key`, hits whose DBLP key belongs to another stream are
/// dropped; with `year`, hits from other years are dropped and hits
/// without a year inherit it.
fn parse_response(
    body: &str,
    conference: &str,
    venue_key: Option<&str>,
    year: Option<i32>,
) -> Result<Vec<NewPaper>, SourceError> {
    let data: Value =
        serde_json::from_str(body).map_err(|e| SourceError::parse(ADAPTER_NAME, e.to_string()))?;
    let result = data
        .get("result")
        .ok_or_else(|| SourceError::parse(ADAPTER_NAME, "missing 'result'"))?;

    // No 'hit' array means zero results.
    let hits = match result.get("hits").and_then(|h| h.get("hit")) {
        Some(Value::Array(hits)) => hits.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    debug!(hits = hits.len(), "DBLP hits received");

    let stream_prefix = venue_key.map(|key| format!("{}/", key.trim_end_matches('/')));
    let mut papers = Vec::with_capacity(hits.len());
    for (index, hit) in hits.into_iter().enumerate() {
        let hit: DblpHit = match serde_json::from_value(hit) {
            Ok(hit) => hit,
            Err(error) => {
                warn!(index, error = %error, "skipping malformed DBLP hit");
                continue;
            }
        };
        let Some(paper) = hit_to_paper(hit.info, conference, year) else {
            warn!(index, "skipping DBLP hit without title");
            continue;
        };

        if let (Some(prefix), Some(key)) = (&stream_prefix, paper.dblp_key.as_deref())
            && !key.starts_with(prefix.as_str())
        {
            debug!(key, "skipping hit from another venue");
            continue;
        }
        if let (Some(wanted), Some(found)) = (year, paper.year)
            && wanted != found
        {
            debug!(found, "skipping hit from another year");
            continue;
        }
        papers.push(paper);
    }
    Ok(papers)
}

fn hit_to_paper(info: DblpInfo, conference: &str, fallback_year: Option<i32>) -> Option<NewPaper> {
    let title = non_empty(info.title.as_deref())?;

    let authors = info
        .authors
        .and_then(|a| a.author)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(DblpAuthor::into_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let ee = info
        .ee
        .and_then(|ee| ee.into_vec().into_iter().next())
        .and_then(|link| non_empty(Some(link.as_str())));
    let pdf_url = ee.filter(|link| link.to_ascii_lowercase().ends_with(".pdf"));

    let mut paper = NewPaper::new(title, conference);
    paper.authors = authors;
    paper.year = info.year.as_ref().and_then(Year::value).or(fallback_year);
    paper.url = non_empty(info.url.as_deref());
    paper.pdf_url = pdf_url;
    paper.doi = non_empty(info.doi.as_deref());
    paper.dblp_key = non_empty(info.key.as_deref());
    Some(paper)
}
