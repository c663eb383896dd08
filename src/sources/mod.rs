//! Source adapters: upstream-specific crawlers producing normalized records.
//!
//! # Architecture
//!
//! - [`SourceAdapter`] - Async trait each crawler implements
//! - [`AdapterRegistry`] - Adapters keyed by name, selected per (source, venue)
//! - [`DblpAdapter`] - DBLP search API
//! - [`IacrAdapter`] - IACR conference program JSON feed
//! - [`ListingAdapter`] - HTML accepted-paper listings, one [`ListingFormat`] per venue
//! - [`SemanticScholarClient`] - Enrichment lookups behind [`EnrichmentSource`]
//!
//! Every adapter isolates item-level problems: a malformed entry is logged
//! and skipped, never aborting the rest of the batch. A page that cannot be
//! fetched or parsed at all fails the whole task with a [`SourceError`].

mod dblp;
mod error;
mod iacr;
mod semantic_scholar;
mod venue;
mod venues;

pub use dblp::{DBLP_API_URL, DEFAULT_MAX_RESULTS, DblpAdapter};
pub use error::SourceError;
pub use iacr::IacrAdapter;
pub use semantic_scholar::{
    DEFAULT_ENRICH_DELAY, Enrichment, SEMANTIC_SCHOLAR_API_URL, SemanticScholarClient,
};
pub use venue::{SiteKind, SourceKind, VENUES, Venue, find_venue};
pub use venues::{
    CcsListing, IeeeSpListing, ListingAdapter, ListingFormat, NdssListing, UsenixListing,
    listing_url,
};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::fetch::Fetcher;
use crate::store::NewPaper;

/// Contract for crawling one upstream.
///
/// Uses `async_trait` so adapters can live behind `Box<dyn SourceAdapter>`
/// in the registry.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key (e.g. "dblp", "iacr", "ndss").
    fn name(&self) -> &str;

    /// Crawls one venue-year and returns the normalized records.
    async fn crawl(&self, venue: &Venue, year: i32) -> Result<Vec<NewPaper>, SourceError>;
}

/// Adapters keyed by name.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Box<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        let name = adapter.name().to_string();
        debug!(adapter = %name, "registered source adapter");
        self.adapters.insert(name, adapter);
    }

    /// Sorted adapter names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Selects the adapter for crawling `venue` from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unsupported`] when no adapter is registered.
    pub fn adapter_for(
        &self,
        source: SourceKind,
        venue: &Venue,
    ) -> Result<&dyn SourceAdapter, SourceError> {
        let key = match source {
            SourceKind::Dblp => "dblp",
            SourceKind::Site => venue.site.adapter_name(),
        };
        self.adapters
            .get(key)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| SourceError::Unsupported {
                adapter: key.to_string(),
                venue: venue.conference.to_string(),
            })
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}

/// Builds the registry used by the CLI: DBLP, IACR and the four listing formats.
#[must_use]
pub fn build_default_registry(fetcher: &Fetcher, dblp_max_results: u32) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(DblpAdapter::new(fetcher.clone(), dblp_max_results)));
    registry.register(Box::new(IacrAdapter::new(fetcher.clone())));
    registry.register(Box::new(ListingAdapter::new(fetcher.clone(), UsenixListing)));
    registry.register(Box::new(ListingAdapter::new(fetcher.clone(), NdssListing)));
    registry.register(Box::new(ListingAdapter::new(fetcher.clone(), IeeeSpListing)));
    registry.register(Box::new(ListingAdapter::new(fetcher.clone(), CcsListing)));
    registry
}

/// Secondary lookup service used by the enrichment pass.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Looks a paper up by DOI; `Ok(None)` when the upstream does not know it.
    async fn lookup_by_identifier(&self, doi: &str) -> Result<Option<Enrichment>, SourceError>;

    /// Looks a paper up by title; `Ok(None)` when nothing matches.
    async fn lookup_by_title(&self, title: &str) -> Result<Option<Enrichment>, SourceError>;

    /// Tries the identifier first and falls back to the title when the first
    /// lookup yields no usable abstract. Only results carrying an abstract
    /// are returned.
    ///
    /// # Errors
    ///
    /// Returns the title lookup's error when it fails; a failed identifier
    /// lookup is logged and falls through to the title.
    async fn enrich(
        &self,
        doi: Option<&str>,
        title: &str,
    ) -> Result<Option<Enrichment>, SourceError> {
        if let Some(doi) = doi.map(str::trim).filter(|d| !d.is_empty()) {
            match self.lookup_by_identifier(doi).await {
                Ok(Some(found)) if found.has_abstract() => return Ok(Some(found)),
                Ok(_) => debug!(doi, "identifier lookup had no abstract; trying title"),
                Err(error) => warn!(doi, error = %error, "identifier lookup failed; trying title"),
            }
        }

        if title.trim().is_empty() {
            return Ok(None);
        }
        let found = self.lookup_by_title(title).await?;
        Ok(found.filter(Enrichment::has_abstract))
    }
}

/// Sleeps for `delay` unless it is zero.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Trimmed, non-empty copy of `value`.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
