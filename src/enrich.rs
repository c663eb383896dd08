//! Enrichment pass: fills missing abstracts from a secondary lookup service.
//!
//! The pass is sequential; the upstream's rate limit is enforced by the
//! [`EnrichmentSource`] itself. Records that already carry an abstract, and
//! proceedings front matter, are skipped without a network call.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::sources::{Enrichment, EnrichmentSource};
use crate::store::{Paper, PaperFilter, PaperPatch, PaperRepository};

/// Title fragments that mark proceedings volumes rather than papers.
const FRONT_MATTER_MARKERS: [&str; 5] = [
    "Proceedings",
    "Front Matter",
    "Conference on",
    "Symposium on",
    "Workshop on",
];

/// DOIs of this shape identify a whole book, not a paper.
const ISBN_DOI_MARKER: &str = ".978-";

/// Counts for one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// True when the run stopped early on an interrupt.
    pub interrupted: bool,
}

impl EnrichStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

/// True for titles such as "Proceedings of the 2024 ACM Conference on ...".
#[must_use]
pub fn is_front_matter(title: &str) -> bool {
    FRONT_MATTER_MARKERS
        .iter()
        .any(|marker| title.contains(marker))
}

/// DOI usable for an identifier lookup, if the record has one.
fn lookup_doi(paper: &Paper) -> Option<&str> {
    paper
        .doi
        .as_deref()
        .map(str::trim)
        .filter(|doi| !doi.is_empty() && !doi.contains(ISBN_DOI_MARKER))
}

/// Builds the patch applied for a successful lookup.
///
/// The DOI is only set when the record had none.
#[must_use]
pub fn enrichment_patch(paper: &Paper, found: &Enrichment) -> PaperPatch {
    let has_doi = paper.doi.as_deref().is_some_and(|d| !d.trim().is_empty());
    PaperPatch {
        abstract_text: found.abstract_text.clone(),
        doi: if has_doi { None } else { found.doi.clone() },
        append_note: found.note(),
        ..PaperPatch::default()
    }
}

/// Sequential enrichment over stored papers.
pub struct EnrichmentPass<'a> {
    source: &'a dyn EnrichmentSource,
    store: &'a dyn PaperRepository,
}

impl<'a> EnrichmentPass<'a> {
    #[must_use]
    pub fn new(source: &'a dyn EnrichmentSource, store: &'a dyn PaperRepository) -> Self {
        Self { source, store }
    }

    /// Enriches every record matched by `filter`.
    ///
    /// `filter.limit` bounds the number of lookups, not the number of
    /// records inspected.
    ///
    /// # Errors
    ///
    /// Returns the store error if the candidate query fails; per-record
    /// failures are only counted.
    pub async fn run(&self, filter: &PaperFilter) -> crate::store::Result<EnrichStats> {
        self.run_until(filter, &AtomicBool::new(false)).await
    }

    /// Like [`EnrichmentPass::run`], stopping before the next record once
    /// `interrupted` is set.
    ///
    /// # Errors
    ///
    /// Returns the store error if the candidate query fails.
    #[instrument(skip(self, interrupted))]
    pub async fn run_until(
        &self,
        filter: &PaperFilter,
        interrupted: &AtomicBool,
    ) -> crate::store::Result<EnrichStats> {
        let scope = PaperFilter {
            limit: None,
            ..filter.clone()
        };
        let papers = self.store.query(&scope).await?;
        let lookup_budget = filter
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);

        let mut stats = EnrichStats::default();
        let mut lookups = 0usize;
        for paper in &papers {
            if interrupted.load(Ordering::SeqCst) {
                info!("interrupt received; stopping enrichment");
                stats.interrupted = true;
                break;
            }
            if paper.has_abstract() || is_front_matter(&paper.title) {
                stats.skipped += 1;
                continue;
            }
            if lookups >= lookup_budget {
                break;
            }
            lookups += 1;

            if self.enrich_one(paper).await {
                stats.success += 1;
            } else {
                stats.failed += 1;
            }
        }

        info!(
            success = stats.success,
            failed = stats.failed,
            skipped = stats.skipped,
            "enrichment finished"
        );
        Ok(stats)
    }

    /// Looks one record up and patches it. Returns whether it succeeded.
    #[instrument(skip(self, paper), fields(paper_id = paper.id))]
    async fn enrich_one(&self, paper: &Paper) -> bool {
        let found = match self.source.enrich(lookup_doi(paper), &paper.title).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!(title = %paper.title, "no abstract found");
                return false;
            }
            Err(error) => {
                warn!(title = %paper.title, error = %error, "enrichment lookup failed");
                return false;
            }
        };

        let patch = enrichment_patch(paper, &found);
        match self.store.update(paper.id, &patch).await {
            Ok(()) => {
                debug!("abstract stored");
                true
            }
            Err(error) => {
                warn!(error = %error, "failed to store enrichment");
                false
            }
        }
    }
}

impl std::fmt::Debug for EnrichmentPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentPass").finish_non_exhaustive()
    }
}
