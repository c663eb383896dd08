//! Paper record types and download status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::StoreError;

/// Separator used when authors are stored as one string.
pub const AUTHOR_SEPARATOR: &str = "; ";

/// Download status of a paper's PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Not yet attempted (or reset for another attempt).
    Pending,
    /// Claimed by a download worker.
    Downloading,
    /// PDF stored on disk at `pdf_path`.
    Completed,
    /// Last attempt failed; only an explicit reset moves it back.
    Failed,
}

impl DownloadStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Downloading,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Statuses a record may be in for `set_download_status(.., self)` to apply.
    ///
    /// `failed -> pending` is deliberately absent; it only happens through
    /// the explicit reset operation.
    #[must_use]
    pub fn allowed_predecessors(self) -> &'static [DownloadStatus] {
        match self {
            Self::Pending | Self::Completed | Self::Failed => &[Self::Downloading],
            Self::Downloading => &[Self::Pending],
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// A normalized record produced by a source adapter, ready for insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPaper {
    /// Paper title (required, non-empty).
    pub title: String,
    /// Ordered author names.
    pub authors: Vec<String>,
    /// Abstract when the source provides one.
    pub abstract_text: Option<String>,
    /// Publication year.
    pub year: Option<i32>,
    /// Conference display name (required, non-empty).
    pub conference: String,
    /// DOI without the resolver prefix.
    pub doi: Option<String>,
    /// Landing page URL.
    pub url: Option<String>,
    /// Resolved PDF URL.
    pub pdf_url: Option<String>,
    /// DBLP record key, when the record came from DBLP.
    pub dblp_key: Option<String>,
    /// Free-text annotations.
    pub notes: Option<String>,
}

impl NewPaper {
    /// Creates a record with only the mandatory fields set.
    #[must_use]
    pub fn new(title: impl Into<String>, conference: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            conference: conference.into(),
            ..Self::default()
        }
    }

    /// Returns authors joined with [`AUTHOR_SEPARATOR`].
    #[must_use]
    pub fn authors_joined(&self) -> String {
        self.authors.join(AUTHOR_SEPARATOR)
    }

    /// Natural de-duplication key for this record.
    ///
    /// `dblp:<key>` when a DBLP key exists, otherwise
    /// `title:<normalized title>|<conference>|<year>`.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        if let Some(key) = self.dblp_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return format!("dblp:{}", key.trim());
        }
        let year = self.year.map(|y| y.to_string()).unwrap_or_default();
        format!(
            "title:{}|{}|{}",
            normalize_title(&self.title),
            self.conference.trim(),
            year
        )
    }

    /// Checks the mandatory-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] when title or conference is blank.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::invalid_record("title is empty"));
        }
        if self.conference.trim().is_empty() {
            return Err(StoreError::invalid_record("conference is empty"));
        }
        Ok(())
    }
}

/// Lowercases a title and reduces it to alphanumeric words separated by
/// single spaces.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// A stored paper row.
#[derive(Debug, Clone, Default, FromRow)]
pub struct Paper {
    /// Storage-assigned identifier.
    pub id: i64,
    pub title: String,
    /// Authors joined with [`AUTHOR_SEPARATOR`].
    pub authors: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub conference: String,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    /// Set only while the status is `completed`.
    pub pdf_path: Option<String>,
    pub doi: Option<String>,
    pub dblp_key: Option<String>,
    pub dedup_key: String,
    /// Current download status (stored as text, parsed via `status()`).
    #[sqlx(rename = "download_status")]
    pub status_str: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Paper {
    /// Returns the parsed status enum.
    ///
    /// Falls back to `Pending` if the status string is invalid.
    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        self.status_str.parse().unwrap_or(DownloadStatus::Pending)
    }

    /// Splits the stored author string back into names.
    #[must_use]
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// True when a non-blank abstract is stored.
    #[must_use]
    pub fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Non-blank PDF URL, if any.
    #[must_use]
    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Paper {{ id: {}, conference: {}, year: {}, status: {} }}",
            self.id,
            self.conference,
            self.year.map_or_else(|| "?".to_string(), |y| y.to_string()),
            self.status()
        )
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperPatch {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    /// Replaces the notes column.
    pub notes: Option<String>,
    /// Appended to the existing notes on a new line.
    pub append_note: Option<String>,
}

/// Filters for [`super::PaperStore::query`] and the download/enrich passes.
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    pub conference: Option<String>,
    pub year: Option<i32>,
    pub status: Option<DownloadStatus>,
    /// Only records without a usable abstract.
    pub missing_abstract: bool,
    pub limit: Option<i64>,
}

impl PaperFilter {
    /// Filter scoped to one conference and/or year.
    #[must_use]
    pub fn scoped(conference: Option<String>, year: Option<i32>) -> Self {
        Self {
            conference,
            year,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: DownloadStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }
}

/// One row of the append-only download log.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadAttempt {
    pub id: i64,
    pub paper_id: i64,
    pub attempt_time: String,
    #[sqlx(rename = "status")]
    pub status_str: String,
    pub error_message: Option<String>,
}

impl DownloadAttempt {
    /// Returns the parsed status enum.
    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        self.status_str.parse().unwrap_or(DownloadStatus::Pending)
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub total: i64,
    pub by_conference: Vec<(String, i64)>,
    pub by_status: Vec<(String, i64)>,
    pub with_abstract: i64,
    pub with_pdf_url: i64,
}

impl StoreStatistics {
    /// Count for one status (0 when absent).
    #[must_use]
    pub fn status_count(&self, status: DownloadStatus) -> i64 {
        self.by_status
            .iter()
            .find(|(name, _)| name == status.as_str())
            .map_or(0, |(_, count)| *count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== DownloadStatus Tests ====================

    #[test]
    fn test_download_status_as_str() {
        assert_eq!(DownloadStatus::Pending.as_str(), "pending");
        assert_eq!(DownloadStatus::Downloading.as_str(), "downloading");
        assert_eq!(DownloadStatus::Completed.as_str(), "completed");
        assert_eq!(DownloadStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_download_status_from_str_valid() {
        for status in DownloadStatus::ALL {
            assert_eq!(status.as_str().parse::<DownloadStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_download_status_from_str_rejects_legacy_name() {
        let result = "downloaded".parse::<DownloadStatus>();
        assert!(matches!(result, Err(StoreError::InvalidStatus(_))));
    }

    #[test]
    fn test_download_status_serde_snake_case() {
        let json = serde_json::to_string(&DownloadStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
    }

    #[test]
    fn test_failed_to_pending_is_not_a_plain_transition() {
        assert!(
            !DownloadStatus::Pending
                .allowed_predecessors()
                .contains(&DownloadStatus::Failed)
        );
        assert!(
            !DownloadStatus::Downloading
                .allowed_predecessors()
                .contains(&DownloadStatus::Completed)
        );
    }

    // ==================== NewPaper Tests ====================

    #[test]
    fn test_dedup_key_prefers_dblp_key() {
        let mut paper = NewPaper::new("Some Title", "CRYPTO");
        paper.dblp_key = Some("conf/crypto/Doe24".to_string());
        paper.year = Some(2024);
        assert_eq!(paper.dedup_key(), "dblp:conf/crypto/Doe24");
    }

    #[test]
    fn test_dedup_key_falls_back_to_normalized_title() {
        let mut paper = NewPaper::new("  Breaking   RSA: A Survey. ", "NDSS");
        paper.year = Some(2023);
        assert_eq!(paper.dedup_key(), "title:breaking rsa a survey|NDSS|2023");
    }

    #[test]
    fn test_dedup_key_ignores_blank_dblp_key() {
        let mut paper = NewPaper::new("Title", "CCS");
        paper.dblp_key = Some("  ".to_string());
        assert_eq!(paper.dedup_key(), "title:title|CCS|");
    }

    #[test]
    fn test_normalize_title_matches_punctuation_variants() {
        assert_eq!(
            normalize_title("Zero-Knowledge Proofs, Revisited."),
            normalize_title("zero knowledge proofs revisited")
        );
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(NewPaper::new("  ", "CRYPTO").validate().is_err());
        assert!(NewPaper::new("Title", "").validate().is_err());
        assert!(NewPaper::new("Title", "CRYPTO").validate().is_ok());
    }

    #[test]
    fn test_authors_joined_uses_semicolons() {
        let mut paper = NewPaper::new("T", "C");
        paper.authors = vec!["Alice".to_string(), "Bob".to_string()];
        assert_eq!(paper.authors_joined(), "Alice; Bob");
    }
}
