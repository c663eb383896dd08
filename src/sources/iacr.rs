//! IACR conference program adapter (CRYPTO, EUROCRYPT, ASIACRYPT).
//!
//! Each IACR venue publishes its schedule as JSON at
//! `https://<venue>.iacr.org/<year>/currentProgram.php`, nested as
//! days -> timeslots -> sessions -> talks. Only talks carrying a `paperId`
//! are papers; social and logistics sessions are skipped by title.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{SourceAdapter, SourceError, Venue, non_empty};
use crate::fetch::Fetcher;
use crate::store::NewPaper;

const ADAPTER_NAME: &str = "iacr";

/// Session titles containing any of these (case-insensitive) are not technical.
const SKIPPED_SESSIONS: [&str; 7] = [
    "lunch",
    "break",
    "dinner",
    "reception",
    "registration",
    "opening",
    "closing",
];

/// Crawls IACR `currentProgram.php` feeds.
#[derive(Debug, Clone)]
pub struct IacrAdapter {
    fetcher: Fetcher,
    base_url: Option<String>,
}

impl IacrAdapter {
    /// Creates an adapter against the public `<venue>.iacr.org` hosts.
    #[must_use]
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            base_url: None,
        }
    }

    /// Creates an adapter that serves every venue from `base_url` (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(fetcher: Fetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: Some(base_url.into()),
        }
    }

    fn program_url(&self, venue: &Venue, year: i32) -> String {
        let origin = self
            .base_url
            .as_deref()
            .map_or_else(|| format!("https://{}.iacr.org", venue.tag), |base| {
                base.trim_end_matches('/').to_string()
            });
        format!("{origin}/{year}/currentProgram.php")
    }
}

#[async_trait]
impl SourceAdapter for IacrAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    #[instrument(skip(self, venue), fields(adapter = ADAPTER_NAME, venue = venue.tag))]
    async fn crawl(&self, venue: &Venue, year: i32) -> Result<Vec<NewPaper>, SourceError> {
        let url = self.program_url(venue, year);
        // Cache buster
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            .to_string();
        info!(url = %url, "fetching IACR program");

        let body = self.fetcher.get_text(&url, &[("v", stamp.as_str())]).await?;
        let program: Value = serde_json::from_str(&body)
            .map_err(|e| SourceError::parse(ADAPTER_NAME, e.to_string()))?;

        let papers = parse_program(&program, venue.conference, year);
        info!(count = papers.len(), "IACR talks parsed");
        Ok(papers)
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Walks the program tree and collects paper talks.
fn parse_program(program: &Value, conference: &str, year: i32) -> Vec<NewPaper> {
    let mut papers = Vec::new();
    for day in array(program, "days") {
        for timeslot in array(day, "timeslots") {
            for session in array(timeslot, "sessions") {
                let title = session
                    .get("session_title")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if is_skipped_session(title) {
                    debug!(session = title, "skipping non-technical session");
                    continue;
                }
                for talk in array(session, "talks") {
                    if let Some(paper) = talk_to_paper(talk, conference, year) {
                        papers.push(paper);
                    }
                }
            }
        }
    }
    papers
}

fn is_skipped_session(title: &str) -> bool {
    let lower = title.to_lowercase();
    SKIPPED_SESSIONS.iter().any(|word| lower.contains(word))
}

fn has_paper_id(talk: &Value) -> bool {
    match talk.get("paperId") {
        Some(Value::String(id)) => !id.trim().is_empty(),
        Some(Value::Number(n)) => n.as_i64().is_none_or(|n| n != 0),
        _ => false,
    }
}

/// A string, or a list of strings, flattened to non-empty trimmed entries.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) => non_empty(Some(text.as_str())).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|item| non_empty(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
}

fn text_field(talk: &Value, key: &str) -> Option<String> {
    non_empty(talk.get(key).and_then(Value::as_str))
}

fn talk_to_paper(talk: &Value, conference: &str, year: i32) -> Option<NewPaper> {
    if !talk.is_object() {
        warn!("skipping malformed talk entry");
        return None;
    }
    if !has_paper_id(talk) {
        return None;
    }
    let Some(title) = text_field(talk, "title") else {
        debug!("skipping talk with empty title");
        return None;
    };

    let mut paper = NewPaper::new(title, conference);
    paper.year = Some(year);
    paper.authors = string_list(talk.get("authors"));
    paper.abstract_text = text_field(talk, "abstract");

    let paper_url = text_field(talk, "paperUrl");
    let eprint = text_field(talk, "eprint");
    if let Some(url) = &paper_url
        && let Some((_, doi)) = url.rsplit_once("doi.org/")
    {
        paper.doi = non_empty(Some(doi));
    }
    paper.pdf_url = match (&paper_url, &eprint) {
        (Some(url), _) if url.contains("doi.org") => Some(url.clone()),
        (_, Some(eprint)) => Some(format!("{eprint}.pdf")),
        _ => None,
    };
    paper.url = paper_url.or(eprint);

    let mut notes = Vec::new();
    if let Some(slides) = text_field(talk, "slidesUrl") {
        notes.push(format!("Slides: {slides}"));
    }
    if let Some(video) = text_field(talk, "videoUrl") {
        notes.push(format!("Video: {video}"));
    }
    let keywords = string_list(talk.get("keywords"));
    if !keywords.is_empty() {
        notes.push(format!("Keywords: {}", keywords.join(", ")));
    }
    let affiliations = string_list(talk.get("affiliations"));
    if !affiliations.is_empty() {
        notes.push(format!("Affiliations: {}", affiliations.join("; ")));
    }
    if !notes.is_empty() {
        paper.notes = Some(notes.join("\n"));
    }

    Some(paper)
}
