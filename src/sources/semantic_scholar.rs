//! Semantic Scholar Graph API client used by the enrichment pass.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{EnrichmentSource, SourceError, non_empty, pause};
use crate::fetch::Fetcher;

/// Default Graph API base URL.
pub const SEMANTIC_SCHOLAR_API_URL: &str = "https://api.semanticscholar.org/graph/v1";

/// Default pause after each successful call.
pub const DEFAULT_ENRICH_DELAY: Duration = Duration::from_secs(2);

const ADAPTER_NAME: &str = "semantic-scholar";

const FIELDS: &str = "title,abstract,authors,year,citationCount,publicationDate,externalIds";

/// Fields recovered for one paper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub abstract_text: Option<String>,
    pub citation_count: Option<i64>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
}

impl Enrichment {
    /// True when a non-blank abstract was found.
    #[must_use]
    pub fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Human-readable note, e.g. `Citations: 12; Date: 2024-08-18`.
    #[must_use]
    pub fn note(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(count) = self.citation_count {
            parts.push(format!("Citations: {count}"));
        }
        if let Some(date) = &self.publication_date {
            parts.push(format!("Date: {date}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPaper {
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    citation_count: Option<i64>,
    publication_date: Option<String>,
    external_ids: Option<ExternalIds>,
}

impl From<ApiPaper> for Enrichment {
    fn from(paper: ApiPaper) -> Self {
        Self {
            abstract_text: non_empty(paper.abstract_text.as_deref()),
            citation_count: paper.citation_count,
            publication_date: non_empty(paper.publication_date.as_deref()),
            doi: non_empty(paper.external_ids.and_then(|ids| ids.doi).as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiPaper>,
}

/// Rate-limited Semantic Scholar client.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    fetcher: Fetcher,
    base_url: String,
    delay: Duration,
}

impl SemanticScholarClient {
    /// Creates a client against the public API.
    #[must_use]
    pub fn new(fetcher: Fetcher) -> Self {
        Self::with_base_url(fetcher, SEMANTIC_SCHOLAR_API_URL)
    }

    /// Creates a client against a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(fetcher: Fetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            delay: DEFAULT_ENRICH_DELAY,
        }
    }

    /// Sets the pause applied after each successful call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Option<String>, SourceError> {
        match self.fetcher.get_text(url, params).await {
            Ok(body) => {
                pause(self.delay).await;
                Ok(Some(body))
            }
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

fn parse_error(error: &serde_json::Error) -> SourceError {
    SourceError::parse(ADAPTER_NAME, error.to_string())
}

#[async_trait]
impl EnrichmentSource for SemanticScholarClient {
    #[instrument(skip(self), fields(adapter = ADAPTER_NAME))]
    async fn lookup_by_identifier(&self, doi: &str) -> Result<Option<Enrichment>, SourceError> {
        let url = format!("{}/paper/DOI:{}", self.base_url, doi.trim());
        let Some(body) = self.get(&url, &[("fields", FIELDS)]).await? else {
            debug!("DOI not known upstream");
            return Ok(None);
        };
        let paper: ApiPaper = serde_json::from_str(&body).map_err(|e| parse_error(&e))?;
        Ok(Some(paper.into()))
    }

    #[instrument(skip(self), fields(adapter = ADAPTER_NAME))]
    async fn lookup_by_title(&self, title: &str) -> Result<Option<Enrichment>, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let params = [("query", title.trim()), ("limit", "1"), ("fields", FIELDS)];
        let Some(body) = self.get(&url, &params).await? else {
            return Ok(None);
        };
        let response: SearchResponse = serde_json::from_str(&body).map_err(|e| parse_error(&e))?;
        let found = response.data.into_iter().next().map(Enrichment::from);
        if found.is_none() {
            debug!("title search returned no results");
        }
        Ok(found)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn client(base: &str) -> SemanticScholarClient {
        let fetcher = Fetcher::new(&FetchConfig {
            timeout: Duration::from_secs(5),
            retry_times: 1,
            retry_delay: Duration::from_millis(1),
            user_agent: "paper-harvest-test".to_string(),
        })
        .unwrap();
        SemanticScholarClient::with_base_url(fetcher, base).with_delay(Duration::ZERO)
    }

    #[test]
    fn test_note_formats_citations_and_date() {
        let enrichment = Enrichment {
            citation_count: Some(12),
            publication_date: Some("2024-08-18".to_string()),
            ..Enrichment::default()
        };
        assert_eq!(
            enrichment.note().as_deref(),
            Some("Citations: 12; Date: 2024-08-18")
        );
        assert_eq!(Enrichment::default().note(), None);
    }

    #[test]
    fn test_blank_abstract_is_not_an_abstract() {
        let paper: ApiPaper = serde_json::from_value(json!({"abstract": "  "})).unwrap();
        assert!(!Enrichment::from(paper).has_abstract());
    }

    #[tokio::test]
    async fn test_lookup_by_identifier_maps_fields() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/paper/DOI:10.1145/123"))
            .and(query_param("fields", FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paperId": "abc",
                "title": "T",
                "abstract": "We show things.",
                "citationCount": 7,
                "publicationDate": "2024-05-01",
                "externalIds": {"DOI": "10.1145/123"}
            })))
            .mount(&server)
            .await;

        let found = client(&server.uri())
            .lookup_by_identifier("10.1145/123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.abstract_text.as_deref(), Some("We show things."));
        assert_eq!(found.citation_count, Some(7));
        assert_eq!(found.doi.as_deref(), Some("10.1145/123"));
    }

    #[tokio::test]
    async fn test_lookup_by_identifier_404_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let found = client(&server.uri()).lookup_by_identifier("10.1/none").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_title_takes_first_result() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("query", "Lattice Tricks"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "data": [{"abstract": "Found by title.", "citationCount": 1}]
            })))
            .mount(&server)
            .await;

        let found = client(&server.uri())
            .lookup_by_title("Lattice Tricks")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.abstract_text.as_deref(), Some("Found by title."));
    }

    #[tokio::test]
    async fn test_lookup_by_title_empty_data_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "data": []})))
            .mount(&server)
            .await;

        assert!(client(&server.uri()).lookup_by_title("Nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_fetch_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server.uri()).lookup_by_title("x").await.unwrap_err();
        assert!(err.is_transport());
    }
}
