//! IEEE S&P program-papers page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{ListingFormat, compile_static_selector, element_text, listing_paper};
use crate::store::NewPaper;

/// Shorter bold runs are labels ("Session 3", "Chair:"), not titles.
const MIN_TITLE_CHARS: usize = 10;

static BOLD: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("b"));

/// Titles are bold runs; the enclosing element's remaining text is the author line.
#[derive(Debug, Clone, Copy, Default)]
pub struct IeeeSpListing;

impl ListingFormat for IeeeSpListing {
    fn adapter_name(&self) -> &'static str {
        "ieee-sp"
    }

    fn url_template(&self) -> &'static str {
        "https://www.ieee-security.org/TC/SP{year}/program-papers.html"
    }

    fn parse(&self, html: &str, _page_url: &Url, year: i32, conference: &str) -> Vec<NewPaper> {
        let document = Html::parse_document(html);
        let program_url = format!("https://www.ieee-security.org/TC/SP{year}/");
        let mut papers = Vec::new();

        for bold in document.select(&BOLD) {
            let title = element_text(bold);
            if title.chars().count() < MIN_TITLE_CHARS {
                continue;
            }
            let authors = bold
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| element_text(parent).replacen(&title, "", 1))
                .unwrap_or_default();
            let authors = authors.trim_matches(|c: char| c.is_whitespace() || c == ',');

            papers.push(listing_paper(
                conference,
                year,
                &title,
                authors,
                Some(program_url.clone()),
            ));
        }
        papers
    }
}
