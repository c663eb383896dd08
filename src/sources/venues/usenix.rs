//! USENIX Security technical-sessions page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{
    ListingFormat, absolute_link, compile_static_regex, compile_static_selector, element_text,
    listing_paper,
};
use crate::store::NewPaper;

static HEADING: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h2"));
static LINK: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a"));

/// Award and format markers trailing the author line.
static AUTHOR_TRAILERS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        compile_static_regex(r"(?i)Short Presentation.*$"),
        compile_static_regex(r"(?i)Distinguished Paper.*$"),
    ]
});

/// Each `h2` with a link is a paper; the next sibling element holds the authors.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsenixListing;

impl ListingFormat for UsenixListing {
    fn adapter_name(&self) -> &'static str {
        "usenix"
    }

    fn url_template(&self) -> &'static str {
        "https://www.usenix.org/conference/usenixsecurity{year}/technical-sessions"
    }

    fn parse(&self, html: &str, page_url: &Url, year: i32, conference: &str) -> Vec<NewPaper> {
        let document = Html::parse_document(html);
        let mut papers = Vec::new();

        for heading in document.select(&HEADING) {
            let Some(link) = heading.select(&LINK).next() else {
                continue;
            };
            let title = element_text(link);
            if title.is_empty() {
                debug!("skipping heading with empty link text");
                continue;
            }
            let landing = link
                .value()
                .attr("href")
                .and_then(|href| absolute_link(page_url, href));

            let authors = heading
                .next_siblings()
                .find_map(ElementRef::wrap)
                .map(|sibling| strip_trailers(&element_text(sibling)))
                .unwrap_or_default();

            let mut paper = listing_paper(conference, year, &title, &authors, landing.clone());
            paper.pdf_url = landing;
            papers.push(paper);
        }
        papers
    }
}

fn strip_trailers(authors: &str) -> String {
    AUTHOR_TRAILERS
        .iter()
        .fold(authors.to_string(), |text, re| re.replace(&text, "").into_owned())
        .trim()
        .to_string()
}
