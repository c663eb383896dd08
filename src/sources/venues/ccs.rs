//! ACM CCS accepted-papers page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{
    ListingFormat, absolute_link, compile_static_regex, compile_static_selector, element_text,
    listing_paper,
};
use crate::store::NewPaper;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("div[class], li[class]"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h1, h2, h3, h4"));
static CLASSED: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("[class]"));
static TEXT_BLOCK: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("p, span"));
static LINK: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a"));
static PAPER_CLASS: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)paper|publication"));

/// Paper cards are `div`/`li` elements whose class mentions "paper" or "publication".
#[derive(Debug, Clone, Copy, Default)]
pub struct CcsListing;

impl ListingFormat for CcsListing {
    fn adapter_name(&self) -> &'static str {
        "ccs"
    }

    fn url_template(&self) -> &'static str {
        "https://www.sigsac.org/ccs/CCS{year}/accepted-papers.html"
    }

    fn parse(&self, html: &str, page_url: &Url, year: i32, conference: &str) -> Vec<NewPaper> {
        let document = Html::parse_document(html);
        let mut papers = Vec::new();

        for card in document.select(&CONTAINER) {
            let class = card.value().attr("class").unwrap_or_default();
            if !PAPER_CLASS.is_match(class) {
                continue;
            }
            let Some(heading) = card.select(&HEADING).next() else {
                continue;
            };
            let title = element_text(heading);
            if title.is_empty() {
                continue;
            }

            let authors = author_block(card)
                .or_else(|| card.select(&TEXT_BLOCK).next())
                .map(element_text)
                .unwrap_or_default();
            let link = card
                .select(&LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| absolute_link(page_url, href));

            papers.push(listing_paper(conference, year, &title, &authors, link));
        }
        papers
    }
}

fn author_block(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    card.select(&CLASSED).find(|el| {
        el.value()
            .attr("class")
            .is_some_and(|class| class.to_lowercase().contains("author"))
    })
}
