//! NDSS accepted-papers page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{
    ListingFormat, absolute_link, compile_static_selector, element_text, listing_paper,
};
use crate::store::NewPaper;

static TITLE: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h3"));
static ANY: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("*"));

/// Each `h3` is a title; the first "More Details" link and the first `p`
/// after it (in document order) give the landing page and authors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdssListing;

impl ListingFormat for NdssListing {
    fn adapter_name(&self) -> &'static str {
        "ndss"
    }

    fn url_template(&self) -> &'static str {
        "https://www.ndss-symposium.org/ndss{year}/accepted-papers/"
    }

    fn parse(&self, html: &str, page_url: &Url, year: i32, conference: &str) -> Vec<NewPaper> {
        let document = Html::parse_document(html);
        let elements: Vec<ElementRef<'_>> = document.select(&ANY).collect();
        let mut papers = Vec::new();

        for (index, element) in elements.iter().enumerate() {
            if !TITLE.matches(element) {
                continue;
            }
            let title = element_text(*element);
            if title.is_empty() {
                continue;
            }
            // Stop at the next title so a paper never borrows its neighbour's fields.
            let following = elements[index + 1..]
                .iter()
                .take_while(|next| !TITLE.matches(next))
                .filter(|next| !is_descendant(next, element));

            let mut link = None;
            let mut authors = None;
            for next in following {
                match next.value().name() {
                    "a" if link.is_none() && element_text(*next) == "More Details" => {
                        link = next
                            .value()
                            .attr("href")
                            .and_then(|href| absolute_link(page_url, href));
                    }
                    "p" if authors.is_none() => authors = Some(element_text(*next)),
                    _ => {}
                }
            }

            papers.push(listing_paper(
                conference,
                year,
                &title,
                authors.as_deref().unwrap_or_default(),
                link,
            ));
        }
        papers
    }
}

fn is_descendant(candidate: &ElementRef<'_>, ancestor: &ElementRef<'_>) -> bool {
    candidate.ancestors().any(|node| node.id() == ancestor.id())
}
