//! Editorial article extraction from a saved category page.
//!
//! An editorial article is any `a.stretched-link` whose href contains
//! `/editorial/`. Its fields come from the nearest enclosing
//! `div.position-relative`, which is either the main card (h1, p, img) or
//! a secondary card (h5, img).
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::text::element_text;

static ARTICLE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.stretched-link[href*='/editorial/']").unwrap());
static MAIN_HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static CARD_HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h5").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

const CONTAINER_TAG: &str = "div";
const CONTAINER_CLASS: &str = "position-relative";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Trimmed href of the article link; the dedup key.
    pub url: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Always empty; the page carries no publish date and the feed stamps its own time.
    pub published_at: String,
}

/// Lazily walk the document and yield one record per qualifying link, in
/// document order. Candidates with an empty href, no card container or no
/// title are skipped.
pub fn extract_articles(document: &Html) -> impl Iterator<Item = ArticleRecord> + '_ {
    document.select(&ARTICLE_LINKS).filter_map(resolve_candidate)
}

fn resolve_candidate(anchor: ElementRef<'_>) -> Option<ArticleRecord> {
    let url = anchor.value().attr("href").unwrap_or("").trim();
    if url.is_empty() {
        debug!("skipping editorial link with empty href");
        return None;
    }

    let Some(container) = find_container(anchor) else {
        debug!(url, "skipping editorial link outside any card container");
        return None;
    };

    let Some(title) = card_title(container) else {
        debug!(url, "skipping editorial link without a title");
        return None;
    };

    let description = container
        .select(&PARAGRAPH)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let image_url = container
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    Some(ArticleRecord {
        url: url.to_string(),
        title,
        description,
        image_url,
        published_at: String::new(),
    })
}

fn find_container(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    anchor.ancestors().filter_map(ElementRef::wrap).find(|el| {
        el.value().name() == CONTAINER_TAG
            && el.value().classes().any(|c| c == CONTAINER_CLASS)
    })
}

// An h1 wins outright when present, even if empty; h5 is only consulted without one.
fn card_title(container: ElementRef<'_>) -> Option<String> {
    let heading = container
        .select(&MAIN_HEADING)
        .next()
        .or_else(|| container.select(&CARD_HEADING).next())?;
    let title = element_text(heading);
    (!title.is_empty()).then_some(title)
}
