use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::extract_articles;
use crate::feed::FeedDocument;
use crate::merge::merge_articles;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub extracted: usize,
    pub added: usize,
    pub duplicates: usize,
    pub trimmed: usize,
    /// Items in the feed after trimming.
    pub total: usize,
}

pub fn run(config: &Config) -> Result<RunSummary> {
    run_at(config, Utc::now())
}

/// Load the page, merge its editorial articles into the feed and write the
/// feed back, stamping new items with `now`.
pub fn run_at(config: &Config, now: DateTime<Utc>) -> Result<RunSummary> {
    config.validate()?;

    if !config.html_path.is_file() {
        return Err(Error::HtmlNotFound(config.html_path.clone()));
    }
    let html = std::fs::read_to_string(&config.html_path)?;
    let document = Html::parse_document(&html);
    let mut extracted = 0;
    let records = extract_articles(&document).inspect(|_| extracted += 1);

    let mut feed = FeedDocument::load_or_default(&config.xml_path, &config.channel);
    let outcome = merge_articles(
        &mut feed.channel,
        records,
        now,
        &config.enclosure_type,
    );
    let trimmed = feed.channel.trim_to(config.max_items);
    feed.save(&config.xml_path)?;

    let summary = RunSummary {
        extracted,
        added: outcome.added,
        duplicates: outcome.duplicates,
        trimmed,
        total: feed.channel.items.len(),
    };
    info!(
        extracted = summary.extracted,
        added = summary.added,
        duplicates = summary.duplicates,
        trimmed = summary.trimmed,
        total = summary.total,
        path = %config.xml_path.display(),
        "feed updated"
    );
    Ok(summary)
}
