//! editorial2rss - keep an RSS feed of editorial articles from a saved
//! category page.
//!
//! One run reads the page, extracts the editorial cards, appends the ones
//! whose links are not yet in the feed, caps the feed at `max_items` and
//! rewrites it.

pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod merge;
pub mod pipeline;
mod text;

pub use config::{ChannelConfig, Config, ConfigError};
pub use error::{Error, Result};
pub use extract::{extract_articles, ArticleRecord};
pub use feed::{Channel, Enclosure, FeedDocument, FeedError, FeedItem, XmlElement, XmlNode};
pub use merge::{merge_articles, MergeOutcome};
pub use pipeline::{run, run_at, RunSummary};
