use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::extract::ArticleRecord;
use crate::feed::{Channel, Enclosure, FeedItem};

const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub duplicates: usize,
}

pub fn format_pub_date(now: DateTime<Utc>) -> String {
    now.format(PUB_DATE_FORMAT).to_string()
}

/// Append every record whose url is not yet a link in `channel`, in the
/// order given. Links added here count as existing for later records.
pub fn merge_articles<I>(
    channel: &mut Channel,
    records: I,
    now: DateTime<Utc>,
    enclosure_type: &str,
) -> MergeOutcome
where
    I: IntoIterator<Item = ArticleRecord>,
{
    let mut existing: HashSet<String> = channel
        .items
        .iter()
        .filter_map(|it| it.link.as_deref())
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .collect();

    let stamp = format_pub_date(now);
    let mut outcome = MergeOutcome::default();

    for record in records {
        if !existing.insert(record.url.clone()) {
            debug!(url = %record.url, "already in feed");
            outcome.duplicates += 1;
            continue;
        }

        let enclosure = (!record.image_url.is_empty()).then(|| Enclosure {
            url: record.image_url,
            mime_type: enclosure_type.to_string(),
        });

        channel.items.push(FeedItem {
            title: Some(record.title),
            link: Some(record.url),
            description: Some(record.description),
            pub_date: Some(stamp.clone()),
            enclosure,
            extra: Vec::new(),
        });
        outcome.added += 1;
    }

    outcome
}
