//! Decoding of structured timeline payloads.
//!
//! Besides scraping the rendered view, items can be captured from the JSON
//! timeline responses the host page fetches. Those payloads are deeply
//! nested and most fields are optional, so they are decoded into explicit
//! types with per-field defaults:
//!
//! ```text
//! data.user.result.timeline_v2.timeline        (first match wins)
//! data.user.result.timeline.timeline
//! data.user_result.result.timeline_v2.timeline
//!   └─ instructions[] ─ entries[] | moduleItems[]
//!        └─ content.itemContent | item.itemContent
//!             └─ tweet_results.result ─ { tweet: {...} } | {...}
//! ```
//!
//! A payload that does not decode at the top level yields no items. An
//! entry that does not decode is skipped; the rest of the payload is kept.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::models::Item;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Deserialize)]
struct Envelope {
    data: Option<EnvelopeData>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    user: Option<UserResult>,
    user_result: Option<UserResult>,
}

#[derive(Deserialize)]
struct UserResult {
    result: Option<UserTimelines>,
}

#[derive(Deserialize)]
struct UserTimelines {
    timeline_v2: Option<TimelineWrapper>,
    timeline: Option<TimelineWrapper>,
}

#[derive(Deserialize)]
struct TimelineWrapper {
    timeline: Option<Timeline>,
}

#[derive(Deserialize)]
struct Timeline {
    #[serde(default)]
    instructions: Vec<Instruction>,
}

/// Entries stay untyped here so one bad entry cannot sink the instruction.
#[derive(Deserialize)]
struct Instruction {
    entries: Option<Vec<Value>>,
    #[serde(rename = "moduleItems")]
    module_items: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct Entry {
    content: Option<EntryContent>,
    item: Option<EntryContent>,
}

#[derive(Deserialize)]
struct EntryContent {
    #[serde(rename = "itemContent")]
    item_content: Option<ItemContent>,
}

#[derive(Deserialize)]
struct ItemContent {
    tweet_results: Option<TweetResults>,
}

#[derive(Deserialize)]
struct TweetResults {
    result: Option<TweetResult>,
}

/// Results arrive either bare or wrapped in a visibility envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum TweetResult {
    Wrapped { tweet: Tweet },
    Bare(Tweet),
}

impl TweetResult {
    fn into_tweet(self) -> Tweet {
        match self {
            TweetResult::Wrapped { tweet } => tweet,
            TweetResult::Bare(tweet) => tweet,
        }
    }
}

#[derive(Deserialize)]
struct Tweet {
    rest_id: Option<String>,
    legacy: Option<Legacy>,
    views: Option<Views>,
}

#[derive(Deserialize)]
struct Views {
    count: Option<String>,
}

/// Every field tolerates both absence and an explicit `null`.
#[derive(Deserialize)]
struct Legacy {
    id_str: Option<String>,
    full_text: Option<String>,
    created_at: Option<String>,
    favorite_count: Option<u64>,
    retweet_count: Option<u64>,
    reply_count: Option<u64>,
    entities: Option<Entities>,
    retweeted_status_result: Option<Value>,
    is_quote_status: Option<bool>,
    quoted_status_id_str: Option<String>,
}

#[derive(Deserialize)]
struct Entities {
    media: Option<Vec<Media>>,
}

#[derive(Deserialize)]
struct Media {
    media_url_https: Option<String>,
}

/// Decode every item in a timeline payload, attributing them to `handle`.
pub fn decode_timeline(payload: &Value, handle: &str) -> Vec<Item> {
    let Ok(envelope) = Envelope::deserialize(payload) else {
        return Vec::new();
    };
    let Some(timeline) = select_timeline(envelope) else {
        return Vec::new();
    };

    timeline
        .instructions
        .into_iter()
        .flat_map(|ins| ins.entries.or(ins.module_items).unwrap_or_default())
        .filter_map(|entry| decode_entry(&entry, handle))
        .collect()
}

/// Parse `raw` as JSON and decode it; invalid JSON yields no items.
pub fn decode_timeline_str(raw: &str, handle: &str) -> Vec<Item> {
    match serde_json::from_str::<Value>(raw) {
        Ok(payload) => decode_timeline(&payload, handle),
        Err(_) => Vec::new(),
    }
}

fn select_timeline(envelope: Envelope) -> Option<Timeline> {
    let data = envelope.data?;
    let user = data.user.and_then(|u| u.result);
    let (user_v2, user_v1) = match user {
        Some(t) => (t.timeline_v2, t.timeline),
        None => (None, None),
    };
    let alt_v2 = data
        .user_result
        .and_then(|u| u.result)
        .and_then(|t| t.timeline_v2);

    [user_v2, user_v1, alt_v2]
        .into_iter()
        .flatten()
        .find_map(|w| w.timeline)
}

fn decode_entry(raw: &Value, handle: &str) -> Option<Item> {
    let entry = Entry::deserialize(raw).ok()?;
    let result = [entry.content, entry.item]
        .into_iter()
        .flatten()
        .filter_map(|c| c.item_content)
        .filter_map(|ic| ic.tweet_results)
        .find_map(|tr| tr.result)?;

    let tweet = result.into_tweet();
    let legacy = tweet.legacy?;
    let id = legacy.id_str.or(tweet.rest_id)?;

    let timestamp = legacy
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0);

    let views = tweet
        .views
        .and_then(|v| v.count)
        .and_then(|c| c.parse::<u64>().ok())
        .unwrap_or(0);

    let media_urls: Vec<String> = legacy
        .entities
        .and_then(|e| e.media)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| m.media_url_https)
        .collect();

    Some(Item {
        id,
        source_handle: handle.to_string(),
        text: legacy.full_text.unwrap_or_default(),
        timestamp,
        likes: legacy.favorite_count.unwrap_or_default(),
        reposts: legacy.retweet_count.unwrap_or_default(),
        replies: legacy.reply_count.unwrap_or_default(),
        views,
        has_media: !media_urls.is_empty(),
        media_urls,
        is_repost: legacy.retweeted_status_result.is_some(),
        is_quote: legacy.is_quote_status.unwrap_or_default(),
        quoted_item_id: legacy.quoted_status_id_str,
    })
}
