//! User-Agent classification for request logs.
//!
//! The tag never changes what a client is served: the tarpit streams the
//! same content to every caller regardless of how it is classified.

pub mod known_bots;

use dashmap::DashMap;
use serde::Serialize;

pub use known_bots::{classify_user_agent, BotTag};

/// Running count of requests per tag.
#[derive(Debug, Default)]
pub struct TagCounter {
    counts: DashMap<BotTag, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: BotTag,
    pub count: u64,
}

impl TagCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `ua`, count it and return the tag.
    pub fn observe(&self, ua: &str) -> BotTag {
        let tag = classify_user_agent(ua);
        *self.counts.entry(tag).or_insert(0) += 1;
        tag
    }

    pub fn get(&self, tag: BotTag) -> u64 {
        self.counts.get(&tag).map(|c| *c).unwrap_or(0)
    }

    /// Counts for every tag, in a fixed order.
    pub fn snapshot(&self) -> Vec<TagCount> {
        BotTag::ALL
            .iter()
            .map(|&tag| TagCount {
                tag,
                count: self.get(tag),
            })
            .collect()
    }
}
