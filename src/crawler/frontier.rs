//! Breadth-first work queue with an atomic visited set

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
    pub parent: Option<Url>,
}

/// FIFO frontier
///
/// A URL is marked seen when it is enqueued, not when it is fetched. The
/// check and the mark happen in the same `&mut self` call, so a URL can enter
/// the queue at most once however many pages link to it. Depths in the queue
/// never decrease from front to back as long as a level is fully recorded
/// before the next one is dispatched.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `url` unless it was seen before; returns whether it was added
    ///
    /// `url` must already be normalized.
    pub fn push(&mut self, url: Url, depth: u32, parent: Option<Url>) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(FrontierEntry { url, depth, parent });
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Depth of the next entry to be popped
    pub fn peek_depth(&self) -> Option<u32> {
        self.queue.front().map(|entry| entry.depth)
    }

    /// Entries still queued
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
