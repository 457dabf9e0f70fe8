use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::model::FeedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Committed {
    generation: u64,
    items: Vec<FeedItem>,
}

/// Visible feed items; only the newest assembly run may replace them.
#[derive(Default)]
pub struct FeedState {
    next: AtomicU64,
    committed: RwLock<Committed>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Generation {
        Generation(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Stores `items` unless a newer run already committed; returns whether they were kept.
    pub fn commit(&self, generation: Generation, items: Vec<FeedItem>) -> bool {
        let mut committed = self.committed.write();
        if generation.0 < committed.generation {
            debug!(
                generation = generation.0,
                newest = committed.generation,
                "feed: discarding stale assembly"
            );
            return false;
        }
        committed.generation = generation.0;
        committed.items = items;
        true
    }

    pub fn snapshot(&self) -> (Option<Generation>, Vec<FeedItem>) {
        let committed = self.committed.read();
        let generation = (committed.generation > 0).then_some(Generation(committed.generation));
        (generation, committed.items.clone())
    }

    pub fn len(&self) -> usize {
        self.committed.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
