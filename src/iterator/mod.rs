use crate::error::Result;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Ordered cursor over `(key, value)` pairs returned by every store.
pub type KvIterator<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + Send + 'a>;

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    source: usize,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed so the max-heap pops the smallest key first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Globally ordered view over per-shard cursors with disjoint keyspaces.
///
/// Keeps at most one buffered head per source. Keys are never deduplicated:
/// the router guarantees no key lives in two shards. The first error from any
/// source is yielded once and ends the iteration.
pub struct MergedIterator<'a> {
    sources: Vec<KvIterator<'a>>,
    heap: BinaryHeap<HeapEntry>,
    pending_error: Option<crate::Error>,
    started: bool,
    done: bool,
}

impl<'a> MergedIterator<'a> {
    pub fn new(sources: Vec<KvIterator<'a>>) -> Self {
        let capacity = sources.len();
        Self {
            sources,
            heap: BinaryHeap::with_capacity(capacity),
            pending_error: None,
            started: false,
            done: false,
        }
    }

    /// Pulls the next head of `source` into the heap. Exhausted sources simply
    /// stop contributing.
    fn refill(&mut self, source: usize) {
        match self.sources[source].next() {
            Some(Ok((key, value))) => self.heap.push(HeapEntry { key, value, source }),
            Some(Err(err)) => {
                if self.pending_error.is_none() {
                    self.pending_error = Some(err);
                }
            }
            None => {}
        }
    }
}

impl Iterator for MergedIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            for source in 0..self.sources.len() {
                self.refill(source);
            }
        }
        if let Some(err) = self.pending_error.take() {
            self.done = true;
            return Some(Err(err));
        }

        let entry = match self.heap.pop() {
            Some(entry) => entry,
            None => {
                self.done = true;
                return None;
            }
        };
        self.refill(entry.source);
        if let Some(next) = self.heap.peek() {
            debug_assert!(next.key > entry.key, "shard keyspaces overlap");
        }
        Some(Ok((entry.key, entry.value)))
    }
}
