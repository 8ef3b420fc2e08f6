use std::collections::{HashSet, VecDeque};

const SLICE_CHARS: usize = 24;

/// Cheap fingerprint of a base64 audio payload: length plus head/tail
/// slices. Fast at chunk-arrival rates; distinct fragments of equal length
/// sharing head and tail bytes do collide, which is accepted.
pub fn chunk_signature(payload: &str) -> String {
    let head: String = payload.chars().take(SLICE_CHARS).collect();
    let tail: String = if payload.len() > SLICE_CHARS {
        let skip = payload.chars().count().saturating_sub(SLICE_CHARS);
        payload.chars().skip(skip).collect()
    } else {
        payload.to_string()
    };
    format!("{}:{}:{}", payload.len(), head, tail)
}

// ── DedupWindow ────────────────────────────────────────────────

/// Bounded set of recently seen chunk signatures with FIFO eviction.
/// A forgetting window, not a correctness guarantee: once a signature is
/// evicted, a late redelivery of the same fragment plays again.
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Insert `signature` if unseen. Returns true when the signature is new
    /// (the caller should schedule the fragment), false on a duplicate.
    pub fn check_and_insert(&mut self, signature: &str) -> bool {
        if self.seen.contains(signature) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(signature.to_string());
        self.seen.insert(signature.to_string());
        true
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
