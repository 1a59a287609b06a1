//! Bounded top-k selection with a total, deterministic order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::backend::ScoredId;

/// Result order: descending score, ties by ascending record id.
pub fn rank_order(a: &ScoredId, b: &ScoredId) -> Ordering {
    b.score.total_cmp(&a.score).then(a.id.cmp(&b.id))
}

/// Sort in result order.
pub fn sort_ranked(hits: &mut [ScoredId]) {
    hits.sort_by(rank_order);
}

struct Ranked(ScoredId);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        rank_order(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    // The heap top is the worst-ranked entry kept so far.
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&self.0, &other.0)
    }
}

/// Keeps the best `k` hits seen.
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
        }
    }

    pub fn push(&mut self, hit: ScoredId) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() == self.k {
            match self.heap.peek() {
                Some(worst) if rank_order(&hit, &worst.0) == Ordering::Less => {
                    self.heap.pop();
                }
                _ => return,
            }
        }
        self.heap.push(Ranked(hit));
    }

    pub fn merge(&mut self, other: TopK) {
        for Ranked(hit) in other.heap {
            self.push(hit);
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Best first.
    pub fn into_sorted_vec(self) -> Vec<ScoredId> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}
