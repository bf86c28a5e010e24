use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, instrument};

use crate::metrics::HarvestCounters;
use crate::timeline::{Timeline, context_terms};

/// Queue of discovered context terms plus the set of already-harvested terms.
///
/// Guarantees:
/// - `pending` never holds more than `max_pending` terms; excess is trimmed from the tail.
/// - `pending` holds no duplicates and no harvested term.
/// - `harvested` never holds more than `max_harvested` terms; on reaching the
///   cap it is cleared entirely.
///
/// Both collections sit behind one lock so the dedup check-then-insert is atomic
/// even when a background task touches the frontier.
pub struct ContextFrontier {
    max_pending: usize,
    max_harvested: usize,
    state: Mutex<FrontierState>,
    counters: HarvestCounters,
}

#[derive(Default)]
struct FrontierState {
    /// Front = explore first.
    pending: VecDeque<String>,
    harvested: HashSet<String>,
}

impl ContextFrontier {
    pub fn new(max_pending: usize, max_harvested: usize, counters: HarvestCounters) -> Self {
        Self {
            max_pending,
            max_harvested,
            state: Mutex::new(FrontierState::default()),
            counters,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_pending_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    pub fn harvested_len(&self) -> usize {
        self.state.lock().harvested.len()
    }

    pub fn is_harvested(&self, term: &str) -> bool {
        self.state.lock().harvested.contains(term)
    }

    /// Pending terms in replay order.
    pub fn pending_snapshot(&self) -> Vec<String> {
        self.state.lock().pending.iter().cloned().collect()
    }

    /// Offers one term to the queue. Returns `true` if it was enqueued.
    ///
    /// `front` marks a priority (explore-first) insert. A non-priority insert
    /// into a full queue is dropped. Terms already pending or harvested are
    /// ignored, so repeating a call is a no-op for the queue contents.
    pub fn check_context(&self, term: &str, front: bool) -> bool {
        let mut st = self.state.lock();

        let inserted = if !front && st.pending.len() >= self.max_pending {
            debug!(term, "context queue full; candidate dropped");
            false
        } else if st.harvested.contains(term) || st.pending.iter().any(|t| t == term) {
            false
        } else {
            if front {
                st.pending.push_front(term.to_string());
            } else {
                st.pending.push_back(term.to_string());
            }
            true
        };

        while st.pending.len() > self.max_pending {
            st.pending.pop_back();
        }

        if st.harvested.len() >= self.max_harvested {
            self.reset_harvested(&mut st);
        }

        inserted
    }

    /// Offers every context term found in `timeline`. Returns how many were enqueued.
    #[instrument(skip(self, timeline), target = "frontier", fields(items = timeline.len()))]
    pub fn check_timeline(&self, timeline: &Timeline, front: bool) -> usize {
        let mut added = 0;
        for message in timeline {
            for term in context_terms(message) {
                if self.check_context(&term, front) {
                    added += 1;
                }
            }
        }

        debug!(added, pending = self.pending_len(), "context extracted");
        added
    }

    /// Takes the next term to replay. `None` when the queue is (or became) empty.
    pub fn pop_front(&self) -> Option<String> {
        self.state.lock().pending.pop_front()
    }

    /// Records `term` as used for a fetch and removes it from the queue.
    ///
    /// A full set is cleared before the insert, so the cap is never exceeded.
    pub fn mark_harvested(&self, term: &str) {
        let mut st = self.state.lock();
        st.pending.retain(|t| t != term);

        if st.harvested.contains(term) {
            return;
        }
        if st.harvested.len() >= self.max_harvested {
            self.reset_harvested(&mut st);
        }
        st.harvested.insert(term.to_string());
    }

    fn reset_harvested(&self, st: &mut FrontierState) {
        let count = st.harvested.len();
        st.harvested.clear();
        HarvestCounters::bump(&self.counters.harvested_resets);

        info!(
            target: "frontier",
            count,
            cap = self.max_harvested,
            "harvested set reached its cap; cleared"
        );
    }
}
