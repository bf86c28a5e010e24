use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct HarvestCounters {
    pub cycles: Arc<AtomicU64>,
    pub context_replays: Arc<AtomicU64>,
    pub fresh_fetches: Arc<AtomicU64>,
    pub empty_fetches: Arc<AtomicU64>,

    // backend refill
    pub refills: Arc<AtomicU64>,
    pub suggest_failures: Arc<AtomicU64>,
    pub cooldowns: Arc<AtomicU64>,
    pub harvested_resets: Arc<AtomicU64>,

    // push dispatch
    pub pushes_submitted: Arc<AtomicU64>,
    pub pushes_rejected: Arc<AtomicU64>,
    pub pushes_delivered: Arc<AtomicU64>,
    pub pushes_failed: Arc<AtomicU64>,
}

/// Point-in-time copy of [`HarvestCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub cycles: u64,
    pub context_replays: u64,
    pub fresh_fetches: u64,
    pub empty_fetches: u64,
    pub refills: u64,
    pub suggest_failures: u64,
    pub cooldowns: u64,
    pub harvested_resets: u64,
    pub pushes_submitted: u64,
    pub pushes_rejected: u64,
    pub pushes_delivered: u64,
    pub pushes_failed: u64,
}

impl HarvestCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            cycles: get(&self.cycles),
            context_replays: get(&self.context_replays),
            fresh_fetches: get(&self.fresh_fetches),
            empty_fetches: get(&self.empty_fetches),
            refills: get(&self.refills),
            suggest_failures: get(&self.suggest_failures),
            cooldowns: get(&self.cooldowns),
            harvested_resets: get(&self.harvested_resets),
            pushes_submitted: get(&self.pushes_submitted),
            pushes_rejected: get(&self.pushes_rejected),
            pushes_delivered: get(&self.pushes_delivered),
            pushes_failed: get(&self.pushes_failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_cells() {
        let a = HarvestCounters::default();
        let b = a.clone();

        HarvestCounters::bump(&a.cycles);
        HarvestCounters::bump(&b.cycles);
        HarvestCounters::bump(&b.pushes_failed);

        let snap = a.snapshot();
        assert_eq!(snap.cycles, 2);
        assert_eq!(snap.pushes_failed, 1);
        assert_eq!(snap.refills, 0);
    }

    #[test]
    fn snapshot_serializes_every_counter() {
        let c = HarvestCounters::default();
        HarvestCounters::bump(&c.pushes_delivered);

        let json = serde_json::to_value(c.snapshot()).unwrap();

        assert_eq!(json["pushes_delivered"], 1);
        assert_eq!(json["cycles"], 0);
        assert_eq!(json.as_object().map(|o| o.len()), Some(12));
    }
}
