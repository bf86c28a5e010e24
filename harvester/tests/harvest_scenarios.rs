
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing_test::traced_test;

use harvester::backend::Explore;
use harvester::config::HarvestConfig;
use harvester::metrics::HarvestCounters;
use harvester::scheduler::{HarvestOutcome, HarvestScheduler, HarvestStrategy};

use mock_backend::{FixedDice, MockBackend, timeline, with_hashtags, with_mentions};

const PEER: &str = "http://peer.test";

fn cfg() -> HarvestConfig {
    HarvestConfig::default()
}

/// Backend already dry: context replay is eligible from the first cycle.
fn dry_cfg() -> HarvestConfig {
    HarvestConfig {
        initial_hits_on_backend: 0,
        ..Default::default()
    }
}

fn scheduler(cfg: HarvestConfig, backend: &Arc<MockBackend>, roll: u32) -> HarvestScheduler {
    HarvestScheduler::new(
        cfg,
        backend.collaborators(),
        vec![PEER.to_string()],
        HarvestCounters::default(),
    )
    .unwrap()
    .with_dice(Box::new(FixedDice(roll)))
}

// -----------------------
// Backoff / exhaustion
// -----------------------

#[tokio::test(start_paused = true)]
async fn empty_backend_and_empty_cache_pauses_then_gives_up() {
    let backend = MockBackend::new();
    backend.suggest_reply(&[], 0);
    let s = scheduler(cfg(), &backend, 1);

    let started = Instant::now();
    let outcome = s.harvest().await;

    assert_eq!(outcome.code(), -1);
    assert!(started.elapsed() >= s.config().cooldown);
    assert!(s.pending_queries().is_empty());
    assert!(s.pending_context().is_empty());
    assert_eq!(s.hits_on_backend(), 0);

    assert_eq!(backend.recent_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(backend.fetched_queries().is_empty());

    let snap = s.counters().snapshot();
    assert_eq!(snap.cooldowns, 1);
    assert_eq!(snap.refills, 1);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn suggestion_failure_is_logged_and_throttled() {
    let backend = MockBackend::new();
    backend.suggest_failure("connection refused");
    let s = scheduler(cfg(), &backend, 1);

    let started = Instant::now();
    let outcome = s.harvest().await;

    assert_eq!(outcome, HarvestOutcome::Nothing);
    assert!(started.elapsed() >= s.config().cooldown);
    assert!(logs_contain("suggestion lookup failed"));
    assert!(logs_contain("connection refused"));

    // Hit counter is left untouched by a failed lookup.
    assert_eq!(s.hits_on_backend(), cfg().initial_hits_on_backend);

    let snap = s.counters().snapshot();
    assert_eq!(snap.suggest_failures, 1);
    assert_eq!(snap.cooldowns, 1);
}

#[tokio::test(start_paused = true)]
async fn dry_backend_seeds_context_from_cache_without_pausing() {
    let backend = MockBackend::new();
    backend.suggest_reply(&[], 0);
    backend.recent_reply(timeline(vec![
        with_mentions(&["alice"]),
        with_hashtags(&["#rust"]),
    ]));
    let s = scheduler(cfg(), &backend, 1);

    let started = Instant::now();
    let outcome = s.harvest().await;

    assert_eq!(outcome.code(), -1);
    assert!(started.elapsed() < s.config().cooldown);
    assert_eq!(s.pending_context(), vec!["from:alice", "#rust"]);
    assert_eq!(s.counters().snapshot().cooldowns, 0);
}

#[tokio::test(start_paused = true)]
async fn dry_backend_with_queued_context_skips_seeding() {
    let backend = MockBackend::new();
    backend.suggest_reply(&[], 0);
    // Dice forces the fresh path although context is queued.
    let s = scheduler(dry_cfg(), &backend, 0);
    s.check_context("#queued", false);

    let started = Instant::now();
    let outcome = s.harvest().await;

    assert_eq!(outcome.code(), -1);
    assert!(started.elapsed() < s.config().cooldown);
    assert_eq!(backend.recent_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(s.pending_context(), vec!["#queued"]);
}

#[tokio::test(start_paused = true)]
async fn failed_cache_lookup_still_pauses() {
    let backend = MockBackend::new();
    backend.suggest_reply(&[], 0);
    *backend.recent.lock() = Some(Err("cache offline".into()));
    let s = scheduler(cfg(), &backend, 1);

    let started = Instant::now();
    assert_eq!(s.harvest().await.code(), -1);
    assert!(started.elapsed() >= s.config().cooldown);
}

// -----------------------
// Fresh-query path
// -----------------------

#[tokio::test(start_paused = true)]
async fn fresh_query_is_fetched_and_pushed() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["catx"], 5);
    backend.fetch_reply(
        "catx",
        timeline(vec![
            with_hashtags(&["#cats"]),
            with_hashtags(&["#cats"]),
            with_hashtags(&["#cats"]),
        ]),
    );
    let s = scheduler(cfg(), &backend, 1);
    s.check_context("#older", false);

    let outcome = s.harvest().await;

    assert_eq!(outcome, HarvestOutcome::Fetched(3));
    assert_eq!(s.hits_on_backend(), 5);
    assert!(s.is_harvested("catx"));
    assert!(s.pending_queries().is_empty());
    assert_eq!(s.pending_context(), vec!["#cats", "#older"]);

    let req = backend.fetch_log.lock()[0].clone();
    assert_eq!(req.query, "catx");
    assert_eq!(req.explore, Explore::Last);
    assert!(req.full_detail);
    assert_eq!(req.max_items, 400);

    s.shutdown().await;
    let pushes = backend.pushes.lock();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, PEER);
    assert_eq!(pushes[0].1.query.as_deref(), Some("catx"));
    assert_eq!(pushes[0].1.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn refill_keeps_remaining_suggestions_queued() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["catx", "dogs", "catx"], 120);
    let s = scheduler(cfg(), &backend, 1);

    s.harvest().await;

    assert_eq!(s.pending_queries(), vec!["dogs"]);
    assert_eq!(s.hits_on_backend(), 120);
    assert_eq!(backend.fetched_queries(), vec!["catx"]);

    // Backlog is not empty, so no refill on the next cycle.
    s.harvest().await;
    assert_eq!(backend.suggest_calls(), 1);
    assert_eq!(backend.fetched_queries(), vec!["catx", "dogs"]);
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_pushes_tagged_empty_batch_once() {
    let backend = MockBackend::new();
    let s = scheduler(cfg(), &backend, 1);
    s.enqueue_queries(["lonely".to_string()]);

    let outcome = s.harvest().await;
    assert_eq!(outcome.code(), -1);
    assert!(s.is_harvested("lonely"));

    s.shutdown().await;
    let pushes = backend.pushes.lock();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].1.query.as_deref(), Some("lonely"));
    assert!(pushes[0].1.is_empty());
    assert_eq!(s.counters().snapshot().empty_fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_query_also_queued_as_context_is_dequeued() {
    let backend = MockBackend::new();
    let s = scheduler(cfg(), &backend, 1);
    s.check_context("#dup", false);
    s.check_context("#other", false);
    s.enqueue_queries(["#dup".to_string()]);

    s.harvest().await;

    assert_eq!(s.pending_context(), vec!["#other"]);
    assert!(s.is_harvested("#dup"));
}

#[tokio::test(start_paused = true)]
async fn refill_size_follows_backend_hits() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["a"], 5_000);
    backend.suggest_reply(&["b"], 350);
    let s = scheduler(cfg(), &backend, 1);

    s.harvest().await; // hits 100 -> size 20
    s.harvest().await; // hits 5000 -> size 100

    let log = backend.suggest_log.lock();
    assert_eq!((log[0].random, log[0].count), (20, 100));
    assert_eq!((log[1].random, log[1].count), (100, 500));
    assert_eq!(s.hits_on_backend(), 350);
}

#[tokio::test(start_paused = true)]
async fn pushes_after_stop_are_rejected_but_fetch_still_counts() {
    let backend = MockBackend::new();
    backend.fetch_reply("q", timeline(vec![with_hashtags(&["#x"])]));
    let s = scheduler(cfg(), &backend, 1);
    s.enqueue_queries(["q".to_string()]);

    HarvestStrategy::stop(&s);
    let outcome = s.harvest().await;

    assert_eq!(outcome, HarvestOutcome::Fetched(1));
    assert_eq!(s.counters().snapshot().pushes_rejected, 1);

    s.shutdown().await;
    assert!(backend.pushes.lock().is_empty());
}

// -----------------------
// Strategy switch / context replay
// -----------------------

#[tokio::test(start_paused = true)]
async fn context_replay_with_empty_fetch_moves_term_to_harvested() {
    let backend = MockBackend::new();
    let s = scheduler(dry_cfg(), &backend, 1);
    s.check_context("u1", false);
    s.check_context("u2", false);

    let outcome = s.harvest().await;

    assert_eq!(outcome.code(), -1);
    assert!(s.is_harvested("u1"));
    assert_eq!(s.pending_context(), vec!["u2"]);
    assert_eq!(backend.suggest_calls(), 0, "replay never consults the backend");

    s.shutdown().await;
    assert!(backend.pushes.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn context_replay_appends_discovered_terms() {
    let backend = MockBackend::new();
    backend.fetch_reply(
        "u1",
        timeline(vec![with_mentions(&["bob"]), with_hashtags(&["#u1"])]),
    );
    let s = scheduler(dry_cfg(), &backend, 1);
    s.check_context("u1", false);
    s.check_context("u2", false);

    let outcome = s.harvest().await;

    assert_eq!(outcome, HarvestOutcome::Fetched(2));
    assert_eq!(s.pending_context(), vec!["u2", "from:bob", "#u1"]);
    assert_eq!(backend.fetch_log.lock()[0].explore, Explore::First);

    s.shutdown().await;
    assert!(backend.pushes.lock().is_empty(), "replayed results are not pushed");
    assert_eq!(s.counters().snapshot().context_replays, 1);
}

#[tokio::test(start_paused = true)]
async fn zero_roll_forces_backend_check_even_with_context() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["fresh"], 3);
    let s = scheduler(dry_cfg(), &backend, 0);
    s.check_context("u1", false);

    s.harvest().await;

    assert_eq!(backend.suggest_calls(), 1);
    assert_eq!(backend.fetched_queries(), vec!["fresh"]);
    assert_eq!(s.pending_context(), vec!["u1"]);
}

#[tokio::test(start_paused = true)]
async fn healthy_backend_prefers_fresh_queries() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["fresh"], 500);
    // Initial hits (100) are above the limit.
    let s = scheduler(cfg(), &backend, 1);
    s.check_context("u1", false);

    s.harvest().await;

    assert_eq!(backend.fetched_queries(), vec!["fresh"]);
    assert_eq!(s.pending_context(), vec!["u1"]);
}

#[tokio::test(start_paused = true)]
async fn queued_fresh_queries_block_replay() {
    let backend = MockBackend::new();
    let s = scheduler(dry_cfg(), &backend, 1);
    s.check_context("u1", false);
    s.enqueue_queries(["fresh".to_string()]);

    s.harvest().await;

    assert_eq!(backend.fetched_queries(), vec!["fresh"]);
    assert_eq!(backend.suggest_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dry_backend_switches_to_replay_after_refill() {
    let backend = MockBackend::new();
    backend.suggest_reply(&["seed"], 4);
    backend.fetch_reply("seed", timeline(vec![with_hashtags(&["#a", "#b"])]));
    let s = scheduler(cfg(), &backend, 1);

    // Cycle 1: healthy default hits -> fresh path; backend now reports 4 hits.
    assert_eq!(s.harvest().await, HarvestOutcome::Fetched(1));
    assert_eq!(s.pending_context(), vec!["#b", "#a"]);

    // Cycle 2: dry backend, empty backlog, context queued -> replay.
    s.harvest().await;
    assert_eq!(backend.fetched_queries(), vec!["seed", "#b"]);
    assert_eq!(backend.suggest_calls(), 1);
    assert_eq!(s.pending_context(), vec!["#a"]);
}

// -----------------------
// Bounds under a concurrent actor
// -----------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bounds_hold_with_background_seeding() {
    let backend = MockBackend::new();
    for i in 0..20 {
        let next = format!("t{}", i + 1);
        backend.fetch_reply(&format!("t{i}"), timeline(vec![with_hashtags(&[next.as_str()])]));
    }

    let cfg = HarvestConfig {
        initial_hits_on_backend: 0,
        max_pending: 8,
        max_harvested: 16,
        cooldown: Duration::from_millis(1),
        ..Default::default()
    };
    let s = Arc::new(scheduler(cfg, &backend, 1));

    let frontier = s.frontier();
    let seeder = tokio::spawn(async move {
        for i in 0..500 {
            frontier.check_context(&format!("t{}", i % 40), i % 3 == 0);
            tokio::task::yield_now().await;
        }
    });

    for _ in 0..100 {
        s.harvest().await;

        let pending = s.pending_context();
        assert!(pending.len() <= 8);
        assert!(s.harvested_len() <= 16);

        let mut sorted = pending.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), pending.len());
    }

    seeder.await.unwrap();
    s.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let backend = MockBackend::new();
    let cfg = HarvestConfig {
        fetch_min: 0,
        ..Default::default()
    };

    let res = HarvestScheduler::new(
        cfg,
        backend.collaborators(),
        vec![PEER.to_string()],
        HarvestCounters::default(),
    );
    assert!(res.is_err());
}
