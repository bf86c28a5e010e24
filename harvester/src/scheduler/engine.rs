//! Harvest scheduler.
//!
//! Each cycle it:
//!   1. Decides between context replay and a fresh backend query.
//!   2. Takes one query from the chosen source (refilling the backlog if needed).
//!   3. Fetches results for it and feeds discovered terms back into the frontier.
//!   4. Hands fresh-query results to the push dispatcher.
//!
//! Backoff:
//! - An empty refill with no context to replay, or a failed suggestion lookup,
//!   pauses the cycle for `cooldown`. The pause happens inside `harvest()` so
//!   the caller observes it as latency.
//!
//! Nothing escapes `harvest()`: every failure becomes `HarvestOutcome::Nothing`
//! or a logged-and-continued path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use parking_lot::Mutex;
use tracing::{Instrument, Span, debug, error, field, info, warn};

use common::logger::{TraceId, root_span, warn_if_slow};

use super::strategy::{Dice, RandomDice};
use super::types::HarvestOutcome;
use super::HarvestStrategy;
use crate::backend::{
    BackendClient, Explore, FetchRequest, Pusher, QuerySuggester, RecentSearch, Scraper,
    SuggestRequest,
};
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::frontier::{ContextFrontier, QueryBacklog};
use crate::metrics::HarvestCounters;
use crate::push::{PushDispatcher, PushJob};
use crate::timeline::{Order, Timeline};

const SLOW_FETCH: Duration = Duration::from_secs(30);
const SLOW_LOOKUP: Duration = Duration::from_secs(5);

/// External services the scheduler relies on.
#[derive(Clone)]
pub struct Collaborators {
    pub suggester: Arc<dyn QuerySuggester>,
    pub recent: Arc<dyn RecentSearch>,
    pub scraper: Arc<dyn Scraper>,
    pub pusher: Arc<dyn Pusher>,
}

impl Collaborators {
    /// Every collaborator served by the same peer client.
    pub fn from_client(client: Arc<BackendClient>) -> Self {
        Self {
            suggester: client.clone(),
            recent: client.clone(),
            scraper: client.clone(),
            pusher: client,
        }
    }
}

pub struct HarvestScheduler {
    cfg: HarvestConfig,

    suggester: Arc<dyn QuerySuggester>,
    recent: Arc<dyn RecentSearch>,
    scraper: Arc<dyn Scraper>,

    /// Backend targets every push is delivered to.
    targets: Arc<[String]>,

    /// Fresh queries. Only touched from within `harvest()`.
    backlog: Mutex<QueryBacklog>,

    /// Context queue + harvested set. Safe to share with background tasks.
    frontier: Arc<ContextFrontier>,

    /// Last reported backend match count.
    hits_on_backend: AtomicU64,

    dice: Mutex<Box<dyn Dice>>,

    dispatcher: PushDispatcher,

    /// Observability counters (does not affect behavior).
    counters: HarvestCounters,
}

impl HarvestScheduler {
    /// Builds a scheduler and starts its push worker on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(
        cfg: HarvestConfig,
        collaborators: Collaborators,
        targets: Vec<String>,
        counters: HarvestCounters,
    ) -> Result<Self, HarvestError> {
        cfg.validate()?;

        let frontier = Arc::new(ContextFrontier::new(
            cfg.max_pending,
            cfg.max_harvested,
            counters.clone(),
        ));
        let dispatcher = PushDispatcher::spawn(
            collaborators.pusher,
            cfg.push_queue_capacity,
            counters.clone(),
        );

        Ok(Self {
            hits_on_backend: AtomicU64::new(cfg.initial_hits_on_backend),
            suggester: collaborators.suggester,
            recent: collaborators.recent,
            scraper: collaborators.scraper,
            targets: targets.into(),
            backlog: Mutex::new(QueryBacklog::new()),
            frontier,
            dice: Mutex::new(Box::new(RandomDice::from_entropy())),
            dispatcher,
            counters,
            cfg,
        })
    }

    /// Replaces the random source of the strategy switch.
    pub fn with_dice(self, dice: Box<dyn Dice>) -> Self {
        *self.dice.lock() = dice;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.cfg
    }

    pub fn counters(&self) -> &HarvestCounters {
        &self.counters
    }

    /// Shared handle on the context frontier, for background seeding.
    pub fn frontier(&self) -> Arc<ContextFrontier> {
        self.frontier.clone()
    }

    pub fn hits_on_backend(&self) -> u64 {
        self.hits_on_backend.load(Ordering::Relaxed)
    }

    pub fn pending_queries(&self) -> Vec<String> {
        self.backlog.lock().iter().map(str::to_string).collect()
    }

    pub fn pending_context(&self) -> Vec<String> {
        self.frontier.pending_snapshot()
    }

    pub fn is_harvested(&self, term: &str) -> bool {
        self.frontier.is_harvested(term)
    }

    pub fn harvested_len(&self) -> usize {
        self.frontier.harvested_len()
    }

    /// Queues fresh queries ahead of the next refill. Returns how many were new.
    pub fn enqueue_queries<I>(&self, queries: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        self.backlog.lock().extend(queries)
    }

    /// Offers a single context term; `front` marks a priority insert.
    pub fn check_context(&self, term: &str, front: bool) -> bool {
        self.frontier.check_context(term, front)
    }

    /// Offers every context term found in `timeline`.
    pub fn check_timeline(&self, timeline: &Timeline, front: bool) -> usize {
        self.frontier.check_timeline(timeline, front)
    }

    /// Runs one decision cycle.
    pub async fn harvest(&self) -> HarvestOutcome {
        let trace_id = TraceId::new();
        let span = root_span("harvest", &trace_id);

        async {
            HarvestCounters::bump(&self.counters.cycles);

            if self.should_replay_context() {
                return self.replay_context().await;
            }

            let backlog_empty = self.backlog.lock().is_empty();
            if backlog_empty {
                self.refill_queries().await;
            }

            self.fetch_fresh_query().await
        }
        .instrument(span)
        .await
    }

    /// Stops the push dispatcher. Further pushes are rejected.
    pub fn stop(&self) {
        self.dispatcher.stop();
    }

    /// Stops the push dispatcher and waits until queued pushes are delivered.
    pub async fn shutdown(&self) {
        self.dispatcher.stop();
        self.dispatcher.join().await;
    }

    /// Replay is chosen when the draw does not force the fresh path, the
    /// backend is dry, no fresh query is queued and context work exists.
    fn should_replay_context(&self) -> bool {
        let roll = self.dice.lock().roll(self.cfg.replay_roll_range);

        roll != 0
            && self.hits_on_backend() < self.cfg.hits_limit_for_queries
            && self.backlog.lock().is_empty()
            && !self.frontier.is_pending_empty()
    }

    async fn replay_context(&self) -> HarvestOutcome {
        // Another actor may have drained the queue since the check.
        let Some(query) = self.frontier.pop_front() else {
            return HarvestOutcome::Nothing;
        };
        record_branch("replay", &query);

        self.frontier.mark_harvested(&query);
        HarvestCounters::bump(&self.counters.context_replays);

        let Some(timeline) = self.fetch(&query, Explore::First).await else {
            HarvestCounters::bump(&self.counters.empty_fetches);
            debug!(%query, "context replay returned nothing");
            return HarvestOutcome::Nothing;
        };

        self.frontier.check_timeline(&timeline, false);

        info!(
            items = timeline.len(),
            %query,
            pending_queries = self.backlog.lock().len(),
            pending_context = self.frontier.pending_len(),
            harvested_context = self.frontier.harvested_len(),
            "context replay retrieved new messages"
        );

        HarvestOutcome::Fetched(timeline.len())
    }

    async fn refill_queries(&self) {
        let fetch_size = self.cfg.fetch_size(self.hits_on_backend());
        let req = SuggestRequest::due_for_retrieval(
            fetch_size,
            self.cfg.suggest_multiplier,
            timezone_offset_minutes(),
        );
        HarvestCounters::bump(&self.counters.refills);

        match warn_if_slow("suggest", SLOW_LOOKUP, self.suggester.suggest(&req)).await {
            Ok(res) => {
                let got = res.queries.len();
                self.backlog.lock().extend(res.queries);
                self.hits_on_backend.store(res.hits, Ordering::Relaxed);

                info!(got, hits = res.hits, fetch_size, "suggestions received for harvesting");

                if res.hits == 0 {
                    // The backend has nothing due right now.
                    if self.frontier.is_pending_empty() {
                        self.seed_context().await;
                    }
                    if self.frontier.is_pending_empty() {
                        self.cooldown("backend has no queries and no context is queued")
                            .await;
                    }
                }
            }
            Err(e) => {
                HarvestCounters::bump(&self.counters.suggest_failures);
                error!(error = %e, "suggestion lookup failed");
                self.cooldown("suggestion backend unavailable").await;
            }
        }
    }

    /// Seeds the frontier from recently cached items.
    async fn seed_context(&self) {
        let lookup = self
            .recent
            .search_recent(self.cfg.recent_limit, self.cfg.recent_timeout);

        match warn_if_slow("search_recent", SLOW_LOOKUP, lookup).await {
            Ok(timeline) => {
                let added = self.frontier.check_timeline(&timeline, false);
                info!(items = timeline.len(), added, "context seeded from cache");
            }
            Err(e) => {
                warn!(error = %e, "recent cache lookup failed; context stays empty");
            }
        }
    }

    async fn fetch_fresh_query(&self) -> HarvestOutcome {
        let next = self.backlog.lock().pop_first();
        let Some(query) = next else {
            return HarvestOutcome::Nothing;
        };
        record_branch("fresh", &query);

        // Drops a pending context copy too.
        self.frontier.mark_harvested(&query);
        HarvestCounters::bump(&self.counters.fresh_fetches);

        match self.fetch(&query, Explore::Last).await {
            None => {
                HarvestCounters::bump(&self.counters.empty_fetches);

                // Push anyway so the backend records the attempt.
                let empty = Timeline::empty(Order::CreatedAt).with_query(query);
                self.dispatch(empty).await;
                HarvestOutcome::Nothing
            }
            Some(timeline) => {
                self.frontier.check_timeline(&timeline, true);

                let items = timeline.len();
                self.dispatch(timeline.with_query(query)).await;
                HarvestOutcome::Fetched(items)
            }
        }
    }

    /// Fetches a full timeline for `query`. Empty results come back as `None`.
    async fn fetch(&self, query: &str, explore: Explore) -> Option<Timeline> {
        let req = FetchRequest {
            query: query.to_string(),
            order: Order::CreatedAt,
            full_detail: true,
            explore,
            max_items: self.cfg.fetch_max_items,
        };

        warn_if_slow("fetch", SLOW_FETCH, self.scraper.fetch(&req))
            .await
            .filter(|tl| !tl.is_empty())
    }

    async fn dispatch(&self, timeline: Timeline) {
        info!(
            items = timeline.len(),
            pending_queries = self.backlog.lock().len(),
            pending_context = self.frontier.pending_len(),
            harvested_context = self.frontier.harvested_len(),
            "starting push to backend"
        );

        let job = PushJob::new(self.targets.clone(), timeline);
        if let Err(e) = self.dispatcher.submit(job).await {
            warn!(error = %e, "push not scheduled");
        }
    }

    async fn cooldown(&self, reason: &'static str) {
        HarvestCounters::bump(&self.counters.cooldowns);
        info!(
            reason,
            cooldown_ms = self.cfg.cooldown.as_millis() as u64,
            "pausing harvest"
        );
        tokio::time::sleep(self.cfg.cooldown).await;
    }
}

#[async_trait]
impl HarvestStrategy for HarvestScheduler {
    async fn harvest(&self) -> HarvestOutcome {
        HarvestScheduler::harvest(self).await
    }

    fn stop(&self) {
        HarvestScheduler::stop(self)
    }
}

fn record_branch(branch: &'static str, query: &str) {
    let span = Span::current();
    span.record("branch", branch);
    span.record("query", field::display(query));
}

/// Minutes to add to local time to reach UTC.
fn timezone_offset_minutes() -> i32 {
    -Local::now().offset().local_minus_utc() / 60
}
