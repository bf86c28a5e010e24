use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::HarvestError;

/// Tunables of the harvest scheduler.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    // =========================
    // Backend refill
    // =========================
    /// Lower clamp of the refill fetch size (`hits_on_backend / 10`).
    pub fetch_min: u64,

    /// Upper clamp of the refill fetch size.
    pub fetch_max: u64,

    /// Number of suggestions requested per fetch-size unit.
    ///
    /// The backend returns `fetch_size * suggest_multiplier` candidates and
    /// picks `fetch_size` of them at random, ordered by next retrieval due.
    pub suggest_multiplier: u64,

    /// Initial value of the backend hit counter.
    ///
    /// Starts above `hits_limit_for_queries` so the first cycle always asks
    /// the backend before falling back to context replay.
    pub initial_hits_on_backend: u64,

    // =========================
    // Strategy switch
    // =========================
    /// Below this many backend hits, context replay becomes eligible.
    ///
    /// IMPORTANT:
    /// - While the backend reports a healthy backlog, fresh queries win.
    /// - Context replay keeps the harvester busy when the backend is dry.
    pub hits_limit_for_queries: u64,

    /// Range of the strategy-switch draw. A draw of `0` forces the fresh
    /// query path even when context work is queued, so the backend is
    /// re-checked roughly once every `replay_roll_range` cycles.
    pub replay_roll_range: u32,

    // =========================
    // Bounded collections
    // =========================
    /// Maximum number of queued context terms. Excess is trimmed from the tail.
    pub max_pending: usize,

    /// Maximum number of harvested terms remembered for dedup.
    ///
    /// When reached, the whole set is cleared (not LRU-trimmed). Terms may be
    /// harvested again after a reset.
    pub max_harvested: usize,

    // =========================
    // Collaborator call shapes
    // =========================
    /// `max_items` passed to every fetch.
    pub fetch_max_items: usize,

    /// Number of cached items requested when seeding context.
    pub recent_limit: usize,

    /// Timeout for the seeding lookup.
    pub recent_timeout: Duration,

    // =========================
    // Backoff / dispatch
    // =========================
    /// Blocking pause applied on the calling path after a failed suggestion
    /// lookup, or after an empty refill that left no context to replay.
    ///
    /// Purpose:
    /// - avoid a hot polling loop against an empty backend
    /// - throttle against an unreachable backend
    pub cooldown: Duration,

    /// Capacity of the push queue between scheduler and push worker.
    ///
    /// Acts as backpressure:
    /// - if delivery slows down, `harvest()` blocks on submit
    /// - prevents unbounded memory growth
    pub push_queue_capacity: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            fetch_min: 20,
            fetch_max: 100,
            suggest_multiplier: 5,
            initial_hits_on_backend: 100,

            hits_limit_for_queries: 20,
            replay_roll_range: 100,

            max_pending: 300,
            max_harvested: 10_000,

            fetch_max_items: 400,
            recent_limit: 100,
            recent_timeout: Duration::from_secs(60),

            cooldown: Duration::from_secs(10),
            push_queue_capacity: 64,
        }
    }
}

impl HarvestConfig {
    /// Refill fetch size for the given backend hit count:
    /// `hits / 10` clamped into `[fetch_min, fetch_max]`.
    pub fn fetch_size(&self, hits_on_backend: u64) -> u64 {
        (hits_on_backend / 10).max(self.fetch_min).min(self.fetch_max)
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.fetch_min == 0 || self.fetch_min > self.fetch_max {
            return Err(HarvestError::Config(format!(
                "fetch_min ({}) must be in 1..=fetch_max ({})",
                self.fetch_min, self.fetch_max
            )));
        }
        if self.max_pending == 0 || self.max_harvested == 0 {
            return Err(HarvestError::Config(
                "max_pending and max_harvested must be non-zero".into(),
            ));
        }
        if self.replay_roll_range == 0 {
            return Err(HarvestError::Config("replay_roll_range must be non-zero".into()));
        }
        if self.push_queue_capacity == 0 {
            return Err(HarvestError::Config("push_queue_capacity must be non-zero".into()));
        }
        Ok(())
    }
}

/// Process-level configuration for the `harvester` binary.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Backend peers used for suggestions, cache lookups, fetches and pushes.
    pub backends: Vec<String>,

    /// Per-request HTTP timeout for the peer client.
    pub http_timeout: Duration,

    /// Pause between two driver iterations.
    pub loop_pause: Duration,

    /// Log a counter snapshot every N cycles.
    pub stats_every: u64,

    pub harvest: HarvestConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let backends = std::env::var("HARVEST_BACKENDS")
            .ok()
            .map(|v| parse_backends(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["http://127.0.0.1:9000".to_string()]);

        let defaults = HarvestConfig::default();
        let harvest = HarvestConfig {
            max_pending: env_or("HARVEST_MAX_PENDING", defaults.max_pending),
            max_harvested: env_or("HARVEST_MAX_HARVESTED", defaults.max_harvested),
            cooldown: Duration::from_millis(env_or(
                "HARVEST_COOLDOWN_MS",
                defaults.cooldown.as_millis() as u64,
            )),
            push_queue_capacity: env_or("HARVEST_PUSH_QUEUE", defaults.push_queue_capacity),
            ..defaults
        };

        Self {
            backends,
            http_timeout: Duration::from_millis(env_or("HARVEST_HTTP_TIMEOUT_MS", 5_000)),
            loop_pause: Duration::from_millis(env_or("HARVEST_LOOP_PAUSE_MS", 250)),
            stats_every: env_or("HARVEST_STATS_EVERY", 100),
            harvest,
        }
    }
}

/// Splits a comma separated peer list, dropping blanks and trailing slashes.
pub fn parse_backends(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, raw, %default, "malformed config value; using default");
            default
        }
    }
}
