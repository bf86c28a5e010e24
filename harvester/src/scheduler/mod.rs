pub mod engine;
pub mod strategy;
pub mod types;

use async_trait::async_trait;

pub use engine::{Collaborators, HarvestScheduler};
pub use strategy::{Dice, RandomDice};
pub use types::HarvestOutcome;

/// A unit of harvesting work, invoked repeatedly by a driver until stopped.
#[async_trait]
pub trait HarvestStrategy: Send + Sync + 'static {
    /// Runs one decision cycle. Never fails; see [`HarvestOutcome`].
    async fn harvest(&self) -> HarvestOutcome;

    /// Stops accepting push work. In-flight fetches are not cancelled.
    fn stop(&self);
}
