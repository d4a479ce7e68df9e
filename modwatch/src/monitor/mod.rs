//! Update monitor.
//!
//! The monitor is responsible for:
//! - Sweeping every tracked mod for new releases, one sweep at a time
//! - Pacing and deduplicating the notifications a sweep produces
//! - Interval-driven scheduling and the manual check cooldown
//! - Emitting completion events for listeners

mod cooldown;
mod dedup;
mod evaluator;
mod events;
mod orchestrator;
mod pacing;
mod scheduler;
mod service;

pub use cooldown::{COOLDOWN_KEY, CooldownGate};
pub use dedup::{DedupKey, EventDedup, SessionDedup};
pub use evaluator::UpdateEvaluator;
pub use events::{CheckEvent, CheckEventBroadcaster};
pub use orchestrator::{
    CheckOrchestrator, DEFAULT_SWEEP_LEASE_TTL, SWEEP_LEASE, SweepOutcome, SweepSummary,
};
pub use pacing::{Pacer, PacingPolicy, TokioPacer};
pub use scheduler::{NEXT_CHECK_KEY, UpdateScheduler};
pub use service::UpdateService;
