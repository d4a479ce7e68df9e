//! Repository layer for database access.
//!
//! Each repository is a trait so the check pipeline can run against
//! in-memory fakes, with a SQLx implementation for production.

pub mod activity;
pub mod mods;
pub mod settings;
pub mod state;
pub mod webhooks;

pub use activity::*;
pub use mods::*;
pub use settings::*;
pub use state::*;
pub use webhooks::*;
