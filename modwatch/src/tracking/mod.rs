//! Registration of mods, webhooks and message templates.

pub mod manager;

pub use manager::TrackingManager;
