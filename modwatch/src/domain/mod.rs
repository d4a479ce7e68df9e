//! Domain types shared by the check pipeline and the persistence layer.

pub mod tracked_mod;
pub mod update;
pub mod webhook;

pub use tracked_mod::TrackedMod;
pub use update::ModUpdate;
pub use webhook::{EmbedField, Webhook, WebhookTemplate};
