//! Notification delivery.
//!
//! Update announcements are rendered from webhook templates and posted to
//! Discord. The [`NotificationDispatcher`] owns ordering, pacing and the
//! single rate-limit retry; channels only make one attempt per call.

pub mod channels;
mod dispatcher;
pub mod template;

pub use channels::{DeliveryChannel, DeliveryError, DiscordChannel};
pub use dispatcher::{DeliveryOutcome, DestinationOutcome, DispatchReport, NotificationDispatcher};
