//! modwatch library crate.
//!
//! Polls tracked CurseForge mods for new releases and fans the updates out to
//! Discord webhooks. The binary in `main.rs` wires these modules together.

pub mod catalog;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod tracking;
pub mod utils;

pub use error::{Error, Result};
