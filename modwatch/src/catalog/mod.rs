//! Mod catalog access.
//!
//! The check pipeline only sees [`UpdateSource`] and mod registration only
//! sees [`ModLookup`]; [`curseforge`] is the production implementation of both.

pub mod curseforge;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::Result;
use crate::domain::{ModUpdate, TrackedMod};

pub use curseforge::CurseForgeUpdateSource;

/// Errors reported by the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The API key was rejected.
    #[error("catalog rejected the API key: {0}")]
    Credential(String),

    /// The catalog has no mod with this id.
    #[error("mod {0} not found on the catalog")]
    NotFound(i64),

    #[error("catalog request failed: {0}")]
    Transport(String),

    #[error("unexpected catalog response: {0}")]
    InvalidResponse(String),
}

/// Catalog API key.
///
/// Passed explicitly into every evaluation. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Answers whether a tracked mod has a release newer than the one we know.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// `Ok(None)` when nothing changed.
    ///
    /// Implementations that find an update are responsible for recording the
    /// new release date so a repeated check reports nothing.
    async fn check_mod_update(
        &self,
        tracked: &TrackedMod,
        credential: &Credential,
    ) -> Result<Option<ModUpdate>>;
}

/// Resolves a catalog id into a mod ready to be tracked.
#[async_trait]
pub trait ModLookup: Send + Sync {
    /// Current catalog state of a mod, with its game name resolved.
    ///
    /// The returned mod has local id 0 and its latest release date as
    /// `last_updated`, so only later releases count as updates.
    async fn lookup_mod(&self, curseforge_id: i64, credential: &Credential) -> Result<TrackedMod>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("super-secret"));
        assert_eq!(credential.expose(), "super-secret");
    }
}
