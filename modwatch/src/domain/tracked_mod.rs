use serde::{Deserialize, Serialize};

/// A mod the user tracks on the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedMod {
    /// Local identifier.
    pub id: i64,
    /// Identifier on CurseForge.
    pub curseforge_id: i64,
    /// Display name.
    pub name: String,
    /// Owning game.
    pub game_name: String,
    /// Release date of the last version we have seen (RFC 3339, as returned by the catalog).
    pub last_updated: String,
    /// Public page of the mod.
    pub page_url: Option<String>,
    /// Webhooks assigned to this mod.
    #[serde(default)]
    pub webhook_ids: Vec<i64>,
}

impl TrackedMod {
    pub fn new(
        id: i64,
        curseforge_id: i64,
        name: impl Into<String>,
        last_updated: impl Into<String>,
    ) -> Self {
        Self {
            id,
            curseforge_id,
            name: name.into(),
            game_name: String::new(),
            last_updated: last_updated.into(),
            page_url: None,
            webhook_ids: Vec::new(),
        }
    }
}
