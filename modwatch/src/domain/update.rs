use serde::{Deserialize, Serialize};

/// A newly detected release of a tracked mod.
///
/// Lives for one evaluation-to-dispatch cycle and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModUpdate {
    /// Local identifier of the tracked mod.
    pub mod_id: i64,
    pub curseforge_id: i64,
    pub name: String,
    pub author: String,
    /// Release date we knew before this update.
    pub old_update_time: String,
    /// Release date of the new version.
    pub new_update_time: String,
    pub latest_file_name: String,
    pub logo_url: Option<String>,
    pub page_url: Option<String>,
    pub changelog: Option<String>,
}
