//! CurseForge catalog client.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CatalogError, Credential, ModLookup, UpdateSource};
use crate::{Error, Result};
use crate::database::repositories::{ActivityRepository, ModRepository, NewActivity, kind};
use crate::domain::{ModUpdate, TrackedMod};

const API_KEY_HEADER: &str = "x-api-key";
const UNKNOWN_AUTHOR: &str = "Unknown Author";
const UNKNOWN_GAME: &str = "Unknown Game";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModData {
    name: String,
    game_id: Option<i64>,
    date_released: String,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    latest_files: Vec<ModFile>,
    logo: Option<Logo>,
    links: Option<Links>,
    main_file_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GameData {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModFile {
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct Logo {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Links {
    website_url: Option<String>,
}

/// [`UpdateSource`] backed by the CurseForge REST API.
///
/// A detected update is persisted through the mod repository and recorded in
/// the activity log before it is returned.
pub struct CurseForgeUpdateSource {
    client: Client,
    base_url: String,
    mods: Arc<dyn ModRepository>,
    activities: Arc<dyn ActivityRepository>,
}

impl CurseForgeUpdateSource {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        mods: Arc<dyn ModRepository>,
        activities: Arc<dyn ActivityRepository>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mods,
            activities,
        }
    }

    async fn fetch_mod(&self, curseforge_id: i64, credential: &Credential) -> Result<ModData> {
        let url = format!("{}/v1/mods/{}", self.base_url, curseforge_id);
        self.get_data(&url, curseforge_id, credential).await
    }

    async fn fetch_game_name(&self, game_id: i64, credential: &Credential) -> Result<String> {
        let url = format!("{}/v1/games/{}", self.base_url, game_id);
        match self.get_data::<GameData>(&url, game_id, credential).await {
            Ok(game) => Ok(game.name),
            Err(Error::Catalog(CatalogError::NotFound(_))) => Err(CatalogError::InvalidResponse(
                format!("unknown game {}", game_id),
            )
            .into()),
            Err(e) => Err(e),
        }
    }

    /// GET `url` and unwrap the `data` envelope. 404 maps to `NotFound(id)`.
    async fn get_data<T: DeserializeOwned>(
        &self,
        url: &str,
        id: i64,
        credential: &Credential,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CatalogError::Credential(status.to_string()).into());
            }
            StatusCode::NOT_FOUND => return Err(CatalogError::NotFound(id).into()),
            s if !s.is_success() => {
                return Err(CatalogError::Transport(format!(
                    "CurseForge request to {} failed: {}",
                    url, status
                ))
                .into());
            }
            _ => {}
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        Ok(envelope.data)
    }

    /// Best effort: any failure yields `None`.
    async fn fetch_changelog(
        &self,
        curseforge_id: i64,
        file_id: i64,
        credential: &Credential,
    ) -> Option<String> {
        let url = format!(
            "{}/v1/mods/{}/files/{}/changelog",
            self.base_url, curseforge_id, file_id
        );
        let response = match self
            .client
            .get(&url)
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(curseforge_id, status = %response.status(), "Changelog unavailable");
                return None;
            }
            Err(e) => {
                debug!(curseforge_id, error = %e, "Changelog request failed");
                return None;
            }
        };

        let envelope: Envelope<String> = response.json().await.ok()?;
        let text = html_to_text(&envelope.data);
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl UpdateSource for CurseForgeUpdateSource {
    async fn check_mod_update(
        &self,
        tracked: &TrackedMod,
        credential: &Credential,
    ) -> Result<Option<ModUpdate>> {
        let data = self.fetch_mod(tracked.curseforge_id, credential).await?;

        if data.date_released == tracked.last_updated {
            debug!(mod_id = tracked.id, "No new release");
            return Ok(None);
        }

        let latest_file = data
            .latest_files
            .first()
            .map(|file| file.file_name.clone())
            .ok_or_else(|| CatalogError::InvalidResponse("No files found for mod".to_string()))?;

        let changelog = match data.main_file_id {
            Some(file_id) => {
                self.fetch_changelog(tracked.curseforge_id, file_id, credential)
                    .await
            }
            None => None,
        };

        let author = data
            .authors
            .first()
            .map(|author| author.name.clone())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let logo_url = data.logo.map(|logo| logo.url);
        let page_url = data
            .links
            .and_then(|links| links.website_url)
            .or_else(|| tracked.page_url.clone());

        self.mods
            .update_last_updated(tracked.id, &data.date_released)
            .await?;

        info!(
            mod_id = tracked.id,
            old = %tracked.last_updated,
            new = %data.date_released,
            "New release of {}",
            data.name
        );

        let activity = NewActivity::new(
            kind::MOD_UPDATED,
            format!("\"{}\" has been updated", data.name),
        )
        .with_mod(tracked.id, data.name.clone())
        .with_metadata(json!({
            "old_version_date": tracked.last_updated,
            "new_version_date": data.date_released,
            "author": author,
            "latest_file": latest_file,
            "logo_url": logo_url,
            "page_url": page_url,
            "changelog": changelog,
        }));
        if let Err(e) = self.activities.add_activity(activity).await {
            warn!(mod_id = tracked.id, error = %e, "Failed to record update activity");
        }

        Ok(Some(ModUpdate {
            mod_id: tracked.id,
            curseforge_id: tracked.curseforge_id,
            name: data.name,
            author,
            old_update_time: tracked.last_updated.clone(),
            new_update_time: data.date_released,
            latest_file_name: latest_file,
            logo_url,
            page_url,
            changelog,
        }))
    }
}

#[async_trait]
impl ModLookup for CurseForgeUpdateSource {
    async fn lookup_mod(&self, curseforge_id: i64, credential: &Credential) -> Result<TrackedMod> {
        let data = self.fetch_mod(curseforge_id, credential).await?;

        let game_name = match data.game_id {
            Some(game_id) => self.fetch_game_name(game_id, credential).await?,
            None => UNKNOWN_GAME.to_string(),
        };
        debug!(curseforge_id, game = %game_name, "Resolved mod {}", data.name);

        let mut tracked = TrackedMod::new(0, curseforge_id, data.name, data.date_released);
        tracked.game_name = game_name;
        tracked.page_url = data.links.and_then(|links| links.website_url);
        Ok(tracked)
    }
}

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|</li>|</h[1-6]>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").expect("valid regex"));

/// Reduce changelog HTML to plain text.
fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}
