use serde::{Deserialize, Serialize};

/// Default embed color (Discord blurple-ish blue).
pub const DEFAULT_EMBED_COLOR: u32 = 5814783;

/// Default message title.
pub const DEFAULT_TITLE: &str = "🔄 Mod Update Available!";

/// A Discord webhook destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub name: String,
    /// Delivery URL.
    pub url: String,
    /// Avatar override for the posting user.
    pub avatar_url: Option<String>,
    /// Username override for the posting user.
    pub username: Option<String>,
    /// Disabled webhooks never receive deliveries.
    pub enabled: bool,
    /// Render with this webhook's own template instead of the default one.
    pub use_custom_template: bool,
}

impl Webhook {
    pub fn new(id: i64, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            avatar_url: None,
            username: None,
            enabled: true,
            use_custom_template: false,
        }
    }
}

/// One field of a Discord embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

/// Message layout used when announcing an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTemplate {
    /// `None` for the default template.
    pub webhook_id: Option<i64>,
    pub title: String,
    pub color: u32,
    /// Plain message used when `use_embed` is false.
    pub content: Option<String>,
    pub use_embed: bool,
    pub author_name: Option<String>,
    pub author_icon_url: Option<String>,
    pub footer_text: Option<String>,
    pub footer_icon_url: Option<String>,
    pub include_timestamp: bool,
    pub embed_fields: Vec<EmbedField>,
}

impl Default for WebhookTemplate {
    fn default() -> Self {
        Self {
            webhook_id: None,
            title: DEFAULT_TITLE.to_string(),
            color: DEFAULT_EMBED_COLOR,
            content: None,
            use_embed: true,
            author_name: None,
            author_icon_url: None,
            footer_text: None,
            footer_icon_url: None,
            include_timestamp: true,
            embed_fields: vec![
                EmbedField::inline("Mod Name", "{modName}"),
                EmbedField::inline("Author", "{modAuthorName}"),
                EmbedField::inline("Previous Release", "{oldPreviousDate}"),
                EmbedField::inline("New Release", "{newReleaseDate}"),
                EmbedField::inline("Latest File", "{latestModFileName}"),
            ],
        }
    }
}
