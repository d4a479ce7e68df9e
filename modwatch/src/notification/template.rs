//! Message rendering for update announcements.
//!
//! Supported variables: `{modID}`, `{modName}`, `{modAuthorName}`,
//! `{newReleaseDate}`, `{oldPreviousDate}`, `{latestModFileName}`,
//! `{everyone}`, `{here}`, `{&<role id>}` and `{#<channel id>}`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde_json::{Value, json};

use crate::domain::{ModUpdate, Webhook, WebhookTemplate};
use crate::domain::webhook::{DEFAULT_EMBED_COLOR, DEFAULT_TITLE};

/// Username used when the webhook has none.
pub const DEFAULT_USERNAME: &str = "Mod Tracker";

static ROLE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{&(\d+)\}").expect("valid regex"));
static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{#(\d+)\}").expect("valid regex"));

/// Values substituted into template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub mod_id: i64,
    pub mod_name: String,
    pub author: String,
    pub new_release_date: String,
    pub old_release_date: String,
    pub latest_file_name: String,
}

impl From<&ModUpdate> for TemplateVars {
    fn from(update: &ModUpdate) -> Self {
        Self {
            mod_id: update.mod_id,
            mod_name: update.name.clone(),
            author: update.author.clone(),
            new_release_date: format_release_date(&update.new_update_time),
            old_release_date: format_release_date(&update.old_update_time),
            latest_file_name: update.latest_file_name.clone(),
        }
    }
}

/// Substitute template variables in `text`.
pub fn render_text(text: &str, vars: &TemplateVars) -> String {
    let replacements = [
        ("{modID}", vars.mod_id.to_string()),
        ("{modName}", vars.mod_name.clone()),
        ("{modAuthorName}", vars.author.clone()),
        ("{newReleaseDate}", vars.new_release_date.clone()),
        ("{oldPreviousDate}", vars.old_release_date.clone()),
        ("{latestModFileName}", vars.latest_file_name.clone()),
        // Misspelled variant accepted for templates saved by older versions.
        ("{lastestModFileName}", vars.latest_file_name.clone()),
        ("{everyone}", "@everyone".to_string()),
        ("{here}", "@here".to_string()),
    ];

    let mut result = text.to_string();
    for (key, value) in replacements {
        if result.contains(key) {
            result = result.replace(key, &value);
        }
    }

    let result = ROLE_MENTION.replace_all(&result, "<@&$1>");
    CHANNEL_MENTION.replace_all(&result, "<#$1>").into_owned()
}

/// Format an RFC 3339 date as `19th October 2026 at 14:05 UTC`.
///
/// Anything that does not parse is returned unchanged.
pub fn format_release_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => {
            let date = date.with_timezone(&Utc);
            let day = date.day();
            format!(
                "{}{} {}",
                day,
                ordinal_suffix(day),
                date.format("%B %Y at %H:%M UTC")
            )
        }
        Err(_) => raw.to_string(),
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn build_embed(
    template: &WebhookTemplate,
    update: &ModUpdate,
    vars: &TemplateVars,
    now: DateTime<Utc>,
) -> Value {
    let fields: Vec<Value> = template
        .embed_fields
        .iter()
        .map(|field| {
            json!({
                "name": render_text(&field.name, vars),
                "value": render_text(&field.value, vars),
                "inline": field.inline,
            })
        })
        .collect();

    let mut embed = json!({
        "title": render_text(&template.title, vars),
        "color": template.color,
        "fields": fields,
    });

    if let Some(url) = non_blank(&update.page_url) {
        embed["url"] = json!(url);
    }
    if let Some(logo) = non_blank(&update.logo_url) {
        embed["thumbnail"] = json!({ "url": logo });
    }

    if let Some(name) = non_blank(&template.author_name) {
        let mut author = json!({ "name": render_text(name, vars) });
        if let Some(icon) = non_blank(&template.author_icon_url) {
            author["icon_url"] = json!(render_text(icon, vars));
        }
        embed["author"] = author;
    }

    let footer_text = non_blank(&template.footer_text);
    let footer_icon = non_blank(&template.footer_icon_url);
    if footer_text.is_some() || footer_icon.is_some() {
        let mut footer = json!({});
        if let Some(text) = footer_text {
            footer["text"] = json!(render_text(text, vars));
        }
        if let Some(icon) = footer_icon {
            footer["icon_url"] = json!(render_text(icon, vars));
        }
        embed["footer"] = footer;
    }

    if template.include_timestamp {
        embed["timestamp"] = json!(now.to_rfc3339());
    }

    embed
}

/// Payload skeleton carrying the webhook's identity overrides.
fn base_payload(webhook: &Webhook) -> Value {
    let mut payload = json!({
        "username": non_blank(&webhook.username).unwrap_or(DEFAULT_USERNAME),
    });
    if let Some(avatar) = non_blank(&webhook.avatar_url) {
        payload["avatar_url"] = json!(avatar);
    }
    payload
}

/// Build the Discord webhook payload for an update.
pub fn build_payload(
    template: &WebhookTemplate,
    webhook: &Webhook,
    update: &ModUpdate,
    now: DateTime<Utc>,
) -> Value {
    let vars = TemplateVars::from(update);
    let mut payload = base_payload(webhook);

    if template.use_embed {
        payload["embeds"] = json!([build_embed(template, update, &vars, now)]);
    } else {
        let content = non_blank(&template.content).unwrap_or(DEFAULT_TITLE);
        payload["content"] = json!(render_text(content, &vars));
    }

    payload
}

/// Fixed message used to check that a webhook accepts posts.
pub fn test_payload(webhook: &Webhook, now: DateTime<Utc>) -> Value {
    let mut payload = base_payload(webhook);
    payload["embeds"] = json!([{
        "title": "🧪 Test Message",
        "description": "This is a test message from modwatch!",
        "color": DEFAULT_EMBED_COLOR,
        "footer": { "text": "Test completed successfully" },
        "timestamp": now.to_rfc3339(),
    }]);
    payload
}
