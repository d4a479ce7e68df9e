use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Track CurseForge mods and announce new releases on Discord.
#[derive(Parser, Debug)]
#[command(name = "modwatch", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Parses the command line after loading `.env`, so its values back `env` arguments.
    pub fn load() -> Self {
        Self::load_from(None, std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    fn load_from<I, T>(env_file: Option<&Path>, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match env_file {
            Some(path) => {
                let _ = dotenvy::from_path(path);
            }
            None => {
                let _ = dotenvy::dotenv();
            }
        }
        Self::try_parse_from(args)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check on the configured interval until interrupted.
    Run,

    /// Check every tracked mod now (subject to the manual cooldown).
    Check,

    /// Set the interval between scheduled checks.
    SetInterval {
        /// Minutes between checks.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        minutes: u32,
    },

    /// Store the CurseForge API key.
    SetApiKey {
        #[arg(env = "MODWATCH_API_KEY", hide_env_values = true)]
        key: String,
    },

    /// List tracked mods.
    Mods,

    /// Track a mod by its CurseForge project id.
    AddMod {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        curseforge_id: i64,
    },

    /// Stop tracking a mod.
    RemoveMod { mod_id: i64 },

    /// List webhooks.
    Webhooks,

    /// Register a Discord webhook.
    AddWebhook {
        name: String,
        url: String,
        /// Name shown as the message author.
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        /// Register without delivering to it yet.
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a webhook, its assignments and its custom template.
    RemoveWebhook { webhook_id: i64 },

    /// Send a test message through a webhook.
    TestWebhook { webhook_id: i64 },

    EnableWebhook { webhook_id: i64 },

    DisableWebhook { webhook_id: i64 },

    /// Announce a mod's updates on a webhook.
    Assign { mod_id: i64, webhook_id: i64 },

    /// Stop announcing a mod's updates on a webhook.
    Unassign { mod_id: i64, webhook_id: i64 },

    /// Load a message template from a JSON file.
    SetTemplate {
        file: PathBuf,
        /// Bind the template to this webhook instead of replacing the default.
        #[arg(long)]
        webhook: Option<i64>,
    },

    /// Make a webhook use the default template again.
    ResetTemplate { webhook_id: i64 },

    /// Show recent activity.
    Activity {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete the activity history.
    ClearActivity,
}
