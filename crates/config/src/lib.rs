//! Configuration schema and loading for portalbot.
//!
//! Config lives in `portalbot.{toml,yaml,yml,json}`, project-local or under
//! `~/.config/portalbot/`, with `${ENV_VAR}` substitution applied to the
//! raw file before parsing so the bot token can stay in the environment.

pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config},
    schema::{DiscordConfig, PortalConfig, PortalbotConfig, RelayConfig},
};
