use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalbotConfig {
    pub discord: DiscordConfig,
    pub relay: RelayConfig,
    pub portals: Vec<PortalConfig>,
}

/// Discord gateway connection settings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Usually written as `${DISCORD_TOKEN}` and resolved from
    /// the environment at load time.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Relay engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bound on the number of correlation groups held per portal. Edits and
    /// deletes of messages older than this window stop propagating.
    pub correlation_capacity: usize,
    /// Name of the webhook the bot provisions (and reuses) in each member
    /// channel.
    pub webhook_name: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            correlation_capacity: 100,
            webhook_name: "portal".into(),
        }
    }
}

/// One portal definition: a name and its member channels in fan-out order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub name: String,
    pub channels: Vec<u64>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
