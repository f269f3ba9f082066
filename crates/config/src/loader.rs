use std::{
    env,
    path::{Path, PathBuf},
};

use {
    anyhow::Context as _,
    tracing::{debug, warn},
};

use crate::schema::PortalbotConfig;

/// On-disk formats portalbot reads, in discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    const ALL: [Self; 3] = [Self::Toml, Self::Yaml, Self::Json];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Toml => &["toml"],
            Self::Yaml => &["yaml", "yml"],
            Self::Json => &["json"],
        }
    }

    fn for_path(path: &Path) -> anyhow::Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext))
            .ok_or_else(|| anyhow::anyhow!("unsupported config format: .{ext}"))
    }

    fn parse(self, raw: &str) -> anyhow::Result<PortalbotConfig> {
        let config = match self {
            Self::Toml => toml::from_str(raw)?,
            Self::Yaml => serde_yaml::from_str(raw)?,
            Self::Json => serde_json::from_str(raw)?,
        };
        Ok(config)
    }
}

/// Load config from an explicit path.
///
/// `${VAR}` placeholders are expanded from the environment before parsing,
/// so the bot token never has to live in the file itself.
pub fn load_config(path: &Path) -> anyhow::Result<PortalbotConfig> {
    let format = ConfigFormat::for_path(path)?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let expanded = expand_env(&raw, |name| env::var(name).ok());
    format
        .parse(&expanded)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Discover and load config from standard locations: `portalbot.<ext>` in
/// the working directory, then in the user config directory. Falls back to
/// defaults when nothing is found or the found file fails to load.
pub fn discover_and_load() -> PortalbotConfig {
    let Some(path) = candidate_paths().into_iter().find(|p| p.exists()) else {
        debug!("no config file found, using defaults");
        return PortalbotConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            PortalbotConfig::default()
        },
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let user_dir = directories::ProjectDirs::from("", "", "portalbot")
        .map(|dirs| dirs.config_dir().to_path_buf());

    let mut candidates = Vec::new();
    for dir in [Some(PathBuf::new()), user_dir].into_iter().flatten() {
        for format in ConfigFormat::ALL {
            for ext in format.extensions() {
                candidates.push(dir.join(format!("portalbot.{ext}")));
            }
        }
    }
    candidates
}

// Expands `${NAME}` placeholders via `lookup`. Unresolved and malformed
// placeholders pass through unchanged so a later parse error points at the
// original text.
fn expand_env(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            // No closing brace anywhere after this point.
            out.push_str("${");
            rest = tail;
            continue;
        };
        let name = &tail[..end];
        match lookup(name) {
            Some(value) if !name.is_empty() => out.push_str(&value),
            _ => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            },
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
