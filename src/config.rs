use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Agent server base URL
    pub server_url: String,
    /// Assistant to run on the server
    pub assistant_id: String,
    /// Upper bound on agent-internal steps per run
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    /// Optional API key (sent as X-Api-Key)
    pub api_key: Option<String>,
}

fn default_recursion_limit() -> u32 {
    100
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:2024".to_string(),
            assistant_id: "coding_agent".to_string(),
            recursion_limit: default_recursion_limit(),
            api_key: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server_url: String,
    pub assistant_id: String,
    pub recursion_limit: u32,
    pub api_key: Option<String>,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        server_override: Option<&str>,
        assistant_override: Option<&str>,
        api_key_override: Option<&str>,
        recursion_limit_override: Option<u32>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            server_url: server_override
                .map(str::to_string)
                .unwrap_or(base.server_url),
            assistant_id: assistant_override
                .map(str::to_string)
                .unwrap_or(base.assistant_id),
            recursion_limit: recursion_limit_override.unwrap_or(base.recursion_limit),
            api_key: api_key_override
                .map(str::to_string)
                .or(base.api_key),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threadline")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

pub const DEFAULT_CONFIG_TOML: &str = r#"# threadline configuration
# Run `threadline --init` to regenerate this file.

default_profile = "local"

# ── Local agent server (default) ──────────────────────────────────────────────
[profiles.local]
server_url      = "http://localhost:2024"
assistant_id    = "coding_agent"
recursion_limit = 100
# api_key is not needed for a local server

# ── Hosted deployment example ─────────────────────────────────────────────────
# [profiles.hosted]
# server_url      = "https://agents.example.com"
# assistant_id    = "coding_agent"
# recursion_limit = 100
# api_key         = "lsv2_..."
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses_and_resolves() {
        let file = ConfigFile::parse(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        let profile = file.resolve_profile(None).unwrap();
        assert_eq!(profile.server_url, "http://localhost:2024");
        assert_eq!(profile.assistant_id, "coding_agent");
        assert_eq!(profile.recursion_limit, 100);
        assert!(profile.api_key.is_none());
    }

    #[test]
    fn cli_overrides_beat_profile_values() {
        let file = ConfigFile::parse(DEFAULT_CONFIG_TOML).unwrap();
        let resolved = ResolvedConfig::resolve(
            &file,
            None,
            Some("http://other:9000"),
            None,
            Some("secret"),
            Some(25),
        );
        assert_eq!(resolved.server_url, "http://other:9000");
        assert_eq!(resolved.assistant_id, "coding_agent");
        assert_eq!(resolved.recursion_limit, 25);
        assert_eq!(resolved.api_key.as_deref(), Some("secret"));
        assert_eq!(resolved.profile_name, "local");
    }

    #[test]
    fn missing_profile_falls_back_to_built_in_defaults() {
        let file = ConfigFile::default();
        let resolved = ResolvedConfig::resolve(&file, Some("nope"), None, None, None, None);
        assert_eq!(resolved.server_url, "http://localhost:2024");
        assert_eq!(resolved.profile_name, "nope");
        assert_eq!(resolved.recursion_limit, 100);
    }

    #[test]
    fn recursion_limit_defaults_when_omitted_from_toml() {
        let file = ConfigFile::parse(
            r#"
default_profile = "p"
[profiles.p]
server_url   = "http://localhost:2024"
assistant_id = "agent"
"#,
        )
        .unwrap();
        assert_eq!(file.profiles["p"].recursion_limit, 100);
    }

    #[test]
    fn written_template_round_trips_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, DEFAULT_CONFIG_TOML).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let file = ConfigFile::parse(&raw).unwrap();
        assert!(file.profiles.contains_key("local"));
    }
}
