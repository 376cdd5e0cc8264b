//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use milk_core::config::BootstrapConfig;
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "milk-me-not";
const CONFIG_FILE_NAME: &str = "cli-config.json";
const DEFAULT_PROFILE: &str = "default";

pub const PROFILE_ENV: &str = "MILK_PROFILE";
pub const SUPABASE_URL_ENV: &str = "MILK_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "MILK_SUPABASE_ANON_KEY";
pub const STORAGE_BUCKET_ENV: &str = "MILK_STORAGE_BUCKET";
pub const BOOTSTRAP_URL_ENV: &str = "MILK_BOOTSTRAP_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub bootstrap_manifest_url: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

/// Directory holding the CLI config and per-profile state files.
pub fn config_dir() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn default_config_path() -> Result<PathBuf, String> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    milk_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(ToString::to_string))
}

/// Values set through `MILK_*` environment variables.
pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> BootstrapConfig {
    BootstrapConfig {
        bootstrap_manifest_url: normalize_text_option(lookup(BOOTSTRAP_URL_ENV)),
        supabase_url: normalize_text_option(lookup(SUPABASE_URL_ENV)),
        supabase_anon_key: normalize_text_option(lookup(SUPABASE_ANON_KEY_ENV)),
        storage_bucket: normalize_text_option(lookup(STORAGE_BUCKET_ENV)),
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `MILK_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with_env(explicit, std::env::var(PROFILE_ENV).ok().as_deref())
    }

    pub fn resolve_profile_name_with_env(
        &self,
        explicit: Option<&str>,
        env_profile: Option<&str>,
    ) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(env_profile))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            bootstrap_manifest_url: normalize_text_option(self.bootstrap_manifest_url.clone()),
            supabase_url: normalize_text_option(self.supabase_url.clone()),
            supabase_anon_key: normalize_text_option(self.supabase_anon_key.clone()),
            storage_bucket: normalize_text_option(self.storage_bucket.clone()),
        }
    }

    /// Fields still needed before the profile can reach the backend.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let config = self.bootstrap_config();
        let mut missing = Vec::new();
        if config.supabase_url.is_none() {
            missing.push("supabase_url");
        }
        if config.supabase_anon_key.is_none() {
            missing.push("supabase_anon_key");
        }
        missing
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.clone());
        self.storage_bucket = normalize_text_option(self.storage_bucket.clone());
        self.bootstrap_manifest_url = normalize_text_option(self.bootstrap_manifest_url.clone());
    }
}
