use std::env;

use milk_core::config::{resolve_bootstrap_config, BootstrapConfig};
use milk_core::util::is_http_url;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::{local_profile_config, print_json, GlobalOptions};
use crate::config_profiles::{
    default_config_path, env_overrides, normalize_text_option, CliProfile, CliProfilesConfig,
};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigView {
    pub profile: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub storage_bucket: String,
    pub bootstrap_manifest_url: Option<String>,
}

impl ConfigView {
    pub fn new(profile: String, config: &BootstrapConfig) -> Self {
        Self {
            profile,
            supabase_url: config.supabase_url.clone(),
            supabase_anon_key: config.supabase_anon_key.as_deref().map(mask_secret),
            storage_bucket: config.storage_bucket(),
            bootstrap_manifest_url: config.bootstrap_manifest_url.clone(),
        }
    }
}

/// Keep just enough of a key to tell two keys apart.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}********{tail}")
}

pub fn normalize_bootstrap_url(value: &str) -> Result<String, CliError> {
    let value = value.trim().trim_end_matches('/').to_string();
    if !is_http_url(&value) {
        return Err(CliError::Config(
            "bootstrap URL must include http:// or https://".to_string(),
        ));
    }
    Ok(value)
}

/// Layer values: explicit flags, then the manifest, then `MILK_*` variables, then the stored profile.
pub fn merge_profile(
    existing: &CliProfile,
    explicit: &BootstrapConfig,
    manifest: Option<&BootstrapConfig>,
    env: &BootstrapConfig,
) -> CliProfile {
    let mut merged = existing.bootstrap_config().merged_with(env);
    if let Some(manifest) = manifest {
        merged = merged.merged_with(manifest);
    }
    let merged = merged.merged_with(explicit);

    CliProfile {
        supabase_url: merged.supabase_url,
        supabase_anon_key: merged.supabase_anon_key,
        storage_bucket: merged.storage_bucket,
        bootstrap_manifest_url: merged.bootstrap_manifest_url,
    }
}

pub async fn run_config(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            storage_bucket,
            bootstrap_url,
            no_activate,
        } => {
            let explicit = BootstrapConfig {
                bootstrap_manifest_url: normalize_text_option(bootstrap_url)
                    .as_deref()
                    .map(normalize_bootstrap_url)
                    .transpose()?,
                supabase_url: normalize_text_option(supabase_url),
                supabase_anon_key: normalize_text_option(supabase_anon_key),
                storage_bucket: normalize_text_option(storage_bucket),
            };
            run_config_init(options.profile(), &explicit, no_activate).await
        }
        ConfigCommands::Show { json } => {
            let (profile_name, config) = local_profile_config(options.profile())?;
            let view = ConfigView::new(profile_name, &config);
            if json {
                return print_json(&view);
            }
            println!("Profile:            {}", view.profile);
            println!(
                "Supabase URL:       {}",
                view.supabase_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "Supabase anon key:  {}",
                view.supabase_anon_key.as_deref().unwrap_or("(not set)")
            );
            println!("Storage bucket:     {}", view.storage_bucket);
            if let Some(url) = view.bootstrap_manifest_url.as_deref() {
                println!("Bootstrap manifest: {url}");
            }
            Ok(())
        }
    }
}

pub async fn run_config_init(
    profile_name: Option<&str>,
    explicit: &BootstrapConfig,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let manifest_url = explicit
        .bootstrap_manifest_url
        .clone()
        .or_else(|| normalize_text_option(existing.bootstrap_manifest_url.clone()));
    let needs_manifest = explicit.bootstrap_manifest_url.is_some()
        || explicit.supabase_url.is_none()
        || explicit.supabase_anon_key.is_none();
    let manifest = match manifest_url {
        Some(url) if needs_manifest => {
            let fetched = resolve_bootstrap_config(BootstrapConfig {
                bootstrap_manifest_url: Some(url.clone()),
                ..BootstrapConfig::default()
            })
            .await
            .map_err(|error| {
                CliError::Config(format!(
                    "Failed to load bootstrap manifest from {url}: {error}"
                ))
            })?;
            println!("Loaded bootstrap manifest from {url}");
            Some(BootstrapConfig {
                bootstrap_manifest_url: Some(url),
                ..fetched
            })
        }
        _ => None,
    };

    let merged = merge_profile(
        &existing,
        explicit,
        manifest.as_ref(),
        &env_overrides(|name| env::var(name).ok()),
    );
    if merged
        .supabase_url
        .as_deref()
        .is_some_and(|url| !is_http_url(url))
    {
        return Err(CliError::Config(
            "supabase_url must include http:// or https://".to_string(),
        ));
    }
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Profile '{}' initialized at {}", profile_name, path.display());

    let missing = merged.missing_fields();
    if !missing.is_empty() {
        println!(
            "Profile '{}' still needs: {} (see {})",
            profile_name,
            missing.join(", "),
            default_config_path()
                .map(|path| path.display().to_string())
                .unwrap_or_default()
        );
    }
    Ok(())
}
