use std::env;

use milk_core::platform::{CaptureSource, Platform, PlatformSignals};
use serde::Serialize;

use crate::auth::load_stored_session;
use crate::commands::common::{local_profile_config, print_json, GlobalOptions, CLIENT_VERSION};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub version: String,
    pub profile: String,
    pub backend: String,
    pub storage_bucket: String,
    pub signed_in_as: Option<String>,
    pub platform: Platform,
    pub capture_sources: Vec<CaptureSource>,
}

impl ClientInfo {
    pub fn lines(&self) -> Vec<String> {
        let sources: Vec<&str> = self
            .capture_sources
            .iter()
            .map(|source| source.label())
            .collect();
        vec![
            format!("Version:   {}", self.version),
            format!("Profile:   {}", self.profile),
            format!("Backend:   {}", self.backend),
            format!("Bucket:    {}", self.storage_bucket),
            format!(
                "Signed in: {}",
                self.signed_in_as.as_deref().unwrap_or("no")
            ),
            format!("Pictures:  {}", sources.join(", ")),
        ]
    }
}

/// Signals available to a terminal client. Only the host OS is known.
pub fn terminal_signals() -> PlatformSignals {
    PlatformSignals {
        platform: Some(env::consts::OS.to_string()),
        ..PlatformSignals::default()
    }
}

pub fn collect_info(options: &GlobalOptions) -> Result<ClientInfo, CliError> {
    let (profile_name, config) = local_profile_config(options.profile())?;
    let backend = match options.fixture.as_deref() {
        Some(path) => format!("fixture {}", path.display()),
        None => config
            .supabase_url
            .clone()
            .unwrap_or_else(|| "(not configured)".to_string()),
    };
    let signed_in_as = match load_stored_session(&profile_name) {
        Ok(session) => session.map(|session| session.user.email.unwrap_or(session.user.id)),
        Err(error) => {
            tracing::debug!("Could not read stored session: {error}");
            None
        }
    };
    let signals = terminal_signals();

    Ok(ClientInfo {
        version: CLIENT_VERSION.to_string(),
        profile: profile_name,
        backend,
        storage_bucket: config.storage_bucket(),
        signed_in_as,
        platform: signals.platform(),
        capture_sources: signals.capture_sources(),
    })
}

pub fn run_info(options: &GlobalOptions, json: bool) -> Result<(), CliError> {
    let info = collect_info(options)?;
    if json {
        return print_json(&info);
    }
    for line in info.lines() {
        println!("{line}");
    }
    Ok(())
}
