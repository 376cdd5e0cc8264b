//! Bootstrap configuration for clients.
//!
//! `BootstrapConfig` carries the public Supabase endpoint, the anon key and
//! the storage bucket. Values can be embedded at build time, come from a CLI
//! profile, or be fetched from a managed bootstrap manifest.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const BOOTSTRAP_SCHEMA_VERSION: u32 = 1;
const BOOTSTRAP_HTTP_TIMEOUT_SECS: u64 = 4;

/// Bucket holding user-uploaded product pictures.
pub const DEFAULT_STORAGE_BUCKET: &str = "milk-images";

/// Build-provisioned client configuration.
///
/// Only public values belong here. The anon key is safe to ship; service
/// role keys must never be stored in this struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub bootstrap_manifest_url: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
}

/// Endpoint and key pair required to talk to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseEndpoint {
    pub url: String,
    pub anon_key: String,
}

impl BootstrapConfig {
    pub fn storage_bucket(&self) -> String {
        normalize_text_option(self.storage_bucket.clone())
            .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string())
    }

    /// Returns the backend endpoint, or `None` when neither value is set.
    ///
    /// Setting only one of URL and key is a configuration error.
    pub fn supabase_endpoint(&self) -> Result<Option<SupabaseEndpoint>> {
        let url = normalize_text_option(self.supabase_url.clone());
        let anon_key = normalize_text_option(self.supabase_anon_key.clone());

        match (url, anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => {
                if !is_http_url(&url) {
                    return Err(Error::Config(
                        "supabase_url must include http:// or https://".to_string(),
                    ));
                }
                Ok(Some(SupabaseEndpoint {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                }))
            }
            (Some(_), None) => Err(Error::Config("supabase_anon_key is not set".to_string())),
            (None, Some(_)) => Err(Error::Config("supabase_url is not set".to_string())),
        }
    }

    /// Like [`Self::supabase_endpoint`] but a missing endpoint is an error.
    pub fn require_endpoint(&self) -> Result<SupabaseEndpoint> {
        self.supabase_endpoint()?.ok_or_else(|| {
            Error::Config("Supabase URL and anon key are not configured".to_string())
        })
    }

    /// Overlay every value set in `other` onto `self`.
    #[must_use]
    pub fn merged_with(mut self, other: &Self) -> Self {
        if let Some(value) = normalize_text_option(other.bootstrap_manifest_url.clone()) {
            self.bootstrap_manifest_url = Some(value);
        }
        if let Some(value) = normalize_text_option(other.supabase_url.clone()) {
            self.supabase_url = Some(value);
        }
        if let Some(value) = normalize_text_option(other.supabase_anon_key.clone()) {
            self.supabase_anon_key = Some(value);
        }
        if let Some(value) = normalize_text_option(other.storage_bucket.clone()) {
            self.storage_bucket = Some(value);
        }
        self
    }
}

/// Resolve runtime config by fetching the manifest URL when one is set.
///
/// Manifest failures are returned as errors rather than silently falling
/// back to the embedded values.
pub async fn resolve_bootstrap_config(fallback: BootstrapConfig) -> Result<BootstrapConfig> {
    let Some(manifest_url) = normalize_text_option(fallback.bootstrap_manifest_url.clone()) else {
        return Ok(fallback);
    };

    let fetched = fetch_bootstrap_manifest(&manifest_url).await?;
    tracing::debug!("Loaded bootstrap manifest from {}", manifest_url);
    Ok(fetched)
}

/// Parse a bootstrap manifest from a raw JSON payload.
pub fn parse_bootstrap_manifest(payload: &str, manifest_url: &str) -> Result<BootstrapConfig> {
    let manifest: BootstrapManifest = serde_json::from_str(payload)
        .map_err(|error| Error::Config(format!("invalid bootstrap manifest JSON: {error}")))?;
    manifest.into_runtime_config(manifest_url)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct BootstrapManifest {
    schema_version: u32,
    manifest_version: String,
    supabase_url: String,
    supabase_anon_key: String,
    #[serde(default)]
    storage_bucket: Option<String>,
}

impl BootstrapManifest {
    fn into_runtime_config(self, manifest_url: &str) -> Result<BootstrapConfig> {
        if self.schema_version != BOOTSTRAP_SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "unsupported bootstrap schema_version {} (expected {})",
                self.schema_version, BOOTSTRAP_SCHEMA_VERSION
            )));
        }
        if self.manifest_version.trim().is_empty() {
            return Err(Error::Config(
                "bootstrap manifest_version must not be empty".to_string(),
            ));
        }

        Ok(BootstrapConfig {
            bootstrap_manifest_url: Some(manifest_url.to_string()),
            supabase_url: Some(normalize_required_http_url(
                self.supabase_url,
                "supabase_url",
            )?),
            supabase_anon_key: Some(normalize_required_value(
                self.supabase_anon_key,
                "supabase_anon_key",
            )?),
            storage_bucket: normalize_text_option(self.storage_bucket),
        })
    }
}

async fn fetch_bootstrap_manifest(url: &str) -> Result<BootstrapConfig> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(BOOTSTRAP_HTTP_TIMEOUT_SECS))
        .build()?;

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Config(format!(
            "bootstrap endpoint returned HTTP {status}: {}",
            compact_text(&body)
        )));
    }

    let body = response.text().await?;
    parse_bootstrap_manifest(&body, url)
}

fn normalize_required_value(raw: String, field: &str) -> Result<String> {
    normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config(format!("bootstrap field '{field}' is required")))
}

fn normalize_required_http_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_required_value(raw, field)?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "bootstrap field '{field}' must include http:// or https://"
        )))
    }
}
