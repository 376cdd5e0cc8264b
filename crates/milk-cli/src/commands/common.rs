use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use milk_core::config::{resolve_bootstrap_config, BootstrapConfig};
use milk_core::context::AppContext;
use milk_core::models::{AggregatedProduct, FeedItem, Notification};
use milk_core::rating::format_rating;
use milk_core::rest::PostgrestClient;
use milk_core::storage::StorageClient;
use milk_core::toast::{ToastLevel, ToastStore};
use milk_core::version::FileDismissalStore;
use milk_core::SearchResult;
use serde::Serialize;

use crate::auth::SupabaseAuthService;
use crate::backend::{Backend, FIXTURE_USER_ID};
use crate::config_profiles::{config_dir, env_overrides, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub profile: Option<String>,
    pub fixture: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

/// Whether a command needs a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anonymous,
    SignedIn,
}

/// Everything one command invocation needs to reach the backend.
pub struct Session {
    pub profile_name: String,
    pub context: AppContext<Backend>,
    pub user_id: Option<String>,
    storage: Option<StorageClient>,
}

impl Session {
    pub async fn open(options: &GlobalOptions, access: Access) -> Result<Self, CliError> {
        if let Some(path) = options.fixture.as_deref() {
            let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = profiles.resolve_profile_name(options.profile());
            return Self::with_backend(profile_name, Backend::fixture(path)?, Some(FIXTURE_USER_ID));
        }

        let (profile_name, config) = resolve_profile_config(options.profile()).await?;
        let endpoint = config
            .supabase_endpoint()?
            .ok_or(CliError::BackendNotConfigured)?;
        let auth = SupabaseAuthService::new(&profile_name, &endpoint)?;
        let session = match auth.restore_session().await {
            Ok(session) => session,
            Err(error) if access == Access::Anonymous => {
                tracing::debug!("Continuing without a session: {}", error);
                None
            }
            Err(error) => return Err(error.into()),
        };
        if access == Access::SignedIn && session.is_none() {
            return Err(CliError::NotSignedIn);
        }

        let mut client = PostgrestClient::new(&endpoint.url, endpoint.anon_key.clone())?;
        let mut storage = None;
        let mut user_id = None;
        if let Some(session) = session {
            client = client.with_access_token(session.access_token.clone());
            storage = Some(
                StorageClient::new(
                    &endpoint.url,
                    endpoint.anon_key.clone(),
                    &config.storage_bucket(),
                )?
                .with_access_token(session.access_token),
            );
            user_id = Some(session.user.id);
        }

        Ok(Self {
            profile_name,
            context: AppContext::new(Backend::Remote(client), CLIENT_VERSION)?,
            user_id,
            storage,
        })
    }

    pub fn with_backend(
        profile_name: impl Into<String>,
        backend: Backend,
        user_id: Option<&str>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            profile_name: profile_name.into(),
            context: AppContext::new(backend, CLIENT_VERSION)?,
            user_id: user_id.map(ToString::to_string),
            storage: None,
        })
    }

    pub fn require_user(&self) -> Result<&str, CliError> {
        self.user_id.as_deref().ok_or(CliError::NotSignedIn)
    }

    pub fn storage(&self) -> Result<&StorageClient, CliError> {
        self.storage.as_ref().ok_or_else(|| {
            CliError::InvalidArgument(
                "Picture uploads need a configured backend and a signed-in user".to_string(),
            )
        })
    }

    /// Per-profile file remembering a dismissed update notice.
    pub fn dismissal_store(&self) -> Result<FileDismissalStore, CliError> {
        Ok(FileDismissalStore::new(dismissal_path(
            &config_dir().map_err(CliError::Config)?,
            &self.profile_name,
        )))
    }

    /// Print and clear queued toasts.
    pub fn flush_toasts(&self) {
        print_toasts(self.context.toasts());
    }
}

/// Profile name plus its stored settings with `MILK_*` overrides applied.
pub fn local_profile_config(
    explicit_profile: Option<&str>,
) -> Result<(String, BootstrapConfig), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let local = config
        .profile(&profile_name)
        .map(CliProfile::bootstrap_config)
        .unwrap_or_default()
        .merged_with(&env_overrides(|name| env::var(name).ok()));
    Ok((profile_name, local))
}

/// Like [`local_profile_config`], with the bootstrap manifest applied underneath.
pub async fn resolve_profile_config(
    explicit_profile: Option<&str>,
) -> Result<(String, BootstrapConfig), CliError> {
    let (profile_name, local) = local_profile_config(explicit_profile)?;
    let resolved = resolve_bootstrap_config(local.clone()).await?;
    Ok((profile_name, resolved.merged_with(&without_manifest(&local))))
}

/// Locally set values win over whatever the manifest publishes.
fn without_manifest(config: &BootstrapConfig) -> BootstrapConfig {
    BootstrapConfig {
        bootstrap_manifest_url: None,
        ..config.clone()
    }
}

pub fn dismissal_path(config_dir: &Path, profile_name: &str) -> PathBuf {
    config_dir
        .join("update-dismissals")
        .join(format!("{profile_name}.json"))
}

pub fn print_toasts(toasts: &ToastStore) {
    for toast in toasts.drain() {
        match toast.level {
            ToastLevel::Error => eprintln!("error: {}", toast.message),
            ToastLevel::Success | ToastLevel::Info => println!("{}", toast.message),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn normalize_search_term(parts: &[String]) -> Option<String> {
    let term = parts.join(" ");
    let trimmed = term.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now
        .signed_duration_since(timestamp)
        .num_milliseconds()
        .max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_search_lines(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            let tags = result
                .property_names
                .iter()
                .chain(&result.flavor_names)
                .map(|tag| tag.display_name())
                .collect::<Vec<_>>()
                .join(", ");
            if tags.is_empty() {
                format!("{}  {}", result.id, result.label())
            } else {
                format!("{}  {:<40}  {tags}", result.id, result.label())
            }
        })
        .collect()
}

pub fn format_feed_lines(items: &[FeedItem], now: DateTime<Utc>) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let name = [item.brand_name.as_deref(), item.product_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let by = item.display_name.as_deref().unwrap_or("anonymous");
            let mut line = format!(
                "{}  {:<32}  {:>7} {:<9}  {:<10}  by {by}",
                item.product_id,
                name,
                format_rating(item.rating),
                item.badge().as_str(),
                format_relative_time(item.created_at, now),
            );
            if let Some(price) = item.price_to_quality_ratio {
                line.push_str(&format!("  [{price}]"));
            }
            line
        })
        .collect()
}

pub fn format_aggregate_lines(products: &[AggregatedProduct]) -> Vec<String> {
    products
        .iter()
        .map(|product| {
            let mut name = format!("{} {}", product.brand_name, product.product_name)
                .trim()
                .to_string();
            if product.is_barista {
                name.push_str(" (Barista)");
            }
            let tests = if product.test_count == 1 { "test" } else { "tests" };
            format!(
                "{}  {:<40}  {:>7} {:<9}  {} {tests}",
                product.product_id,
                name,
                format_rating(product.average_rating),
                product.badge.as_str(),
                product.test_count,
            )
        })
        .collect()
}

pub fn format_notification_lines(notifications: &[Notification], now: DateTime<Utc>) -> Vec<String> {
    notifications
        .iter()
        .map(|notification| {
            let marker = if notification.is_read { " " } else { "*" };
            let mut line = format!(
                "{marker} {}  {:<10}  {}",
                notification.id,
                format_relative_time(notification.created_at, now),
                notification.title
            );
            if let Some(message) = notification.message.as_deref() {
                line.push_str(&format!(" - {message}"));
            }
            line
        })
        .collect()
}
