//! Per-session application state.
//!
//! An [`AppContext`] is created once at startup, handed to every command or
//! view that needs the backend, and dropped on exit. It owns the toast queue
//! and the request cache so neither outlives the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::QueryCache;
use crate::error::Result;
use crate::models::SearchResult;
use crate::rest::RemoteStore;
use crate::search::ProductSearch;
use crate::services::CatalogService;
use crate::toast::ToastStore;
use crate::version::{DismissalStore, NoticeState, Version, VersionGate};

/// Message shown for any failed backend call.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

pub struct AppContext<S> {
    store: Arc<S>,
    toasts: ToastStore,
    cache: Arc<QueryCache<Value>>,
    client_version: Version,
}

impl<S> std::fmt::Debug for AppContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("toasts", &self.toasts)
            .field("cache", &self.cache)
            .field("client_version", &self.client_version)
            .finish_non_exhaustive()
    }
}

impl<S: RemoteStore> AppContext<S> {
    pub fn new(store: S, client_version: &str) -> Result<Self> {
        Ok(Self {
            store: Arc::new(store),
            toasts: ToastStore::default(),
            cache: Arc::new(QueryCache::default()),
            client_version: client_version.parse()?,
        })
    }

    #[must_use]
    pub fn with_toasts(mut self, toasts: ToastStore) -> Self {
        self.toasts = toasts;
        self
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn toasts(&self) -> &ToastStore {
        &self.toasts
    }

    pub const fn client_version(&self) -> Version {
        self.client_version
    }

    pub fn catalog(&self) -> CatalogService<S> {
        CatalogService::new(Arc::clone(&self.store), Arc::clone(&self.cache))
    }

    pub fn product_search(&self) -> ProductSearch<S> {
        ProductSearch::new(Arc::clone(&self.store))
    }

    /// Run the layered product search. Failures already yield an empty list.
    pub async fn search(&self, term: &str) -> Vec<SearchResult> {
        self.product_search().search(term).await
    }

    pub fn version_gate<D: DismissalStore>(&self, dismissals: D) -> VersionGate<D> {
        VersionGate::from_version(self.client_version, dismissals)
    }

    /// Check for an update notice; never fails.
    pub async fn update_notice<D: DismissalStore>(
        &self,
        gate: &VersionGate<D>,
        now: DateTime<Utc>,
    ) -> NoticeState {
        gate.check(self.store.as_ref(), now).await
    }

    /// Unwrap a user-flow result, or log it and show a generic toast.
    pub fn report<T>(&self, action: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!("{} failed: {}", action, error);
                self.toasts.error(GENERIC_FAILURE_MESSAGE);
                None
            }
        }
    }

    /// Drop cached reads, e.g. after signing in as a different user.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
