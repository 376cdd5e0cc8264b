//! The store a CLI invocation talks to.

use std::path::Path;

use milk_core::rest::{MemoryStore, PostgrestClient, Query, RemoteStore};
use milk_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// User id attributed to writes made against a fixture.
pub const FIXTURE_USER_ID: &str = "fixture-user";

#[derive(Debug)]
pub enum Backend {
    Remote(PostgrestClient),
    Fixture(MemoryStore),
}

impl Backend {
    pub fn fixture(path: &Path) -> Result<Self> {
        let store = MemoryStore::from_fixture_file(path)?;
        tracing::debug!("Serving data from fixture {}", path.display());
        Ok(Self::Fixture(store))
    }
}

impl RemoteStore for Backend {
    async fn select<T>(&self, table: &str, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            Self::Remote(client) => client.select(table, query).await,
            Self::Fixture(store) => store.select(table, query).await,
        }
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        match self {
            Self::Remote(client) => client.insert(table, body).await,
            Self::Fixture(store) => store.insert(table, body).await,
        }
    }

    async fn update<B, T>(&self, table: &str, query: &Query, patch: &B) -> Result<Vec<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        match self {
            Self::Remote(client) => client.update(table, query, patch).await,
            Self::Fixture(store) => store.update(table, query, patch).await,
        }
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        match self {
            Self::Remote(client) => client.delete(table, query).await,
            Self::Fixture(store) => store.delete(table, query).await,
        }
    }

    async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T>
    where
        A: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        match self {
            Self::Remote(client) => client.rpc(function, args).await,
            Self::Fixture(store) => store.rpc(function, args).await,
        }
    }
}
