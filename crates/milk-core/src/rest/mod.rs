//! Remote relational store access.
//!
//! [`RemoteStore`] is the seam every service and algorithm goes through.
//! [`PostgrestClient`] talks to the hosted Supabase REST endpoint and
//! [`MemoryStore`] applies the same filter semantics to in-memory JSON rows.

mod memory;
mod query;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{compact_text, normalize_base_url};

pub use memory::MemoryStore;
pub(crate) use query::sanitize_term;
pub use query::{Direction, Filter, Query};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Typed request/response access to tables, views and procedures.
pub trait RemoteStore: Send + Sync {
    /// Fetch rows of `table` matching `query`.
    fn select<T>(&self, table: &str, query: &Query) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Insert one row and return it as stored.
    fn insert<B, T>(&self, table: &str, body: &B) -> impl Future<Output = Result<T>> + Send
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send;

    /// Patch all rows matching `query` and return them.
    fn update<B, T>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send;

    /// Delete all rows matching `query`.
    fn delete(&self, table: &str, query: &Query) -> impl Future<Output = Result<()>> + Send;

    /// Call a server-side procedure.
    fn rpc<A, T>(&self, function: &str, args: &A) -> impl Future<Output = Result<T>> + Send
    where
        A: Serialize + Sync,
        T: DeserializeOwned + Send;
}

/// HTTP client for the Supabase REST (PostgREST) endpoint.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl PostgrestClient {
    pub fn new(supabase_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(
            supabase_url,
            anon_key,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        supabase_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let rest_url = normalize_rest_url(supabase_url)?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::Config(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            access_token: None,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// Act on behalf of a signed-in user instead of the anonymous role.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.anon_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(bearer)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

impl RemoteStore for PostgrestClient {
    async fn select<T>(&self, table: &str, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        tracing::debug!("select {}", query.cache_key(table));
        Self::send(self.request(Method::GET, table).query(&query.to_pairs())).await
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        tracing::debug!("insert into {}", table);
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = Self::send(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("insert into {table} returned no row")))
    }

    async fn update<B, T>(&self, table: &str, query: &Query, patch: &B) -> Result<Vec<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        tracing::debug!("update {}", query.cache_key(table));
        let request = self
            .request(Method::PATCH, table)
            .query(&query.to_pairs())
            .header("Prefer", "return=representation")
            .json(patch);
        Self::send(request).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        tracing::debug!("delete {}", query.cache_key(table));
        let response = self
            .request(Method::DELETE, table)
            .query(&query.to_pairs())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T>
    where
        A: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        tracing::debug!("rpc {}", function);
        Self::send(self.request(Method::POST, &format!("rpc/{function}")).json(args)).await
    }
}

fn normalize_rest_url(supabase_url: &str) -> Result<String> {
    let base = normalize_base_url(supabase_url).ok_or_else(|| {
        Error::Config("Supabase URL must include http:// or https://".to_string())
    })?;
    if base.ends_with("/rest/v1") {
        Ok(base)
    } else {
        Ok(format!("{base}/rest/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(parse_api_error(status, &body))
}

fn parse_api_error(status: u16, body: &str) -> Error {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.details)
            .or(payload.hint)
            .map(|message| message.trim().to_string())
        {
            return Error::api(status, payload.code, message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        Error::api(status, None, format!("HTTP {status}"))
    } else {
        Error::api(status, None, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Brand;
    use crate::test_support::spawn_one_shot_server;

    #[test]
    fn rest_url_is_derived_from_project_url() {
        assert_eq!(
            normalize_rest_url("https://demo.supabase.co/").unwrap(),
            "https://demo.supabase.co/rest/v1"
        );
        assert_eq!(
            normalize_rest_url("https://demo.supabase.co/rest/v1").unwrap(),
            "https://demo.supabase.co/rest/v1"
        );
        assert!(normalize_rest_url("demo.supabase.co").is_err());
    }

    #[test]
    fn empty_anon_key_is_rejected() {
        assert!(PostgrestClient::new("https://demo.supabase.co", "  ").is_err());
    }

    #[test]
    fn error_payload_maps_codes() {
        let error = parse_api_error(
            404,
            r#"{"code":"42P01","message":"relation \"public.app_versions\" does not exist"}"#,
        );
        assert!(error.is_missing_table());

        let error = parse_api_error(409, r#"{"code":"23505","message":"duplicate key"}"#);
        assert!(error.is_unique_violation());

        let error = parse_api_error(502, "");
        assert!(error.to_string().contains("HTTP 502"));
    }

    #[tokio::test]
    async fn select_sends_filters_and_parses_rows() {
        let brand = Brand {
            id: crate::models::BrandId::new(),
            name: "Oatly".to_string(),
        };
        let body = serde_json::to_string(&vec![brand.clone()]).unwrap();
        let (base_url, request) = spawn_one_shot_server("200 OK", &body).await;

        let client = PostgrestClient::new(&base_url, "anon").unwrap();
        let rows: Vec<Brand> = client
            .select("brands", &Query::new().eq("name", "Oatly").limit(1))
            .await
            .unwrap();

        assert_eq!(rows, vec![brand]);
        let request = request.await.unwrap();
        assert!(request.starts_with("GET /rest/v1/brands?select=*&name=eq.Oatly&limit=1"));
        assert!(request.to_ascii_lowercase().contains("apikey: anon"));
    }

    #[tokio::test]
    async fn select_surfaces_backend_errors() {
        let (base_url, _request) = spawn_one_shot_server(
            "404 Not Found",
            r#"{"code":"PGRST205","message":"Could not find the table"}"#,
        )
        .await;

        let client = PostgrestClient::new(&base_url, "anon").unwrap();
        let error = client
            .select::<Brand>("app_versions", &Query::new())
            .await
            .unwrap_err();
        assert!(error.is_missing_table());
    }

    #[tokio::test]
    async fn access_token_replaces_anon_bearer() {
        let (base_url, request) = spawn_one_shot_server("200 OK", "[]").await;

        let client = PostgrestClient::new(&base_url, "anon")
            .unwrap()
            .with_access_token("user-token");
        let _rows: Vec<Brand> = client.select("brands", &Query::new()).await.unwrap();

        let request = request.await.unwrap().to_ascii_lowercase();
        assert!(request.contains("authorization: bearer user-token"));
    }
}
