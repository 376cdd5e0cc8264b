//! Supabase object storage for product pictures.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_base_url, unix_millis_now};

const UPLOAD_TIMEOUT_SECS: u64 = 30;
/// Largest picture accepted for upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Public URL of an object in a public bucket.
///
/// Each path segment is percent-encoded and `/` separators are kept. Values
/// that are already absolute http(s) URLs are returned unchanged.
pub fn public_url(supabase_url: &str, bucket: &str, path: &str) -> String {
    let path = path.trim();
    if is_http_url(path) {
        return path.to_string();
    }
    let base = supabase_url.trim().trim_end_matches('/');
    format!(
        "{base}/storage/v1/object/public/{}/{}",
        urlencoding::encode(bucket.trim()),
        encode_path(path)
    )
}

/// Storage key for a new upload: `{user_id}/{unix_ms}.{ext}`.
pub fn object_path(user_id: &str, extension: &str, unix_ms: i64) -> String {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    let extension = if extension.is_empty() {
        "jpg".to_string()
    } else {
        extension
    };
    format!("{}/{unix_ms}.{extension}", user_id.trim())
}

/// Content type for common picture extensions.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct StorageErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

/// Uploads to and resolves URLs in one bucket.
#[derive(Debug, Clone)]
pub struct StorageClient {
    supabase_url: String,
    anon_key: String,
    bucket: String,
    access_token: Option<String>,
    client: Client,
}

impl StorageClient {
    pub fn new(supabase_url: &str, anon_key: impl Into<String>, bucket: &str) -> Result<Self> {
        let supabase_url = normalize_base_url(supabase_url).ok_or_else(|| {
            Error::Config("Supabase URL must include http:// or https://".to_string())
        })?;
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(Error::Config("storage bucket must not be empty".to_string()));
        }

        Ok(Self {
            supabase_url,
            anon_key: anon_key.into().trim().to_string(),
            bucket: bucket.to_string(),
            access_token: None,
            client: Client::builder()
                .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
                .build()?,
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn public_url(&self, path: &str) -> String {
        public_url(&self.supabase_url, &self.bucket, path)
    }

    /// Upload `bytes` under `path` and return the stored path.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let Some(access_token) = self.access_token.as_deref() else {
            return Err(Error::Storage("sign in to upload pictures".to_string()));
        };
        if bytes.is_empty() {
            return Err(Error::InvalidInput("picture is empty".to_string()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(Error::InvalidInput(format!(
                "picture exceeds {} MB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.supabase_url,
            urlencoding::encode(&self.bucket),
            encode_path(path)
        );
        tracing::debug!("uploading {} bytes to {}", bytes.len(), path);
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StorageErrorResponse>(&body)
                .ok()
                .and_then(|payload| payload.message.or(payload.error))
                .unwrap_or_else(|| compact_text(&body));
            return Err(Error::Storage(format!("upload failed ({status}): {message}")));
        }
        Ok(path.to_string())
    }

    /// Upload a local picture for `user_id` under a fresh timestamped key.
    pub async fn upload_picture(&self, user_id: &str, file: &Path) -> Result<String> {
        let extension = file
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or("jpg");
        let bytes = tokio::fs::read(file).await?;
        let path = object_path(user_id, extension, unix_millis_now());
        self.upload(&path, bytes, content_type_for(extension)).await
    }
}
