use std::io;

use milk_core::auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] milk_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Search term must be at least {0} characters")]
    SearchTermTooShort(usize),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not signed in. Run `milk auth login --email <email> --password <password>` first.")]
    NotSignedIn,
    #[error(
        "Backend is not configured. Run `milk config init`, set MILK_SUPABASE_URL and MILK_SUPABASE_ANON_KEY, or pass --fixture <PATH>."
    )]
    BackendNotConfigured,
}

impl From<AuthError> for CliError {
    fn from(error: AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
