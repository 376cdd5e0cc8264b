//! Password recovery links.
//!
//! The reset email redirects to the app with the session in the URL
//! fragment: `#access_token=..&refresh_token=..&expires_in=..&type=recovery`.

use super::{AuthError, AuthResult};
use crate::util::unix_timestamp_now;

const RECOVERY_TYPE: &str = "recovery";
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Tokens extracted from a recovery redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryFragment {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl std::fmt::Debug for RecoveryFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryFragment")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl RecoveryFragment {
    /// Parse a full redirect URL or just its fragment.
    pub fn parse(input: &str) -> AuthResult<Self> {
        let fragment = input
            .split_once('#')
            .map_or(input, |(_, fragment)| fragment)
            .trim();
        if fragment.is_empty() {
            return Err(AuthError::InvalidRecoveryLink(
                "missing URL fragment".to_string(),
            ));
        }

        let mut access_token = None;
        let mut refresh_token = None;
        let mut expires_in = None;
        let mut expires_at = None;
        let mut link_type = None;

        for pair in fragment.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = decode(value)?;
            match key {
                "access_token" => access_token = Some(value),
                "refresh_token" => refresh_token = Some(value),
                "expires_in" => expires_in = value.parse::<i64>().ok(),
                "expires_at" => expires_at = value.parse::<i64>().ok(),
                "type" => link_type = Some(value),
                "error_description" => return Err(AuthError::InvalidRecoveryLink(value)),
                _ => {}
            }
        }

        match link_type.as_deref() {
            Some(RECOVERY_TYPE) => {}
            Some(other) => {
                return Err(AuthError::InvalidRecoveryLink(format!(
                    "unexpected link type '{other}'"
                )))
            }
            None => {
                return Err(AuthError::InvalidRecoveryLink(
                    "link type is missing".to_string(),
                ))
            }
        }

        let access_token = access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::InvalidRecoveryLink("access_token is missing".to_string()))?;
        let refresh_token = refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidRecoveryLink("refresh_token is missing".to_string())
            })?;
        let expires_at = expires_at.unwrap_or_else(|| {
            unix_timestamp_now()
                .saturating_add(expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
        });

        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

fn decode(value: &str) -> AuthResult<String> {
    urlencoding::decode(&value.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|error| AuthError::InvalidRecoveryLink(error.to_string()))
}
