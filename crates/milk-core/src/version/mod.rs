//! Update notices.
//!
//! The latest published [`VersionDescriptor`] is compared with the version
//! compiled into the client. A newer release is announced with a banner, or a
//! modal when the major component changes or the release is flagged major.
//! Dismissing a notice hides it for a cooldown; a strictly newer release
//! shows again immediately.

mod dismissal;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::VersionDescriptor;
use crate::rest::{Direction, Query, RemoteStore};

pub use dismissal::{DismissalRecord, DismissalStore, FileDismissalStore, MemoryDismissalStore};

/// Hours a dismissed banner stays hidden.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;
/// Hours a dismissed major-update modal stays hidden.
pub const MAJOR_COOLDOWN_HOURS: i64 = 168;
/// Table of published releases.
pub const VERSIONS_TABLE: &str = "app_versions";

/// A `MAJOR.MINOR.PATCH` version. Ordering is component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Accepts an optional `v` prefix, drops pre-release/build suffixes and
    /// fills missing trailing components with zero.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("invalid version '{s}'"));
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix(['v', 'V'])
            .unwrap_or(trimmed);
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        if core.is_empty() {
            return Err(invalid());
        }

        let parts = core
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        match parts.as_slice() {
            [major] => Ok(Self::new(*major, 0, 0)),
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

/// Whether `latest` is strictly newer than `current`. Unparseable input is never newer.
pub fn is_newer_version(current: &str, latest: &str) -> bool {
    match (current.parse::<Version>(), latest.parse::<Version>()) {
        (Ok(current), Ok(latest)) => latest > current,
        _ => false,
    }
}

/// Whether the major component differs between `current` and `latest`.
pub fn is_major_update(current: &str, latest: &str) -> bool {
    match (current.parse::<Version>(), latest.parse::<Version>()) {
        (Ok(current), Ok(latest)) => latest.major != current.major,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    Banner,
    Modal,
}

impl NoticeKind {
    pub const fn cooldown_hours(self) -> i64 {
        match self {
            Self::Banner => DEFAULT_COOLDOWN_HOURS,
            Self::Modal => MAJOR_COOLDOWN_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub descriptor: VersionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeState {
    Hidden,
    Shown(Notice),
}

impl NoticeState {
    pub const fn is_shown(&self) -> bool {
        matches!(self, Self::Shown(_))
    }
}

/// Fetch the most recently published release, if the table has any rows.
pub async fn fetch_latest_version<S: RemoteStore>(store: &S) -> Result<Option<VersionDescriptor>> {
    let query = Query::new()
        .order("published_at", Direction::Desc)
        .limit(1);
    let rows: Vec<VersionDescriptor> = store.select(VERSIONS_TABLE, &query).await?;
    Ok(rows.into_iter().next())
}

/// Decides whether an update notice is shown for this client.
#[derive(Debug)]
pub struct VersionGate<D> {
    client_version: Version,
    dismissals: D,
}

impl<D: DismissalStore> VersionGate<D> {
    pub fn new(client_version: &str, dismissals: D) -> Result<Self> {
        Ok(Self::from_version(client_version.parse()?, dismissals))
    }

    pub const fn from_version(client_version: Version, dismissals: D) -> Self {
        Self {
            client_version,
            dismissals,
        }
    }

    pub const fn client_version(&self) -> Version {
        self.client_version
    }

    /// Fetch the latest release and evaluate it. Any failure keeps the notice hidden.
    pub async fn check<S: RemoteStore>(&self, store: &S, now: DateTime<Utc>) -> NoticeState {
        match fetch_latest_version(store).await {
            Ok(Some(latest)) => self.evaluate(&latest, now),
            Ok(None) => NoticeState::Hidden,
            Err(error) if error.is_missing_table() => {
                tracing::debug!("Version table unavailable: {}", error);
                NoticeState::Hidden
            }
            Err(error) => {
                tracing::warn!("Version check failed: {}", error);
                NoticeState::Hidden
            }
        }
    }

    pub fn evaluate(&self, latest: &VersionDescriptor, now: DateTime<Utc>) -> NoticeState {
        let latest_version = match latest.version.parse::<Version>() {
            Ok(version) => version,
            Err(error) => {
                tracing::warn!("Ignoring published release: {}", error);
                return NoticeState::Hidden;
            }
        };
        if latest_version <= self.client_version {
            return NoticeState::Hidden;
        }
        if !self.should_show_version(&latest.version, now) {
            return NoticeState::Hidden;
        }

        let kind = if latest.is_major || latest_version.major != self.client_version.major {
            NoticeKind::Modal
        } else {
            NoticeKind::Banner
        };
        NoticeState::Shown(Notice {
            kind,
            descriptor: latest.clone(),
        })
    }

    /// Whether a notice for `version` may be shown given the stored dismissal.
    ///
    /// An active dismissal hides the same or any older version; an expired one,
    /// or one recorded for a strictly older version, does not.
    pub fn should_show_version(&self, version: &str, now: DateTime<Utc>) -> bool {
        let Ok(version) = version.parse::<Version>() else {
            return false;
        };
        let record = match self.dismissals.load() {
            Ok(Some(record)) => record,
            Ok(None) => return true,
            Err(error) => {
                tracing::warn!("Failed to read update dismissal: {}", error);
                return true;
            }
        };
        if !record.is_active(now) {
            return true;
        }
        record
            .version
            .parse::<Version>()
            .map_or(true, |dismissed| version > dismissed)
    }

    /// Hide notices for `version` for `cooldown_hours`.
    pub fn dismiss_version(
        &self,
        version: &str,
        cooldown_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<DismissalRecord> {
        let parsed = version.parse::<Version>()?;
        let record = DismissalRecord::new(parsed.to_string(), cooldown_hours, now);
        self.dismissals.save(&record)?;
        tracing::debug!(
            "Dismissed update notice for {} until {}",
            record.version,
            record.expires_at
        );
        Ok(record)
    }

    /// Dismiss a shown notice with the cooldown for its kind.
    pub fn dismiss(&self, notice: &Notice, now: DateTime<Utc>) -> Result<DismissalRecord> {
        self.dismiss_version(
            &notice.descriptor.version,
            notice.kind.cooldown_hours(),
            now,
        )
    }

    pub fn clear_dismissal(&self) -> Result<()> {
        self.dismissals.clear()
    }
}
