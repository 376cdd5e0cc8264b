use chrono::{DateTime, Utc};
use milk_core::version::{DismissalStore, NoticeKind, NoticeState, VersionGate};
use serde::Serialize;

use crate::cli::UpdateCommands;
use crate::commands::common::{print_json, Session};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UpdateStatus {
    pub current_version: String,
    pub available_version: Option<String>,
    pub major: bool,
    pub requires_full_update: bool,
    pub release_notes: Option<String>,
}

impl UpdateStatus {
    pub fn from_state(current_version: String, state: &NoticeState) -> Self {
        match state {
            NoticeState::Hidden => Self {
                current_version,
                available_version: None,
                major: false,
                requires_full_update: false,
                release_notes: None,
            },
            NoticeState::Shown(notice) => Self {
                current_version,
                available_version: Some(notice.descriptor.version.clone()),
                major: notice.kind == NoticeKind::Modal,
                requires_full_update: notice.descriptor.requires_full_update,
                release_notes: notice.descriptor.release_notes.clone(),
            },
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let Some(available) = self.available_version.as_deref() else {
            return vec![format!(
                "You are on the latest version ({}).",
                self.current_version
            )];
        };

        let mut lines = vec![format!(
            "Version {available} is available (you have {}).",
            self.current_version
        )];
        if self.major {
            lines.push("This is a major update.".to_string());
        }
        if let Some(notes) = self.release_notes.as_deref() {
            lines.push(String::new());
            lines.push(notes.trim().to_string());
        }
        if self.requires_full_update {
            lines.push("Reinstall the app to get this version.".to_string());
        }
        lines
    }
}

pub async fn dismiss_current_notice<D: DismissalStore>(
    session: &Session,
    gate: &VersionGate<D>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, CliError> {
    let NoticeState::Shown(notice) = session.context.update_notice(gate, now).await else {
        return Ok(None);
    };
    let record = gate.dismiss(&notice, now)?;
    Ok(Some(record.expires_at))
}

pub async fn run_update(
    session: &Session,
    command: Option<UpdateCommands>,
) -> Result<(), CliError> {
    let gate = session.context.version_gate(session.dismissal_store()?);
    let now = Utc::now();

    match command.unwrap_or(UpdateCommands::Check { json: false }) {
        UpdateCommands::Check { json } => {
            let state = session.context.update_notice(&gate, now).await;
            let status =
                UpdateStatus::from_state(session.context.client_version().to_string(), &state);
            if json {
                return print_json(&status);
            }
            for line in status.lines() {
                println!("{line}");
            }
        }
        UpdateCommands::Dismiss => match dismiss_current_notice(session, &gate, now).await? {
            Some(until) => println!(
                "Update notice hidden until {}",
                until.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("No update notice to dismiss."),
        },
        UpdateCommands::Reset => {
            gate.clear_dismissal()?;
            println!("Update notices reset.");
        }
    }
    Ok(())
}
