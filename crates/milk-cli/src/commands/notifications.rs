use chrono::Utc;
use milk_core::models::NotificationId;

use crate::cli::NotificationCommands;
use crate::commands::common::{format_notification_lines, print_json, Session};
use crate::error::CliError;

pub async fn run_notifications(
    session: &Session,
    command: Option<NotificationCommands>,
) -> Result<(), CliError> {
    let user_id = session.require_user()?;
    let catalog = session.context.catalog();

    match command.unwrap_or(NotificationCommands::List { json: false }) {
        NotificationCommands::List { json } => {
            let notifications = catalog.notifications(user_id).await?;
            if json {
                return print_json(&notifications);
            }
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for line in format_notification_lines(&notifications, Utc::now()) {
                println!("{line}");
            }
        }
        NotificationCommands::Read { id } => {
            let id = id.parse::<NotificationId>().map_err(|_| {
                CliError::InvalidArgument(format!("'{}' is not a notification id", id.trim()))
            })?;
            let notification = catalog.mark_notification_read(id).await?;
            session
                .context
                .toasts()
                .success(format!("Marked '{}' as read", notification.title));
            session.flush_toasts();
        }
    }
    Ok(())
}
