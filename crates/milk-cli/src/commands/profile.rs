use crate::cli::ProfileCommands;
use crate::commands::common::{print_json, Session};
use crate::error::CliError;

pub async fn run_profile(
    session: &Session,
    command: Option<ProfileCommands>,
) -> Result<(), CliError> {
    let user_id = session.require_user()?;
    let catalog = session.context.catalog();

    match command.unwrap_or(ProfileCommands::Show { json: false }) {
        ProfileCommands::Show { json } => {
            let profile = catalog.profile(user_id).await?;
            if json {
                return print_json(&profile);
            }
            let display_name = profile
                .as_ref()
                .and_then(|profile| profile.display_name.as_deref())
                .unwrap_or("(not set)");
            println!("User:         {user_id}");
            println!("Display name: {display_name}");
            if let Some(avatar) = profile.as_ref().and_then(|p| p.avatar_url.as_deref()) {
                println!("Avatar:       {avatar}");
            }
        }
        ProfileCommands::SetName { name } => {
            let profile = catalog.update_display_name(user_id, &name).await?;
            session.context.toasts().success(format!(
                "Display name set to '{}'",
                profile.display_name.as_deref().unwrap_or_default()
            ));
            session.flush_toasts();
        }
    }
    Ok(())
}
