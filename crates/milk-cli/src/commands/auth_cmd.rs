use milk_core::auth::SignUpOutcome;

use crate::auth::{clear_stored_session, load_stored_session, SupabaseAuthService};
use crate::cli::AuthCommands;
use crate::commands::common::{resolve_profile_config, GlobalOptions};
use crate::error::CliError;

async fn auth_service(options: &GlobalOptions) -> Result<(String, Option<SupabaseAuthService>), CliError> {
    let (profile_name, config) = resolve_profile_config(options.profile()).await?;
    let service = config
        .supabase_endpoint()?
        .map(|endpoint| SupabaseAuthService::new(&profile_name, &endpoint))
        .transpose()?;
    Ok((profile_name, service))
}

async fn require_auth_service(
    options: &GlobalOptions,
) -> Result<(String, SupabaseAuthService), CliError> {
    let (profile_name, service) = auth_service(options).await?;
    let service = service.ok_or(CliError::BackendNotConfigured)?;
    Ok((profile_name, service))
}

pub async fn run_auth(command: AuthCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let (profile_name, service) = require_auth_service(options).await?;
            let session = service.sign_in(&email, &password).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
        }
        AuthCommands::Signup { email, password } => {
            let (profile_name, service) = require_auth_service(options).await?;
            match service.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!("Account created; profile '{profile_name}' signed in as {email_label}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!(
                        "Account created. Confirm it from the email sent to {}, then run `milk auth login`.",
                        email.trim()
                    );
                }
            }
        }
        AuthCommands::Status => {
            let (profile_name, service) = auth_service(options).await?;
            let session = match service {
                Some(service) => service.restore_session().await?,
                None => load_stored_session(&profile_name)?,
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
        }
        AuthCommands::Logout => {
            let (profile_name, service) = auth_service(options).await?;
            let stored_session = load_stored_session(&profile_name)?;

            if let (Some(service), Some(session)) = (service, stored_session) {
                service.sign_out(&session.access_token).await?;
            } else {
                clear_stored_session(&profile_name)?;
            }
            println!("Signed out profile '{profile_name}'");
        }
        AuthCommands::Recover { email, redirect_to } => {
            let (_, service) = require_auth_service(options).await?;
            service
                .request_password_recovery(&email, redirect_to.as_deref())
                .await?;
            println!(
                "If an account exists for {}, a password reset link is on its way.",
                email.trim()
            );
        }
        AuthCommands::ResetPassword { link, password } => {
            let (profile_name, service) = require_auth_service(options).await?;
            let session = service.reset_password(&link, &password).await?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Password updated; profile '{profile_name}' signed in as {email_label}");
        }
    }
    Ok(())
}
