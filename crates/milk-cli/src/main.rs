//! Milk Me Not CLI - rate and discover plant-based milk from the terminal

mod auth;
mod backend;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{Access, GlobalOptions, Session};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::feed::run_feed;
use crate::commands::info::run_info;
use crate::commands::lookup::run_lookup;
use crate::commands::notifications::run_notifications;
use crate::commands::product::run_product;
use crate::commands::profile::run_profile;
use crate::commands::rate::run_rate;
use crate::commands::search::run_search;
use crate::commands::stats::run_stats;
use crate::commands::update::run_update;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "milk=info"
        .parse::<tracing_subscriber::filter::Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        profile: cli.profile,
        fixture: cli.fixture,
    };

    match cli.command {
        Commands::Search {
            term,
            all_layers,
            json,
        } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_search(&session, &term, all_layers, json).await?;
        }
        Commands::Feed {
            page,
            page_size,
            by_product,
            json,
        } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_feed(&session, page, page_size, by_product, json).await?;
        }
        Commands::Stats { json } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_stats(&session, json).await?;
        }
        Commands::Product { id, json } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_product(&session, &id, json).await?;
        }
        Commands::Rate(args) => {
            let session = Session::open(&options, Access::SignedIn).await?;
            run_rate(&session, &args).await?;
        }
        Commands::Lookup { kind, json } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_lookup(&session, kind, json).await?;
        }
        Commands::Notifications { command } => {
            let session = Session::open(&options, Access::SignedIn).await?;
            run_notifications(&session, command).await?;
        }
        Commands::Profile { command } => {
            let session = Session::open(&options, Access::SignedIn).await?;
            run_profile(&session, command).await?;
        }
        Commands::Update { command } => {
            let session = Session::open(&options, Access::Anonymous).await?;
            run_update(&session, command).await?;
        }
        Commands::Info { json } => run_info(&options, json)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
        Commands::Config { command } => run_config(command, &options).await?,
        Commands::Auth { command } => run_auth(command, &options).await?,
    }

    Ok(())
}
