use milk_core::models::PublicStats;

use crate::commands::common::{print_json, Session};
use crate::error::CliError;

pub fn format_stats_lines(stats: &PublicStats) -> Vec<String> {
    vec![
        format!("Tests:    {}", stats.total_tests),
        format!("Products: {}", stats.total_products),
        format!("Brands:   {}", stats.total_brands),
        format!("Testers:  {}", stats.total_users),
    ]
}

pub async fn run_stats(session: &Session, json: bool) -> Result<(), CliError> {
    let stats = session.context.catalog().public_stats().await?;
    if json {
        return print_json(&stats);
    }
    for line in format_stats_lines(&stats) {
        println!("{line}");
    }
    Ok(())
}
