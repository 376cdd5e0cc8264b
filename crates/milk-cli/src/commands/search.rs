use milk_core::search::{FallbackPolicy, NormalizedTerm, MIN_QUERY_LEN};
use milk_core::SearchResult;

use crate::commands::common::{format_search_lines, normalize_search_term, print_json, Session};
use crate::error::CliError;

pub async fn search_products(
    session: &Session,
    term_parts: &[String],
    all_layers: bool,
) -> Result<Vec<SearchResult>, CliError> {
    let term = normalize_search_term(term_parts)
        .filter(|term| NormalizedTerm::parse(term).is_some())
        .ok_or(CliError::SearchTermTooShort(MIN_QUERY_LEN))?;

    let policy = if all_layers {
        FallbackPolicy::Always
    } else {
        FallbackPolicy::WhenEmpty
    };
    let search = session.context.product_search().with_policy(policy);
    let results = search.try_search(&term).await;
    Ok(session
        .context
        .report("Product search", results)
        .unwrap_or_default())
}

pub async fn run_search(
    session: &Session,
    term_parts: &[String],
    all_layers: bool,
    json: bool,
) -> Result<(), CliError> {
    let results = search_products(session, term_parts, all_layers).await?;
    session.flush_toasts();

    if json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No products found.");
        return Ok(());
    }
    for line in format_search_lines(&results) {
        println!("{line}");
    }
    Ok(())
}
