use chrono::Utc;

use crate::commands::common::{format_aggregate_lines, format_feed_lines, print_json, Session};
use crate::error::CliError;

pub async fn run_feed(
    session: &Session,
    page: usize,
    page_size: usize,
    by_product: bool,
    json: bool,
) -> Result<(), CliError> {
    if page == 0 || page_size == 0 {
        return Err(CliError::InvalidArgument(
            "--page and --page-size start at 1".to_string(),
        ));
    }
    let catalog = session.context.catalog();

    if by_product {
        let products = catalog.aggregate_feed(page, page_size).await?;
        if json {
            return print_json(&products);
        }
        if products.is_empty() {
            println!("No milk tests yet.");
        }
        for line in format_aggregate_lines(&products) {
            println!("{line}");
        }
        return Ok(());
    }

    let items = catalog.all_tests_page(page, page_size).await?;
    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No milk tests yet.");
    }
    for line in format_feed_lines(&items, Utc::now()) {
        println!("{line}");
    }
    Ok(())
}
