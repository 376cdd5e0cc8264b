use chrono::Utc;
use milk_core::models::{MilkTest, Product, ProductId};
use milk_core::rating::{format_rating, ScoreBadge};
use serde::Serialize;

use crate::commands::common::{format_relative_time, print_json, Session};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ProductDetails {
    pub product: Product,
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub average_rating: Option<f64>,
    pub tests: Vec<MilkTest>,
}

impl ProductDetails {
    pub fn title(&self) -> String {
        let mut title = [self.brand_name.as_deref(), self.product_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            title = self.product.id.to_string();
        }
        if self.product.is_barista {
            title.push_str(" (Barista)");
        }
        title
    }
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, CliError> {
    raw.parse::<ProductId>()
        .map_err(|_| CliError::InvalidArgument(format!("'{}' is not a product id", raw.trim())))
}

pub fn average_rating(tests: &[MilkTest]) -> Option<f64> {
    if tests.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let average = tests.iter().map(|test| test.rating).sum::<f64>() / tests.len() as f64;
    Some(average)
}

pub async fn load_product_details(
    session: &Session,
    id: ProductId,
) -> Result<ProductDetails, CliError> {
    let catalog = session.context.catalog();
    let product = catalog.product(id).await?;
    let tests = catalog.product_tests(id).await?;

    let brand_name = catalog
        .brands()
        .await?
        .into_iter()
        .find(|brand| brand.id == product.brand_id)
        .map(|brand| brand.name);
    let product_name = catalog
        .product_names()
        .await?
        .into_iter()
        .find(|name| name.id == product.name_id)
        .map(|name| name.name);

    Ok(ProductDetails {
        average_rating: average_rating(&tests),
        product,
        brand_name,
        product_name,
        tests,
    })
}

pub async fn run_product(session: &Session, id: &str, json: bool) -> Result<(), CliError> {
    let details = load_product_details(session, parse_product_id(id)?).await?;
    if json {
        return print_json(&details);
    }

    println!("{}", details.title());
    println!("  id: {}", details.product.id);
    let tags = details
        .product
        .property_names
        .iter()
        .chain(&details.product.flavor_names)
        .map(|tag| tag.display_name())
        .collect::<Vec<_>>();
    if !tags.is_empty() {
        println!("  {}", tags.join(", "));
    }

    let Some(average) = details.average_rating else {
        println!("  No tests yet.");
        return Ok(());
    };
    println!(
        "  {} ({}) from {} tests",
        format_rating(average),
        ScoreBadge::from_rating(average),
        details.tests.len()
    );

    let now = Utc::now();
    for test in &details.tests {
        let mut line = format!(
            "  - {:>7}  {:<10}",
            format_rating(test.rating),
            format_relative_time(test.created_at, now)
        );
        if let Some(price) = test.price_to_quality_ratio {
            line.push_str(&format!("  [{price}]"));
        }
        if let Some(notes) = test.notes.as_deref() {
            line.push_str(&format!("  {notes}"));
        }
        println!("{line}");
    }
    Ok(())
}
