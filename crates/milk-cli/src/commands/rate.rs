use milk_core::models::{MilkTest, NewMilkTest, NewProduct, PriceQualityRatio, TagKey};
use milk_core::rating::{format_rating, is_valid_rating, ScoreBadge};

use crate::cli::{PriceArg, RateArgs};
use crate::commands::common::{print_json, Session};
use crate::error::CliError;

pub const SAVED_MESSAGE: &str = "Thanks! Your rating was saved.";

impl From<PriceArg> for PriceQualityRatio {
    fn from(value: PriceArg) -> Self {
        match value {
            PriceArg::TooExpensive => Self::TooExpensive,
            PriceArg::FairPrice => Self::FairPrice,
            PriceArg::GreatDeal => Self::GreatDeal,
        }
    }
}

/// Accepts either a stored key (`no_added_sugar`) or its label ("No added sugar").
pub fn parse_tag_keys(raw: &[String]) -> Result<Vec<TagKey>, CliError> {
    let mut keys: Vec<TagKey> = Vec::with_capacity(raw.len());
    for value in raw {
        let key = TagKey::parse(value).or_else(|_| TagKey::from_display(value))?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Create whatever catalog rows are missing and record the test.
pub async fn rate_product(session: &Session, args: &RateArgs) -> Result<MilkTest, CliError> {
    let user_id = session.require_user()?;
    if !is_valid_rating(args.rating) {
        return Err(CliError::InvalidArgument(format!(
            "--rating must be between 0 and 10, got {}",
            args.rating
        )));
    }
    let storage = match args.picture.as_deref() {
        Some(path) => Some((session.storage()?, path)),
        None => None,
    };
    let property_names = parse_tag_keys(&args.properties)?;
    let flavor_names = parse_tag_keys(&args.flavors)?;

    let catalog = session.context.catalog();
    let brand = catalog.ensure_brand(&args.brand).await?.into_inner();
    let name = catalog.ensure_product_name(&args.name).await?.into_inner();
    let product = catalog
        .ensure_product(&NewProduct {
            brand_id: brand.id,
            name_id: name.id,
            is_barista: args.barista,
            property_names,
            flavor_names,
        })
        .await?;
    if product.was_created() {
        tracing::info!("Added {} {} to the catalog", brand.name, name.name);
    }

    let shop_id = match args.shop.as_deref() {
        Some(shop) => Some(catalog.ensure_shop(shop).await?.into_inner().id),
        None => None,
    };
    let picture_path = match storage {
        Some((storage, path)) => Some(storage.upload_picture(user_id, path).await?),
        None => None,
    };

    let mut test = NewMilkTest::new(product.into_inner().id, user_id, args.rating);
    test.notes.clone_from(&args.notes);
    test.price_to_quality_ratio = args.price.map(PriceQualityRatio::from);
    test.shop_id = shop_id;
    test.picture_path = picture_path;

    let stored = catalog.submit_test(test).await?;
    session.context.toasts().success(SAVED_MESSAGE);
    Ok(stored)
}

pub async fn run_rate(session: &Session, args: &RateArgs) -> Result<(), CliError> {
    let stored = rate_product(session, args).await?;
    if args.json {
        session.context.toasts().drain();
        return print_json(&stored);
    }

    session.flush_toasts();
    println!(
        "{} {}: {} ({})",
        args.brand.trim(),
        args.name.trim(),
        format_rating(stored.rating),
        ScoreBadge::from_rating(stored.rating)
    );
    Ok(())
}
