//! Milk tests: individual ratings and the public feed built from them

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MilkTestId, ProductId, ShopId};
use crate::error::{Error, Result};
use crate::rating::{is_valid_rating, ScoreBadge};

/// Longest note a user can attach to a test.
pub const MAX_NOTES_LEN: usize = 1000;

/// The user's verdict on price versus quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceQualityRatio {
    #[serde(rename = "Too expensive")]
    TooExpensive,
    #[serde(rename = "Fair price")]
    FairPrice,
    #[serde(rename = "Great deal")]
    GreatDeal,
}

impl PriceQualityRatio {
    pub const ALL: [Self; 3] = [Self::TooExpensive, Self::FairPrice, Self::GreatDeal];

    pub const fn label(self) -> &'static str {
        match self {
            Self::TooExpensive => "Too expensive",
            Self::FairPrice => "Fair price",
            Self::GreatDeal => "Great deal",
        }
    }
}

impl fmt::Display for PriceQualityRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PriceQualityRatio {
    type Err = Error;

    /// Accepts the stored label or a kebab/snake spelling (`fair-price`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.label().to_ascii_lowercase() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown price/quality value '{s}'")))
    }
}

/// A stored milk test row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilkTest {
    pub id: MilkTestId,
    pub product_id: ProductId,
    pub user_id: String,
    pub rating: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub price_to_quality_ratio: Option<PriceQualityRatio>,
    #[serde(default)]
    pub shop_id: Option<ShopId>,
    #[serde(default)]
    pub picture_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new milk test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMilkTest {
    pub product_id: ProductId,
    pub user_id: String,
    pub rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_to_quality_ratio: Option<PriceQualityRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<ShopId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_path: Option<String>,
}

impl NewMilkTest {
    pub fn new(product_id: ProductId, user_id: impl Into<String>, rating: f64) -> Self {
        Self {
            product_id,
            user_id: user_id.into(),
            rating,
            notes: None,
            price_to_quality_ratio: None,
            shop_id: None,
            picture_path: None,
        }
    }

    /// Check the payload before it is sent and trim the optional note.
    pub fn validate(mut self) -> Result<Self> {
        if !is_valid_rating(self.rating) {
            return Err(Error::InvalidInput(format!(
                "rating must be between 0 and 10, got {}",
                self.rating
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("a signed-in user is required".to_string()));
        }
        self.notes = crate::util::normalize_text_option(self.notes);
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(Error::InvalidInput(format!(
                    "notes must be at most {MAX_NOTES_LEN} characters"
                )));
            }
        }
        Ok(self)
    }
}

/// One row of the paginated all-tests feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: MilkTestId,
    pub product_id: ProductId,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    pub rating: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub price_to_quality_ratio: Option<PriceQualityRatio>,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub picture_path: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_barista: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    pub fn badge(&self) -> ScoreBadge {
        ScoreBadge::from_rating(self.rating)
    }
}

/// All tests of one product folded into a single row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedProduct {
    pub product_id: ProductId,
    pub brand_name: String,
    pub product_name: String,
    pub is_barista: bool,
    pub average_rating: f64,
    pub test_count: usize,
    pub latest_test_at: DateTime<Utc>,
    pub badge: ScoreBadge,
}

/// Fold feed rows into one row per product.
///
/// Products keep the order in which they first appear in `items`.
pub fn aggregate_by_product(items: &[FeedItem]) -> Vec<AggregatedProduct> {
    let mut order: Vec<ProductId> = Vec::new();
    let mut groups: HashMap<ProductId, Vec<&FeedItem>> = HashMap::new();

    for item in items {
        groups
            .entry(item.product_id)
            .or_insert_with(|| {
                order.push(item.product_id);
                Vec::new()
            })
            .push(item);
    }

    order
        .into_iter()
        .filter_map(|product_id| {
            let tests = groups.remove(&product_id)?;
            let first = tests.first()?;
            #[allow(clippy::cast_precision_loss)]
            let average_rating =
                tests.iter().map(|test| test.rating).sum::<f64>() / tests.len() as f64;
            let latest_test_at = tests.iter().map(|test| test.created_at).max()?;

            Some(AggregatedProduct {
                product_id,
                brand_name: first.brand_name.clone().unwrap_or_default(),
                product_name: first.product_name.clone().unwrap_or_default(),
                is_barista: first.is_barista.unwrap_or(false),
                average_rating,
                test_count: tests.len(),
                latest_test_at,
                badge: ScoreBadge::from_rating(average_rating),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn feed_item(product_id: ProductId, rating: f64, day: u32) -> FeedItem {
        FeedItem {
            id: MilkTestId::new(),
            product_id,
            brand_name: Some("Oatly".to_string()),
            product_name: Some("Oat Drink".to_string()),
            rating,
            notes: None,
            price_to_quality_ratio: None,
            shop_name: None,
            picture_path: None,
            display_name: None,
            is_barista: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn price_quality_parses_labels_and_kebab_case() {
        assert_eq!(
            "fair-price".parse::<PriceQualityRatio>().unwrap(),
            PriceQualityRatio::FairPrice
        );
        assert_eq!(
            "Too expensive".parse::<PriceQualityRatio>().unwrap(),
            PriceQualityRatio::TooExpensive
        );
        assert!("cheap".parse::<PriceQualityRatio>().is_err());
    }

    #[test]
    fn price_quality_serializes_as_label() {
        let json = serde_json::to_string(&PriceQualityRatio::GreatDeal).unwrap();
        assert_eq!(json, "\"Great deal\"");
    }

    #[test]
    fn validate_rejects_out_of_range_rating() {
        let test = NewMilkTest::new(ProductId::new(), "user", 11.0);
        assert!(test.validate().is_err());
    }

    #[test]
    fn validate_trims_notes_and_enforces_length() {
        let mut test = NewMilkTest::new(ProductId::new(), "user", 7.0);
        test.notes = Some("  creamy  ".to_string());
        assert_eq!(test.validate().unwrap().notes.as_deref(), Some("creamy"));

        let mut test = NewMilkTest::new(ProductId::new(), "user", 7.0);
        test.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        assert!(test.validate().is_err());
    }

    #[test]
    fn new_test_omits_empty_optionals_when_serialized() {
        let test = NewMilkTest::new(ProductId::new(), "user", 6.0);
        let value = serde_json::to_value(&test).unwrap();
        assert!(value.get("notes").is_none());
        assert!(value.get("shop_id").is_none());
    }

    #[test]
    fn aggregate_groups_by_product_in_first_seen_order() {
        let oat = ProductId::new();
        let soy = ProductId::new();
        let items = vec![
            feed_item(oat, 9.0, 3),
            feed_item(soy, 4.0, 2),
            feed_item(oat, 8.0, 1),
        ];

        let aggregated = aggregate_by_product(&items);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].product_id, oat);
        assert_eq!(aggregated[0].test_count, 2);
        assert!((aggregated[0].average_rating - 8.5).abs() < f64::EPSILON);
        assert_eq!(aggregated[0].badge, ScoreBadge::Excellent);
        assert_eq!(aggregated[0].latest_test_at, items[0].created_at);
        assert_eq!(aggregated[1].product_id, soy);
        assert_eq!(aggregated[1].badge, ScoreBadge::Poor);
    }
}
