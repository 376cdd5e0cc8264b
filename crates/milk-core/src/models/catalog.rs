//! Crowdsourced catalog rows: brands, names, products, shops and lookups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BrandId, FlavorId, NameId, NotificationId, ProductId, PropertyId, ShopId, TagKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
}

/// A product name shared across brands ("Oat Drink", "Haferdrink").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductName {
    pub id: NameId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: FlavorId,
    pub key: TagKey,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub key: TagKey,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub name: String,
}

/// A concrete product: brand + name + barista flag + attribute keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub brand_id: BrandId,
    pub name_id: NameId,
    #[serde(default)]
    pub is_barista: bool,
    #[serde(default)]
    pub property_names: Vec<TagKey>,
    #[serde(default)]
    pub flavor_names: Vec<TagKey>,
}

/// Insert payload for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProduct {
    pub brand_id: BrandId,
    pub name_id: NameId,
    pub is_barista: bool,
    pub property_names: Vec<TagKey>,
    pub flavor_names: Vec<TagKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Counters returned by the public statistics procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicStats {
    #[serde(default)]
    pub total_tests: i64,
    #[serde(default)]
    pub total_products: i64,
    #[serde(default)]
    pub total_brands: i64,
    #[serde(default)]
    pub total_users: i64,
}
