//! Product search rows and attribute keys

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProductId;
use crate::error::Error;

/// An underscore-joined attribute key such as `no_added_sugar` or `vanilla`.
///
/// Keys are lowercase ASCII alphanumerics separated by single underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagKey(String);

impl TagKey {
    /// Validate a raw key from the backend.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let key = raw.trim().to_ascii_lowercase();
        let valid = !key.is_empty()
            && !key.starts_with('_')
            && !key.ends_with('_')
            && !key.contains("__")
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(key))
        } else {
            Err(Error::InvalidInput(format!("invalid attribute key '{raw}'")))
        }
    }

    /// Build a key from a human label ("No added sugar" -> `no_added_sugar`).
    pub fn from_display(label: &str) -> crate::Result<Self> {
        let joined = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .replace('-', "_");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human label with underscores turned back into spaces.
    pub fn display_name(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TagKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TagKey> for String {
    fn from(value: TagKey) -> Self {
        value.0
    }
}

/// Raw row of the denormalised `product_search` view.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSearchRow {
    pub id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub property_names: Option<Vec<String>>,
    #[serde(default)]
    pub flavor_names: Option<Vec<String>>,
    #[serde(default)]
    pub is_barista: Option<bool>,
}

/// One product as returned to a type-ahead search.
///
/// Identity is the `id`: two results with the same id are the same product no
/// matter which query produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ProductId,
    pub product_name: String,
    pub brand_name: String,
    pub property_names: BTreeSet<TagKey>,
    pub flavor_names: BTreeSet<TagKey>,
    pub is_barista: bool,
}

impl SearchResult {
    /// "Brand Product" label, with a barista suffix where it applies.
    pub fn label(&self) -> String {
        let mut label = match (self.brand_name.is_empty(), self.product_name.is_empty()) {
            (false, false) => format!("{} {}", self.brand_name, self.product_name),
            (false, true) => self.brand_name.clone(),
            (true, _) => self.product_name.clone(),
        };
        if self.is_barista {
            label.push_str(" (Barista)");
        }
        label
    }
}

impl From<ProductSearchRow> for SearchResult {
    fn from(row: ProductSearchRow) -> Self {
        Self {
            id: row.id,
            product_name: row.product_name.unwrap_or_default().trim().to_string(),
            brand_name: row.brand_name.unwrap_or_default().trim().to_string(),
            property_names: parse_tag_set(row.property_names, row.id),
            flavor_names: parse_tag_set(row.flavor_names, row.id),
            is_barista: row.is_barista.unwrap_or(false),
        }
    }
}

fn parse_tag_set(raw: Option<Vec<String>>, product: ProductId) -> BTreeSet<TagKey> {
    raw.unwrap_or_default()
        .iter()
        .filter_map(|value| match TagKey::parse(value) {
            Ok(key) => Some(key),
            Err(error) => {
                tracing::warn!("Dropping attribute on product {}: {}", product, error);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_key_accepts_underscored_keys() {
        let key = TagKey::parse("No_Added_Sugar").unwrap();
        assert_eq!(key.as_str(), "no_added_sugar");
        assert_eq!(key.display_name(), "no added sugar");
    }

    #[test]
    fn tag_key_rejects_malformed_keys() {
        assert!(TagKey::parse("").is_err());
        assert!(TagKey::parse("_sugar").is_err());
        assert!(TagKey::parse("no__sugar").is_err());
        assert!(TagKey::parse("no sugar").is_err());
    }

    #[test]
    fn tag_key_from_display_joins_words() {
        let key = TagKey::from_display("  High   protein ").unwrap();
        assert_eq!(key.as_str(), "high_protein");
    }

    #[test]
    fn search_row_maps_nulls_to_defaults() {
        let id = ProductId::new();
        let row: ProductSearchRow = serde_json::from_value(serde_json::json!({
            "id": id,
            "product_name": "Haferdrink",
            "brand_name": null,
            "property_names": ["organic", "bad key"],
            "flavor_names": null,
            "is_barista": null,
        }))
        .unwrap();

        let result = SearchResult::from(row);
        assert_eq!(result.id, id);
        assert_eq!(result.brand_name, "");
        assert_eq!(result.property_names.len(), 1);
        assert!(result.flavor_names.is_empty());
        assert!(!result.is_barista);
    }

    #[test]
    fn label_marks_barista_variants() {
        let result = SearchResult {
            id: ProductId::new(),
            product_name: "Oat Drink".to_string(),
            brand_name: "Oatly".to_string(),
            property_names: BTreeSet::new(),
            flavor_names: BTreeSet::new(),
            is_barista: true,
        };
        assert_eq!(result.label(), "Oatly Oat Drink (Barista)");
    }
}
