//! Typed records for rows owned by the remote database.
//!
//! Rows are validated when they cross the HTTP boundary: required columns are
//! plain fields, nullable columns are `Option`, and underscore-joined
//! attribute keys become [`TagKey`]s.

mod catalog;
mod milk_test;
mod product;
mod version;

pub use catalog::{
    Brand, Country, Currency, Flavor, NewProduct, Notification, Product, ProductName, Profile,
    Property, PublicStats, Shop,
};
pub use milk_test::{
    aggregate_by_product, AggregatedProduct, FeedItem, MilkTest, NewMilkTest, PriceQualityRatio,
    MAX_NOTES_LEN,
};
pub use product::{ProductSearchRow, SearchResult, TagKey};
pub use version::VersionDescriptor;

/// Declares a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Get the string representation of this ID
            #[must_use]
            pub fn as_str(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s.trim())?))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a product (brand + name + variant)
    ProductId
);
uuid_id!(
    /// Identifier of a single milk test (one user's rating)
    MilkTestId
);
uuid_id!(BrandId);
uuid_id!(NameId);
uuid_id!(ShopId);
uuid_id!(FlavorId);
uuid_id!(PropertyId);
uuid_id!(NotificationId);
