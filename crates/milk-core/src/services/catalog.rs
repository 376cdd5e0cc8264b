//! Catalog reads and writes over a [`RemoteStore`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::QueryCache;
use crate::error::{Error, Result};
use crate::models::{
    aggregate_by_product, AggregatedProduct, Brand, Country, Currency, FeedItem, Flavor,
    MilkTest, NewMilkTest, NewProduct, Notification, NotificationId, Product, ProductId,
    ProductName, Profile, Property, PublicStats, Shop,
};
use crate::rest::{Direction, Query, RemoteStore};

pub const STATS_PROCEDURE: &str = "get_public_stats";
pub const ALL_TESTS_PROCEDURE: &str = "get_all_milk_tests";
pub const DEFAULT_FEED_PAGE_SIZE: usize = 20;
pub const MAX_DISPLAY_NAME_LEN: usize = 50;
const NOTIFICATION_LIMIT: usize = 50;

/// Result of a get-or-create call.
///
/// An existing row (including one that won an insert race) is a success
/// that redirects to that row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured<T> {
    Created(T),
    Existing(T),
}

impl<T> Ensured<T> {
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Created(row) | Self::Existing(row) => row,
        }
    }

    pub const fn get(&self) -> &T {
        match self {
            Self::Created(row) | Self::Existing(row) => row,
        }
    }
}

/// Typed access to catalog tables, lookups, feed and user rows.
///
/// Reference lists, statistics and feed pages go through a shared
/// [`QueryCache`]; writes invalidate the entries they affect.
pub struct CatalogService<S> {
    store: Arc<S>,
    cache: Arc<QueryCache<Value>>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: RemoteStore> CatalogService<S> {
    pub const fn new(store: Arc<S>, cache: Arc<QueryCache<Value>>) -> Self {
        Self { store, cache }
    }

    pub async fn public_stats(&self) -> Result<PublicStats> {
        let key = format!("rpc/{STATS_PROCEDURE}");
        let store = &self.store;
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                let stats: PublicStats = store.rpc(STATS_PROCEDURE, &serde_json::json!({})).await?;
                Ok(serde_json::to_value(stats)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// One page (1-based) of every test, newest first.
    pub async fn all_tests_page(&self, page: usize, page_size: usize) -> Result<Vec<FeedItem>> {
        if page == 0 || page_size == 0 {
            return Err(Error::InvalidInput(
                "page and page size start at 1".to_string(),
            ));
        }
        let key = format!("rpc/{ALL_TESTS_PROCEDURE}?page={page}&size={page_size}");
        let args = serde_json::json!({
            "page_number": page,
            "page_size": page_size,
        });
        let store = &self.store;
        let args = &args;
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                let items: Vec<FeedItem> = store.rpc(ALL_TESTS_PROCEDURE, args).await?;
                Ok(serde_json::to_value(items)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// A feed page folded into one row per product.
    pub async fn aggregate_feed(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<AggregatedProduct>> {
        let items = self.all_tests_page(page, page_size).await?;
        Ok(aggregate_by_product(&items))
    }

    pub async fn product(&self, id: ProductId) -> Result<Product> {
        let rows: Vec<Product> = self
            .store
            .select("products", &Query::new().eq("id", id).limit(1))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("product {id}")))
    }

    /// Every test of one product, newest first.
    pub async fn product_tests(&self, id: ProductId) -> Result<Vec<MilkTest>> {
        self.store
            .select(
                "milk_tests",
                &Query::new()
                    .eq("product_id", id)
                    .order("created_at", Direction::Desc),
            )
            .await
    }

    pub async fn submit_test(&self, test: NewMilkTest) -> Result<MilkTest> {
        let test = test.validate()?;
        let stored: MilkTest = self.store.insert("milk_tests", &test).await?;
        tracing::info!("Recorded test {} for product {}", stored.id, stored.product_id);
        self.cache.invalidate_prefix(&format!("rpc/{ALL_TESTS_PROCEDURE}"));
        self.cache.invalidate(&format!("rpc/{STATS_PROCEDURE}"));
        Ok(stored)
    }

    pub async fn ensure_brand(&self, name: &str) -> Result<Ensured<Brand>> {
        self.ensure_named("brands", name).await
    }

    pub async fn ensure_product_name(&self, name: &str) -> Result<Ensured<ProductName>> {
        self.ensure_named("names", name).await
    }

    pub async fn ensure_shop(&self, name: &str) -> Result<Ensured<Shop>> {
        self.ensure_named("shops", name).await
    }

    /// Find the product with the same brand, name and barista flag, or create it.
    pub async fn ensure_product(&self, product: &NewProduct) -> Result<Ensured<Product>> {
        let query = Query::new()
            .eq("brand_id", product.brand_id)
            .eq("name_id", product.name_id)
            .eq("is_barista", product.is_barista)
            .limit(1);

        if let Some(existing) = self.first::<Product>("products", &query).await? {
            return Ok(Ensured::Existing(existing));
        }

        match self.store.insert::<_, Product>("products", product).await {
            Ok(created) => {
                self.cache.invalidate_prefix("products");
                Ok(Ensured::Created(created))
            }
            Err(error) if error.is_unique_violation() => {
                tracing::debug!("Product created concurrently, using existing row");
                self.first("products", &query)
                    .await?
                    .map(Ensured::Existing)
                    .ok_or(error)
            }
            Err(error) => Err(error),
        }
    }

    pub async fn brands(&self) -> Result<Vec<Brand>> {
        self.cached_list("brands", "name").await
    }

    pub async fn product_names(&self) -> Result<Vec<ProductName>> {
        self.cached_list("names", "name").await
    }

    pub async fn shops(&self) -> Result<Vec<Shop>> {
        self.cached_list("shops", "name").await
    }

    pub async fn flavors(&self) -> Result<Vec<Flavor>> {
        self.cached_list("flavors", "name").await
    }

    pub async fn properties(&self) -> Result<Vec<Property>> {
        self.cached_list("properties", "name").await
    }

    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.cached_list("countries", "name").await
    }

    pub async fn currencies(&self) -> Result<Vec<Currency>> {
        self.cached_list("currencies", "code").await
    }

    pub async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.store
            .select(
                "notifications",
                &Query::new()
                    .eq("user_id", user_id)
                    .order("created_at", Direction::Desc)
                    .limit(NOTIFICATION_LIMIT),
            )
            .await
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<Notification> {
        let updated: Vec<Notification> = self
            .store
            .update(
                "notifications",
                &Query::new().eq("id", id),
                &serde_json::json!({ "is_read": true }),
            )
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("notification {id}")))
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.first("profiles", &Query::new().eq("id", user_id).limit(1))
            .await
    }

    pub async fn update_display_name(&self, user_id: &str, display_name: &str) -> Result<Profile> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::InvalidInput("display name must not be empty".to_string()));
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }

        let updated: Vec<Profile> = self
            .store
            .update(
                "profiles",
                &Query::new().eq("id", user_id),
                &serde_json::json!({ "display_name": display_name }),
            )
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("profile {user_id}")))
    }

    async fn ensure_named<T>(&self, table: &str, name: &str) -> Result<Ensured<T>>
    where
        T: DeserializeOwned + Send,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("{table}: name must not be empty")));
        }
        let query = Query::new().eq("name", name).limit(1);

        if let Some(existing) = self.first(table, &query).await? {
            return Ok(Ensured::Existing(existing));
        }

        match self
            .store
            .insert::<_, T>(table, &serde_json::json!({ "name": name }))
            .await
        {
            Ok(created) => {
                self.cache.invalidate_prefix(table);
                Ok(Ensured::Created(created))
            }
            Err(error) if error.is_unique_violation() => {
                tracing::debug!("{} '{}' already exists, using it", table, name);
                self.first(table, &query)
                    .await?
                    .map(Ensured::Existing)
                    .ok_or(error)
            }
            Err(error) => Err(error),
        }
    }

    async fn first<T>(&self, table: &str, query: &Query) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows: Vec<T> = self.store.select(table, query).await?;
        Ok(rows.into_iter().next())
    }

    async fn cached_list<T>(&self, table: &str, order_by: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Serialize + Send,
    {
        let query = Query::new().order(order_by, Direction::Asc);
        let key = query.cache_key(table);
        let store = &self.store;
        let query = &query;
        let value = self
            .cache
            .get_or_fetch(&key, move || async move {
                let rows: Vec<T> = store.select(table, query).await?;
                Ok(serde_json::to_value(rows)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::{BrandId, NameId, PriceQualityRatio};
    use crate::rest::MemoryStore;

    const PRODUCT_A: &str = "8d6f7ad4-6a32-4c43-9f5e-0e3a6f0f7a11";
    const PRODUCT_B: &str = "a1b7c0d2-3e4f-4a5b-8c6d-7e8f9a0b1c22";

    fn service(store: MemoryStore) -> (Arc<MemoryStore>, CatalogService<MemoryStore>) {
        let store = Arc::new(store);
        let catalog = CatalogService::new(Arc::clone(&store), Arc::new(QueryCache::default()));
        (store, catalog)
    }

    fn feed_row(id: &str, product_id: &str, rating: f64) -> Value {
        json!({
            "id": id,
            "product_id": product_id,
            "brand_name": "Oatly",
            "product_name": "Oat Drink",
            "rating": rating,
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn public_stats_are_cached() {
        let store = MemoryStore::new();
        store.set_procedure(
            STATS_PROCEDURE,
            json!({"total_tests": 12, "total_products": 4, "total_brands": 3, "total_users": 5}),
        );
        let (store, catalog) = service(store);

        let stats = catalog.public_stats().await.unwrap();
        assert_eq!(stats.total_tests, 12);
        catalog.public_stats().await.unwrap();
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn aggregate_feed_groups_by_product() {
        let store = MemoryStore::new();
        store.set_procedure(
            ALL_TESTS_PROCEDURE,
            json!([
                feed_row("0b7f6c1e-1111-4a5b-8c6d-000000000001", PRODUCT_A, 9.0),
                feed_row("0b7f6c1e-1111-4a5b-8c6d-000000000002", PRODUCT_B, 5.0),
                feed_row("0b7f6c1e-1111-4a5b-8c6d-000000000003", PRODUCT_A, 7.0),
            ]),
        );
        let (_store, catalog) = service(store);

        let aggregated = catalog.aggregate_feed(1, DEFAULT_FEED_PAGE_SIZE).await.unwrap();
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].product_id.to_string(), PRODUCT_A);
        assert_eq!(aggregated[0].test_count, 2);
        assert!((aggregated[0].average_rating - 8.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn feed_page_zero_is_rejected() {
        let (store, catalog) = service(MemoryStore::new());
        assert!(catalog.all_tests_page(0, 20).await.is_err());
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn ensure_brand_creates_then_redirects() {
        let store = MemoryStore::new();
        store.insert_rows("brands", Vec::new());
        let (store, catalog) = service(store);

        let created = catalog.ensure_brand("  Oatly ").await.unwrap();
        assert!(created.was_created());
        assert_eq!(created.get().name, "Oatly");

        let existing = catalog.ensure_brand("Oatly").await.unwrap();
        assert!(!existing.was_created());
        assert_eq!(existing.into_inner().id, created.into_inner().id);
        assert_eq!(store.rows("brands").len(), 1);
    }

    #[tokio::test]
    async fn ensure_rejects_blank_names() {
        let (_store, catalog) = service(MemoryStore::new());
        assert!(matches!(
            catalog.ensure_shop("   ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn ensure_product_reuses_matching_variant() {
        let brand_id = BrandId::new();
        let name_id = NameId::new();
        let store = MemoryStore::new();
        store.insert_rows("products", Vec::new());
        let (store, catalog) = service(store);

        let plain = NewProduct {
            brand_id,
            name_id,
            is_barista: false,
            property_names: Vec::new(),
            flavor_names: Vec::new(),
        };
        let barista = NewProduct {
            is_barista: true,
            ..plain.clone()
        };

        let first = catalog.ensure_product(&plain).await.unwrap();
        let again = catalog.ensure_product(&plain).await.unwrap();
        let other = catalog.ensure_product(&barista).await.unwrap();

        assert!(first.was_created());
        assert!(!again.was_created());
        assert!(other.was_created());
        assert_eq!(store.rows("products").len(), 2);
    }

    #[tokio::test]
    async fn submit_test_validates_and_invalidates_feed() {
        let store = MemoryStore::new();
        store.insert_rows("milk_tests", Vec::new());
        store.set_procedure(ALL_TESTS_PROCEDURE, json!([]));
        let (store, catalog) = service(store);

        catalog.all_tests_page(1, 20).await.unwrap();
        let requests_before = store.request_count();

        let product_id: ProductId = PRODUCT_A.parse().unwrap();
        let mut test = NewMilkTest::new(product_id, "user-1", 8.5);
        test.notes = Some("  Creamy, foams well ".to_string());
        test.price_to_quality_ratio = Some(PriceQualityRatio::FairPrice);
        let stored = catalog.submit_test(test).await.unwrap();
        assert_eq!(stored.notes.as_deref(), Some("Creamy, foams well"));

        catalog.all_tests_page(1, 20).await.unwrap();
        assert_eq!(store.request_count(), requests_before + 2);

        let invalid = NewMilkTest::new(product_id, "user-1", 10.5);
        assert!(catalog.submit_test(invalid).await.is_err());
        assert_eq!(store.rows("milk_tests").len(), 1);
    }

    #[tokio::test]
    async fn lookup_lists_are_sorted_and_cached() {
        let store = MemoryStore::new();
        store.insert_rows(
            "countries",
            vec![
                json!({"code": "SE", "name": "Sweden"}),
                json!({"code": "DE", "name": "Germany"}),
            ],
        );
        let (store, catalog) = service(store);

        let countries = catalog.countries().await.unwrap();
        let names: Vec<&str> = countries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Germany", "Sweden"]);
        catalog.countries().await.unwrap();
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn notifications_can_be_marked_read() {
        let id = NotificationId::new();
        let store = MemoryStore::new();
        store.insert_rows(
            "notifications",
            vec![json!({
                "id": id.to_string(),
                "user_id": "user-1",
                "title": "Your test got a like",
                "is_read": false,
                "created_at": "2024-05-01T10:00:00Z"
            })],
        );
        let (_store, catalog) = service(store);

        let unread = catalog.notifications("user-1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert!(!unread[0].is_read);

        let read = catalog.mark_notification_read(id).await.unwrap();
        assert!(read.is_read);
        assert!(matches!(
            catalog.mark_notification_read(NotificationId::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn display_name_is_trimmed_and_bounded() {
        let store = MemoryStore::new();
        store.insert_rows(
            "profiles",
            vec![json!({"id": "user-1", "display_name": null})],
        );
        let (_store, catalog) = service(store);

        let profile = catalog
            .update_display_name("user-1", "  Oat Fan ")
            .await
            .unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Oat Fan"));
        assert_eq!(catalog.profile("user-1").await.unwrap(), Some(profile));

        let too_long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        assert!(catalog.update_display_name("user-1", &too_long).await.is_err());
        assert!(catalog.profile("nobody").await.unwrap().is_none());
    }
}
