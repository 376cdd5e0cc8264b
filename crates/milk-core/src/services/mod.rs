//! Services shared by every client over the remote store.

mod catalog;

pub use catalog::{
    CatalogService, Ensured, ALL_TESTS_PROCEDURE, DEFAULT_FEED_PAGE_SIZE, MAX_DISPLAY_NAME_LEN,
    STATS_PROCEDURE,
};
