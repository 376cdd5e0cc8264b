use chrono::{Duration, TimeZone, Utc};
use clap::CommandFactory;
use milk_core::config::BootstrapConfig;
use milk_core::context::GENERIC_FAILURE_MESSAGE;
use milk_core::models::{FeedItem, MilkTestId, PriceQualityRatio, ProductId, TagKey};
use milk_core::platform::{CaptureSource, Platform};
use milk_core::rest::MemoryStore;
use milk_core::toast::ToastLevel;
use milk_core::version::{MemoryDismissalStore, NoticeState};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::backend::{Backend, FIXTURE_USER_ID};
use crate::cli::{Cli, CompletionShell, PriceArg, RateArgs};
use crate::commands::common::{
    dismissal_path, format_feed_lines, format_relative_time, normalize_search_term, Session,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{mask_secret, merge_profile, normalize_bootstrap_url};
use crate::commands::info::ClientInfo;
use crate::commands::product::{load_product_details, parse_product_id};
use crate::commands::rate::{parse_tag_keys, rate_product, SAVED_MESSAGE};
use crate::commands::search::search_products;
use crate::commands::stats::format_stats_lines;
use crate::commands::update::{dismiss_current_notice, UpdateStatus};
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const OATLY_ID: &str = "5b0c8a0e-9d7e-4f3a-8a51-2f6f1c7c0a01";

fn fixture_session(store: MemoryStore) -> Session {
    Session::with_backend("test", Backend::Fixture(store), Some(FIXTURE_USER_ID)).unwrap()
}

fn fixture_store(session: &Session) -> &MemoryStore {
    match session.context.store().as_ref() {
        Backend::Fixture(store) => store,
        Backend::Remote(_) => panic!("expected fixture backend"),
    }
}

fn catalog_store() -> MemoryStore {
    let store = MemoryStore::new();
    for table in ["brands", "names", "shops", "products", "milk_tests"] {
        store.insert_rows(table, Vec::new());
    }
    store
}

fn rate_args(rating: f64) -> RateArgs {
    RateArgs {
        brand: "Oatly".to_string(),
        name: "Oat Drink".to_string(),
        barista: true,
        rating,
        notes: Some("Foams well".to_string()),
        price: Some(PriceArg::FairPrice),
        shop: Some("Rewe".to_string()),
        properties: vec!["No added sugar".to_string()],
        flavors: Vec::new(),
        picture: None,
        json: false,
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now - Duration::days(3), now), "3d ago");
    assert_eq!(format_relative_time(now + Duration::minutes(5), now), "just now");
}

#[test]
fn normalize_search_term_joins_and_trims() {
    let parts = vec!["  oat".to_string(), "barista ".to_string()];
    assert_eq!(normalize_search_term(&parts).as_deref(), Some("oat barista"));
    assert_eq!(normalize_search_term(&[" ".to_string()]), None);
}

#[tokio::test(flavor = "current_thread")]
async fn search_rejects_short_terms() {
    let session = fixture_session(MemoryStore::new());
    let result = search_products(&session, &["o".to_string()], false).await;
    assert!(matches!(result, Err(CliError::SearchTermTooShort(2))));
    assert_eq!(fixture_store(&session).request_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn search_finds_products_by_brand() {
    let store = MemoryStore::new();
    store.insert_rows(
        "product_search",
        vec![json!({
            "id": OATLY_ID,
            "brand_name": "Oatly",
            "product_name": "Oat Drink",
            "property_names": ["no_added_sugar"],
            "property_names_text": "no_added_sugar",
            "flavor_names": [],
            "flavor_names_text": "",
            "is_barista": true
        })],
    );
    let session = fixture_session(store);

    let results = search_products(&session, &["oatly".to_string()], false)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].label(), "Oatly Oat Drink (Barista)");
}

#[tokio::test(flavor = "current_thread")]
async fn failed_search_is_empty_with_error_toast() {
    let session = fixture_session(MemoryStore::new());

    let results = search_products(&session, &["oat".to_string()], false)
        .await
        .unwrap();
    assert!(results.is_empty());

    let toasts = session.context.toasts().drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert_eq!(toasts[0].message, GENERIC_FAILURE_MESSAGE);
}

#[test]
fn parse_tag_keys_accepts_labels_and_dedups() {
    let keys = parse_tag_keys(&[
        "No added sugar".to_string(),
        "no_added_sugar".to_string(),
        "organic".to_string(),
    ])
    .unwrap();
    assert_eq!(
        keys,
        vec![
            TagKey::parse("no_added_sugar").unwrap(),
            TagKey::parse("organic").unwrap()
        ]
    );
    assert!(parse_tag_keys(&["!!".to_string()]).is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn rate_creates_catalog_rows_once() {
    let session = fixture_session(catalog_store());

    let first = rate_product(&session, &rate_args(8.5)).await.unwrap();
    assert_eq!(first.user_id, FIXTURE_USER_ID);
    assert_eq!(first.price_to_quality_ratio, Some(PriceQualityRatio::FairPrice));
    assert!(first.shop_id.is_some());

    let second = rate_product(&session, &rate_args(7.0)).await.unwrap();
    assert_eq!(first.product_id, second.product_id);

    let store = fixture_store(&session);
    assert_eq!(store.rows("brands").len(), 1);
    assert_eq!(store.rows("names").len(), 1);
    assert_eq!(store.rows("shops").len(), 1);
    assert_eq!(store.rows("products").len(), 1);
    assert_eq!(store.rows("milk_tests").len(), 2);
    assert_eq!(
        store.rows("products")[0]["property_names"],
        json!(["no_added_sugar"])
    );

    let toasts = session.context.toasts().drain();
    assert_eq!(toasts.len(), 2);
    assert_eq!(toasts[0].message, SAVED_MESSAGE);
}

#[tokio::test(flavor = "current_thread")]
async fn rate_rejects_invalid_rating_before_writing() {
    let session = fixture_session(catalog_store());
    let result = rate_product(&session, &rate_args(11.0)).await;
    assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    assert_eq!(fixture_store(&session).request_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn rate_with_picture_requires_storage() {
    let session = fixture_session(catalog_store());
    let mut args = rate_args(8.0);
    args.picture = Some("carton.jpg".into());
    let result = rate_product(&session, &args).await;
    assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    assert_eq!(fixture_store(&session).request_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn rate_requires_signed_in_user() {
    let session = Session::with_backend("test", Backend::Fixture(catalog_store()), None).unwrap();
    let result = rate_product(&session, &rate_args(8.0)).await;
    assert!(matches!(result, Err(CliError::NotSignedIn)));
}

#[test]
fn parse_product_id_rejects_garbage() {
    assert!(parse_product_id(OATLY_ID).is_ok());
    assert!(matches!(
        parse_product_id("oatly"),
        Err(CliError::InvalidArgument(_))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn product_details_resolve_names_and_average() {
    let session = fixture_session(catalog_store());
    let stored = rate_product(&session, &rate_args(9.0)).await.unwrap();
    let mut args = rate_args(6.0);
    args.shop = None;
    rate_product(&session, &args).await.unwrap();

    let details = load_product_details(&session, stored.product_id)
        .await
        .unwrap();
    assert_eq!(details.title(), "Oatly Oat Drink (Barista)");
    assert_eq!(details.tests.len(), 2);
    assert!((details.average_rating.unwrap() - 7.5).abs() < f64::EPSILON);

    let missing = load_product_details(&session, ProductId::new()).await;
    assert!(matches!(
        missing,
        Err(CliError::Core(milk_core::Error::NotFound(_)))
    ));
}

#[test]
fn feed_lines_show_rating_badge_and_price() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let item = FeedItem {
        id: MilkTestId::new(),
        product_id: OATLY_ID.parse().unwrap(),
        brand_name: Some("Oatly".to_string()),
        product_name: Some("Oat Drink".to_string()),
        rating: 8.5,
        notes: None,
        price_to_quality_ratio: Some(PriceQualityRatio::GreatDeal),
        shop_name: None,
        picture_path: None,
        display_name: Some("Oat Fan".to_string()),
        is_barista: Some(false),
        created_at: now - Duration::hours(3),
    };

    let lines = format_feed_lines(&[item], now);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(OATLY_ID));
    assert!(lines[0].contains("Oatly Oat Drink"));
    assert!(lines[0].contains("8.5/10 excellent"));
    assert!(lines[0].contains("3h ago"));
    assert!(lines[0].contains("by Oat Fan"));
    assert!(lines[0].contains("[Great deal]"));
}

#[test]
fn stats_lines_list_every_counter() {
    let stats = milk_core::models::PublicStats {
        total_tests: 12,
        total_products: 4,
        total_brands: 3,
        total_users: 5,
    };
    let lines = format_stats_lines(&stats);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Tests:    12");
    assert_eq!(lines[3], "Testers:  5");
}

#[test]
fn update_status_describes_hidden_and_shown_notices() {
    let hidden = UpdateStatus::from_state("1.2.0".to_string(), &NoticeState::Hidden);
    assert_eq!(hidden.lines(), vec!["You are on the latest version (1.2.0).".to_string()]);
}

#[tokio::test(flavor = "current_thread")]
async fn dismissing_update_hides_it_until_cooldown() {
    let store = MemoryStore::new();
    store.insert_rows(
        "app_versions",
        vec![json!({
            "version": "99.0.0",
            "release_notes": "New feed",
            "published_at": "2024-05-01T00:00:00Z"
        })],
    );
    let session = fixture_session(store);
    let gate = session.context.version_gate(MemoryDismissalStore::new());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();

    let state = session.context.update_notice(&gate, now).await;
    let status = UpdateStatus::from_state(session.context.client_version().to_string(), &state);
    assert_eq!(status.available_version.as_deref(), Some("99.0.0"));
    assert!(status.major);
    assert!(status.lines().iter().any(|line| line == "This is a major update."));

    let until = dismiss_current_notice(&session, &gate, now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(until, now + Duration::hours(168));
    assert!(!session.context.update_notice(&gate, now).await.is_shown());
    assert!(dismiss_current_notice(&session, &gate, now).await.unwrap().is_none());

    gate.clear_dismissal().unwrap();
    assert!(session.context.update_notice(&gate, now).await.is_shown());
}

#[test]
fn dismissal_path_is_per_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dismissal_path(dir.path(), "work");
    assert!(path.starts_with(dir.path()));
    assert!(path.ends_with("update-dismissals/work.json"));
}

#[test]
fn merge_profile_prefers_explicit_then_manifest_then_env() {
    let existing = CliProfile {
        supabase_url: Some("https://old.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
        storage_bucket: Some("old-bucket".to_string()),
        bootstrap_manifest_url: None,
    };
    let env = BootstrapConfig {
        supabase_anon_key: Some("env-key".to_string()),
        storage_bucket: Some("env-bucket".to_string()),
        ..BootstrapConfig::default()
    };
    let manifest = BootstrapConfig {
        supabase_url: Some("https://manifest.supabase.co".to_string()),
        supabase_anon_key: Some("manifest-key".to_string()),
        ..BootstrapConfig::default()
    };
    let explicit = BootstrapConfig {
        supabase_url: Some("https://explicit.supabase.co".to_string()),
        ..BootstrapConfig::default()
    };

    let merged = merge_profile(&existing, &explicit, Some(&manifest), &env);
    assert_eq!(
        merged,
        CliProfile {
            supabase_url: Some("https://explicit.supabase.co".to_string()),
            supabase_anon_key: Some("manifest-key".to_string()),
            storage_bucket: Some("env-bucket".to_string()),
            bootstrap_manifest_url: None,
        }
    );
}

#[test]
fn normalize_bootstrap_url_requires_http_scheme() {
    assert_eq!(
        normalize_bootstrap_url("https://milk.example.com/bootstrap/").unwrap(),
        "https://milk.example.com/bootstrap"
    );
    assert!(normalize_bootstrap_url("milk.example.com/bootstrap").is_err());
}

#[test]
fn mask_secret_keeps_edges_only() {
    assert_eq!(mask_secret("short"), "********");
    assert_eq!(mask_secret("eyJhbGciOiJIUzI1NiJ9"), "eyJh********NiJ9");
}

#[test]
fn bash_completions_reference_binary_and_commands() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("milk"));
    assert!(script.contains("rate"));
    assert!(script.contains("search"));
}

#[test]
fn info_lines_report_profile_and_picture_sources() {
    let info = ClientInfo {
        version: "0.1.0".to_string(),
        profile: "default".to_string(),
        backend: "https://demo.supabase.co".to_string(),
        storage_bucket: "milk-images".to_string(),
        signed_in_as: None,
        platform: Platform::Web,
        capture_sources: vec![CaptureSource::FilePicker],
    };

    assert_eq!(
        info.lines(),
        vec![
            "Version:   0.1.0".to_string(),
            "Profile:   default".to_string(),
            "Backend:   https://demo.supabase.co".to_string(),
            "Bucket:    milk-images".to_string(),
            "Signed in: no".to_string(),
            "Pictures:  Upload file".to_string(),
        ]
    );
}
