//! Tests for loading configuration from YAML files

use std::io::Write;
use tempfile::NamedTempFile;
use userdeck::config::{DeckConfig, ListingContract};
use userdeck::prelude::*;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(yaml.as_bytes()).expect("write");
    file
}

#[test]
fn test_load_full_document() {
    let file = write_config(
        r#"
cache:
  page_size: 20
  look_ahead_threshold: 3
source:
  base_url: http://api.internal:8080
  listing: full
  timeout_ms: 2500
generator:
  batch_threshold: 1000
  batch_size: 250
  channel_capacity: 4
server:
  host: 0.0.0.0
  port: 7000
  record_count: 5000
  allowed_origins:
    - http://localhost:3000
"#,
    );

    let config = DeckConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.cache.page_size, 20);
    assert_eq!(config.cache.look_ahead_threshold, 3);
    assert_eq!(config.source.listing, ListingContract::Full);
    assert_eq!(config.source.timeout().as_millis(), 2500);
    assert_eq!(config.generator.batch_size, 250);
    assert_eq!(config.server.bind_address(), "0.0.0.0:7000");
    assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DeckConfig::from_yaml_file(dir.path().join("absent.yaml")).is_err());
}

#[test]
fn test_invalid_values_are_config_errors() {
    let file = write_config("generator:\n  batch_size: 0\n");
    let err = DeckConfig::from_yaml_file(file.path()).unwrap_err();
    match err.downcast::<CacheError>() {
        Ok(CacheError::Config { .. }) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let file = write_config("cache: [not, a, map");
    assert!(DeckConfig::from_yaml_file(file.path()).is_err());
}

#[tokio::test]
async fn test_controller_from_cache_settings() {
    let config = DeckConfig::from_yaml_str(
        "cache:\n  page_size: 4\n  default_sort:\n    field: age\n    direction: desc\n",
    )
    .unwrap();

    let controller = PaginationController::builder(Arc::new(InMemoryUserSource::generated(10)))
        .settings(&config.cache)
        .build()
        .unwrap();
    controller.load_initial().await.unwrap();

    assert_eq!(controller.page_size(), 4);
    assert_eq!(controller.sort(), Some(SortConfig::desc(UserField::Age)));
    let ages: Vec<u32> = controller.visible_slice().rows.iter().map(|u| u.age).collect();
    assert_eq!(ages, vec![27, 26, 25, 24]);
}
