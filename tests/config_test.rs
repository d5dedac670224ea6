//! Tests for run files, the feed catalog and saved selections

mod common;

use common::{catalog_toml, write_file};
use std::path::PathBuf;
use tempfile::TempDir;
use tender_comb::catalog::FeedCatalog;
use tender_comb::config::RunConfigFile;
use tender_comb::models::FeedKind;
use tender_comb::selection::{SelectionKind, SelectionStore};

#[test]
fn test_run_file_with_all_keys() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("run.toml");
    write_file(
        &path,
        r#"
mode = "custom"
start = "2026-01-05"
end = "2026-01-09"
feeds = ["https://www.gebiz.gov.sg/rss/Others-CREATE_BO_FEED.xml"]
all_feeds = false
selection = "Weekly"
portals = ["sesami", "stlogs"]
include_undated = false

feeds_catalog = "conf/feeds.toml"
output_dir = "out"
request_timeout_secs = 30
max_retries = 5
concurrent_fetches = 8
max_pages = 3
stlogs_grid_url = "https://epro.example/grid.json"
ariba_leads_url = "https://leads.example/sg.json"
export_format = "parquet"
"#,
    );

    let config = RunConfigFile::from_toml_file(&path).unwrap();
    assert_eq!(config.mode, "custom");
    assert_eq!(config.start.as_deref(), Some("2026-01-05"));
    assert_eq!(config.end.as_deref(), Some("2026-01-09"));
    assert_eq!(config.selection.as_deref(), Some("Weekly"));
    assert!(!config.include_undated);
    assert_eq!(config.resolved.feeds_catalog, PathBuf::from("conf/feeds.toml"));
    assert_eq!(config.resolved.request_timeout_secs, 30);
    assert_eq!(config.resolved.max_retries, 5);
    assert_eq!(config.resolved.concurrent_fetches, 8);
    assert_eq!(
        config.resolved.stlogs_grid_url.as_deref(),
        Some("https://epro.example/grid.json")
    );
    assert_eq!(config.resolved.max_pages, 3);
    assert_eq!(
        config.resolved.ariba_leads_url.as_deref(),
        Some("https://leads.example/sg.json")
    );
    assert_eq!(config.resolved.export_format, "parquet");
    // Unset keys keep their defaults
    assert_eq!(config.resolved.retry_initial_delay_ms, 1000);
}

#[test]
fn test_run_file_rejects_zero_max_pages() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("run.toml");
    write_file(&path, "max_pages = 0\n");
    let err = RunConfigFile::from_toml_file(&path).unwrap_err();
    assert!(err.to_string().contains("Max pages must be greater than 0"));
}

#[test]
fn test_run_file_missing_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = RunConfigFile::from_toml_file(&temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().starts_with("IO error"));
}

#[test]
fn test_catalog_loaded_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("feeds.toml");
    write_file(&path, &catalog_toml("https://www.gebiz.gov.sg"));

    let catalog = FeedCatalog::load(&path).unwrap();
    let urls = catalog.all_urls();
    assert_eq!(urls.len(), 2);

    let bo = "https://www.gebiz.gov.sg/rss/Building_Works-CREATE_BO_FEED.xml";
    assert_eq!(
        catalog.category_for_url(bo),
        ("1. Construction".to_string(), "a. Building Works".to_string())
    );
    let kinds: Vec<FeedKind> = catalog.entries().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![FeedKind::BusinessOpportunity, FeedKind::Award]);

    let selected = catalog.categorize_selected(&["Building_Works-CREATE_AWD_FEED.xml".to_string()]);
    assert!(selected.bo.is_empty());
    assert!(selected.awd.contains("Construction > Building Works"));
}

#[test]
fn test_missing_catalog_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = FeedCatalog::load(&temp_dir.path().join("none.toml")).unwrap();
    assert!(catalog.is_empty());
    assert!(catalog.all_urls().is_empty());
}

#[test]
fn test_broken_catalog_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("feeds.toml");
    write_file(&path, "[feeds.\"Main\".\"Sub\"]\nrss = \"https://x\"\n");
    assert!(FeedCatalog::load(&path).is_err());
}

#[test]
fn test_selections_list_sorted_and_skip_unreadable() {
    let temp_dir = TempDir::new().unwrap();
    let store = SelectionStore::new(temp_dir.path());
    store
        .save("Zeta", SelectionKind::Awd, vec!["https://z".to_string()])
        .unwrap();
    store
        .save("Alpha", SelectionKind::Bo, vec!["https://a".to_string(), "https://b".to_string()])
        .unwrap();
    write_file(&temp_dir.path().join("broken.json"), "{ not json");

    let names: Vec<(String, usize)> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|s| (s.name, s.count))
        .collect();
    assert_eq!(names, vec![("Alpha".to_string(), 2), ("Zeta".to_string(), 1)]);

    store.delete("Zeta").unwrap();
    assert!(store.delete("Zeta").is_err());
    assert_eq!(store.list().unwrap().len(), 1);
}
