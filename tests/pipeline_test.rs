//! End-to-end runs of the fetch workflow against a local mock server

mod common;

use common::{catalog_toml, now, test_config, write_file, SAMPLE_AWD_FEED, SAMPLE_BO_FEED, SAMPLE_SESAMI_PAGE};
use polars::prelude::*;
use std::fs::File;
use tempfile::TempDir;
use tender_comb::collector::{Portal, SesamiPortal};
use tender_comb::exporter::ExportFormat;
use tender_comb::pipeline::{run_with_portals, FetchRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BO_PATH: &str = "/rss/Building_Works-CREATE_BO_FEED.xml";
const AWD_PATH: &str = "/rss/Building_Works-CREATE_AWD_FEED.xml";

async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    for (route, body, mime) in [
        (BO_PATH, SAMPLE_BO_FEED, "application/rss+xml"),
        (AWD_PATH, SAMPLE_AWD_FEED, "application/rss+xml"),
        ("/bizopps", SAMPLE_SESAMI_PAGE, "text/html"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), mime))
            .mount(&server)
            .await;
    }
    server
}

fn sesami(server: &MockServer) -> Vec<Box<dyn Portal>> {
    vec![Box::new(SesamiPortal::new(format!("{}/bizopps", server.uri())))]
}

#[tokio::test]
async fn test_full_run_writes_workbook() {
    let server = start_server().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_file(&config.feeds_catalog, &catalog_toml(&server.uri()));

    let request = FetchRequest {
        mode: "last_7_days".to_string(),
        all_feeds: true,
        ..Default::default()
    };
    let summary = run_with_portals(&request, &config, &sesami(&server), now())
        .await
        .unwrap();

    // Two BO items, one award and one Sesami row; the December item is filtered out
    assert_eq!(summary.raw_items, 4);
    assert_eq!(summary.exported, 3);
    assert_eq!(summary.failed_feeds, 0);
    assert_eq!(summary.stats.undated, 0);
    assert_eq!(
        summary.path,
        config.output_dir.join("260108-260115 Tender Export.xlsx")
    );
    assert!(summary.path.exists());
}

#[tokio::test]
async fn test_parquet_export_holds_normalized_records() {
    let server = start_server().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.export_format = "parquet".to_string();
    write_file(&config.feeds_catalog, &catalog_toml(&server.uri()));

    let request = FetchRequest {
        mode: "custom".to_string(),
        start: Some("2026-01-12".to_string()),
        end: Some("2026-01-12".to_string()),
        feeds: vec![format!("{}{BO_PATH}", server.uri())],
        format: ExportFormat::Parquet,
        ..Default::default()
    };
    let summary = run_with_portals(&request, &config, &sesami(&server), now())
        .await
        .unwrap();
    assert_eq!(
        summary.path.file_name().unwrap().to_str().unwrap(),
        "260112-260112 Tender Export.parquet"
    );

    let df = ParquetReader::new(File::open(&summary.path).unwrap())
        .finish()
        .unwrap();
    assert_eq!(df.height(), 2);

    let numbers: Vec<Option<&str>> = df.column("tender_number").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(numbers, vec![Some("HDB000ETQ26000001"), Some("RFQ-2026-001")]);

    let headers: Vec<Option<&str>> = df.column("main_header").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(
        headers,
        vec![Some("GEBIZ - 1. Construction"), Some("Sesami Business Opportunities")]
    );

    let entities: Vec<Option<&str>> = df.column("calling_entity").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(
        entities,
        vec![Some("Housing & Development Board"), Some("Changi Airport Group")]
    );
}

#[tokio::test]
async fn test_unknown_selection_fails_before_fetching() {
    let server = start_server().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let request = FetchRequest {
        selection: Some("Nope".to_string()),
        ..Default::default()
    };
    let err = run_with_portals(&request, &config, &sesami(&server), now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Selection 'Nope' not found"));
    assert!(!config.output_dir.exists());
}

#[tokio::test]
async fn test_excluding_undated_records() {
    let server = MockServer::start().await;
    let undated = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item>
    <title>Maintenance of lifts</title>
    <link>https://www.gebiz.gov.sg/ptn/opportunity/directlink.xhtml?docCode=X1</link>
    <description>Agency: Land Transport Authority | details to follow</description>
  </item>
</channel></rss>"#;
    Mock::given(method("GET"))
        .and(path(BO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(undated.to_string(), "application/rss+xml"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_file(&config.feeds_catalog, &catalog_toml(&server.uri()));
    let feeds = vec![format!("{}{BO_PATH}", server.uri())];

    let kept = FetchRequest {
        feeds: feeds.clone(),
        ..Default::default()
    };
    let summary = run_with_portals(&kept, &config, &[], now()).await.unwrap();
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.stats.undated, 1);

    let dropped = FetchRequest {
        feeds,
        include_undated: false,
        ..Default::default()
    };
    let summary = run_with_portals(&dropped, &config, &[], now()).await.unwrap();
    assert_eq!(summary.exported, 0);
}
