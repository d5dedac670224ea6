//! The fetch workflow: collect, normalize, deduplicate, filter and export.

use crate::catalog::FeedCatalog;
use crate::collector::{collect_portals, fetch_feeds, portal_for, PageFetcher, Portal};
use crate::config::{ResolvedConfig, RunConfigFile};
use crate::dates::{filter_by_date, now_in_singapore, DateMode, FilterStats};
use crate::errors::{AppError, AppResult};
use crate::exporter::{export, ExportFormat, RunMetadata};
use crate::models::{PortalKind, Tender};
use crate::normalize::normalize_items;
use crate::selection::SelectionStore;
use crate::utils::format_duration;
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// What to fetch and how to export it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Date mode name, e.g. `"last_7_days"`
    pub mode: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub feeds: Vec<String>,
    pub all_feeds: bool,
    pub selection: Option<String>,
    pub portals: Vec<PortalKind>,
    pub include_undated: bool,
    pub format: ExportFormat,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            mode: "last_7_days".to_string(),
            start: None,
            end: None,
            feeds: Vec::new(),
            all_feeds: false,
            selection: None,
            portals: Vec::new(),
            include_undated: true,
            format: ExportFormat::Xlsx,
        }
    }
}

impl FetchRequest {
    /// Builds a request from a TOML run file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unknown portal name or export format.
    pub fn from_run_file(file: &RunConfigFile) -> AppResult<Self> {
        let portals = file
            .portals
            .iter()
            .map(|name| name.parse::<PortalKind>())
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self {
            mode: file.mode.clone(),
            start: file.start.clone(),
            end: file.end.clone(),
            feeds: file.feeds.clone(),
            all_feeds: file.all_feeds,
            selection: file.selection.clone(),
            portals,
            include_undated: file.include_undated,
            format: file.resolved.export_format.parse()?,
        })
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub path: PathBuf,
    pub raw_items: usize,
    pub exported: usize,
    pub failed_feeds: usize,
    pub stats: FilterStats,
}

/// Runs the workflow against the live portals selected in `request`.
pub async fn run(request: &FetchRequest, config: &ResolvedConfig) -> AppResult<RunSummary> {
    let portals: Vec<Box<dyn Portal>> = request
        .portals
        .iter()
        .map(|kind| portal_for(*kind, config))
        .collect();
    run_with_portals(request, config, &portals, now_in_singapore()).await
}

/// Runs the workflow with explicit portal clients and clock.
///
/// # Errors
///
/// Returns an error when the date mode or selection cannot be resolved, when
/// there is nothing to fetch, or when the export fails. Individual feed and
/// portal failures are logged and skipped.
pub async fn run_with_portals(
    request: &FetchRequest,
    config: &ResolvedConfig,
    portals: &[Box<dyn Portal>],
    now: DateTime<FixedOffset>,
) -> AppResult<RunSummary> {
    let started = Instant::now();
    let today = now.date_naive();

    let mode = DateMode::resolve(&request.mode, request.start.as_deref(), request.end.as_deref())?;
    let window = mode.window(now);
    let (start_date, end_date) = mode.export_range(now);
    info!(
        mode = %mode,
        start = %start_date,
        end = %end_date,
        "Resolved date mode"
    );

    let catalog = FeedCatalog::load(&config.feeds_catalog)?;
    let store = SelectionStore::new(&config.selections_dir);
    let feeds = resolve_feeds(request, &catalog, &store)?;
    if feeds.is_empty() && portals.is_empty() {
        return Err(AppError::InvalidInput(
            "Nothing to fetch: pass feed URLs, --all-feeds, a selection or a portal".to_string(),
        ));
    }

    let fetcher = PageFetcher::new(config)?;
    let report = fetch_feeds(&fetcher, &feeds, config.concurrent_fetches, today).await?;

    let mut items = report.items;
    items.extend(collect_portals(portals, &fetcher, &window, now).await);
    let raw_items = items.len();

    let tenders = dedupe_tenders(normalize_items(&items, &catalog, today));
    let (mut tenders, stats) = filter_by_date(tenders, &window, request.include_undated);
    for (idx, tender) in tenders.iter_mut().enumerate() {
        tender.no = idx + 1;
    }
    if raw_items > 0 && tenders.is_empty() {
        warn!(raw_items, "Every record was filtered out; check the date mode");
    }

    let metadata = RunMetadata {
        exported_at: now,
        mode: mode.to_string(),
        start_date,
        end_date,
        portals: request.portals.clone(),
        categories: catalog.categorize_selected(&feeds),
        feeds,
        include_undated: request.include_undated,
    };
    let path = export(&tenders, &metadata, request.format, &config.output_dir)?;

    info!(
        raw_items,
        exported = tenders.len(),
        elapsed = format_duration(started.elapsed()),
        "All operations completed successfully"
    );

    Ok(RunSummary {
        path,
        raw_items,
        exported: tenders.len(),
        failed_feeds: report.failed,
        stats,
    })
}

/// Explicit feeds, then the whole catalog, then the named selection, without
/// duplicates.
pub fn resolve_feeds(
    request: &FetchRequest,
    catalog: &FeedCatalog,
    store: &SelectionStore,
) -> AppResult<Vec<String>> {
    let mut feeds: Vec<String> = request.feeds.clone();
    if request.all_feeds {
        if catalog.is_empty() {
            warn!("--all-feeds requested but the feed catalog is empty");
        }
        feeds.extend(catalog.all_urls());
    }
    if let Some(name) = &request.selection {
        let selection = store
            .load(name)?
            .ok_or_else(|| AppError::InvalidInput(format!("Selection '{name}' not found")))?;
        info!(
            selection = name.as_str(),
            feeds = selection.count,
            "Using saved selection"
        );
        feeds.extend(selection.selected_feeds);
    }

    let mut seen = HashSet::new();
    feeds.retain(|url| {
        let url = url.trim();
        !url.is_empty() && seen.insert(url.to_string())
    });
    Ok(feeds)
}

/// Drops repeated records (same link, ITQ/ITT and description); the first one wins.
pub fn dedupe_tenders(tenders: Vec<Tender>) -> Vec<Tender> {
    let before = tenders.len();
    let mut seen = HashSet::new();
    let unique: Vec<Tender> = tenders
        .into_iter()
        .filter(|t| {
            seen.insert((
                t.link.clone(),
                t.tender_number.clone(),
                t.description.clone(),
            ))
        })
        .collect();
    if unique.len() < before {
        info!(duplicates = before - unique.len(), "Removed duplicate records");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn tender(link: &str, number: &str, description: &str) -> Tender {
        let mut t = Tender::new(description, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        t.link = link.to_string();
        t.tender_number = number.to_string();
        t
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut first = tender("https://a", "ITQ1", "Chairs");
        first.calling_entity = "MOE".to_string();
        let tenders = vec![
            first,
            tender("https://a", "ITQ1", "Chairs"),
            tender("https://a", "ITQ2", "Chairs"),
        ];
        let unique = dedupe_tenders(tenders);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].calling_entity, "MOE");
    }

    #[test]
    fn resolve_feeds_merges_sources_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let store = SelectionStore::new(dir.path());
        store
            .save(
                "Weekly",
                crate::selection::SelectionKind::Bo,
                vec!["https://b".to_string(), "https://c".to_string()],
            )
            .unwrap();
        let catalog = FeedCatalog::from_toml_str(
            r#"
            [feeds."Construction"."Building Works"]
            bo = "https://c"
            "#,
        )
        .unwrap();

        let request = FetchRequest {
            feeds: vec!["https://a".to_string(), " ".to_string(), "https://b".to_string()],
            all_feeds: true,
            selection: Some("Weekly".to_string()),
            ..Default::default()
        };
        let feeds = resolve_feeds(&request, &catalog, &store).unwrap();
        assert_eq!(feeds, vec!["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn missing_selection_is_an_error() {
        let dir = TempDir::new().unwrap();
        let request = FetchRequest {
            selection: Some("nope".to_string()),
            ..Default::default()
        };
        let err = resolve_feeds(
            &request,
            &FeedCatalog::default(),
            &SelectionStore::new(dir.path()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Selection 'nope' not found"));
    }

    #[test]
    fn request_from_run_file_parses_portals() {
        let file: RunConfigFile = toml::from_str(
            r#"
            mode = "yesterday"
            portals = ["tb", "jpmc"]
            export_format = "parquet"
            "#,
        )
        .unwrap();
        let request = FetchRequest::from_run_file(&file).unwrap();
        assert_eq!(request.portals, vec![PortalKind::TenderBoard, PortalKind::Jpmc]);
        assert_eq!(request.format, ExportFormat::Parquet);
        assert!(request.include_undated);
    }

    #[tokio::test]
    async fn nothing_to_fetch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = ResolvedConfig {
            feeds_catalog: dir.path().join("feeds.toml"),
            selections_dir: dir.path().join("selections"),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let err = run_with_portals(&FetchRequest::default(), &config, &[], now_in_singapore())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to fetch"));
    }
}
