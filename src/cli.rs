use crate::catalog::FeedCatalog;
use crate::config::{ResolvedConfig, RunConfigFile};
use crate::errors::{AppError, AppResult};
use crate::exporter::ExportFormat;
use crate::models::{FeedKind, PortalKind};
use crate::pipeline::{self, FetchRequest};
use crate::selection::{SelectionKind, SelectionStore};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;

// CLI metadata constants
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
const APP_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

const DATE_MODES_HELP: &str = "today, last_24_hours, yesterday, last_3_days, last_7_days, last_14_days, last_31_days, last_90_days, last_365_days, this_week, last_working_day, specific_date, custom, all";

/// Builds the command tree.
pub fn build_command() -> Command {
    Command::new("tender-comb")
        .version(APP_VERSION)
        .author(APP_AUTHOR)
        .about(APP_ABOUT)
        .subcommand(
            Command::new("fetch")
                .about("Fetch feeds and portals, filter by date and export")
                .after_help("Example:\n  tender-comb fetch -m last_working_day --all-feeds -p sesami -p tb")
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .help(format!("Date mode: {DATE_MODES_HELP}"))
                        .default_value("last_7_days")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("start")
                        .short('s')
                        .long("start")
                        .help("First day of a specific or custom range (YYYY-MM-DD)")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("end")
                        .short('e')
                        .long("end")
                        .help("Last day of a custom range (YYYY-MM-DD)")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("feed")
                        .short('f')
                        .long("feed")
                        .help("GeBIZ feed URL (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("all_feeds")
                        .long("all-feeds")
                        .help("Fetch every feed in the catalog")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("selection")
                        .long("selection")
                        .help("Name of a saved feed selection")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("portal")
                        .short('p')
                        .long("portal")
                        .help("Portal to scrape: sesami, tenderboard (tb), jpmc, stlogs, ariba, gebiz-listing (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Directory for the export")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .help("Export format: xlsx or parquet")
                        .default_value("xlsx")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .help("Feed catalog TOML file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("exclude_undated")
                        .long("exclude-undated")
                        .help("Drop records that carry no usable date")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("toml")
                .about("Run using a TOML configuration file")
                .arg(
                    Arg::new("config")
                        .help("Path to the TOML config file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("feeds")
                .about("List the feeds in the catalog")
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .help("Feed catalog TOML file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("selections")
                .about("Manage saved feed selections")
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .help("Directory holding the selections")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List saved selections"))
                .subcommand(
                    Command::new("show")
                        .about("Print the feeds of a selection")
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(
                    Command::new("save")
                        .about("Save a selection")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("type")
                                .short('t')
                                .long("type")
                                .help("Feed type: bo, awd or both")
                                .default_value("both")
                                .action(ArgAction::Set),
                        )
                        .arg(
                            Arg::new("feed")
                                .short('f')
                                .long("feed")
                                .help("Feed URL (repeatable)")
                                .action(ArgAction::Append),
                        )
                        .arg(
                            Arg::new("all")
                                .long("all")
                                .help("Add every catalog feed of the chosen type")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a selection")
                        .arg(Arg::new("name").required(true)),
                ),
        )
}

/// Parses command-line arguments and runs the chosen subcommand.
///
/// - `fetch`: collect with the options given on the command line
/// - `toml`: collect with the options of a TOML run file
/// - `feeds`: list the feed catalog
/// - `selections`: list, show, save or delete selection presets
///
/// # Errors
///
/// Returns an error if the options are invalid or the workflow fails.
pub async fn cli() -> AppResult<()> {
    let cmd = build_command();
    let mut cmd_for_help = cmd.clone();
    let matches = cmd.get_matches();

    match matches.subcommand() {
        Some(("fetch", sub)) => {
            let (request, config) = fetch_options(sub)?;
            run_workflow(&request, &config).await?;
        }
        Some(("toml", sub)) => {
            let config_path = sub
                .get_one::<PathBuf>("config")
                .ok_or_else(|| AppError::InvalidInput("config path is required".into()))?;
            let file_config = RunConfigFile::from_toml_file(config_path)?;
            let request = FetchRequest::from_run_file(&file_config)?;
            run_workflow(&request, &file_config.resolved).await?;
        }
        Some(("feeds", sub)) => {
            let mut config = ResolvedConfig::default();
            if let Some(path) = sub.get_one::<PathBuf>("catalog") {
                config.feeds_catalog = path.clone();
            }
            list_feeds(&config)?;
        }
        Some(("selections", sub)) => {
            let mut config = ResolvedConfig::default();
            if let Some(dir) = sub.get_one::<PathBuf>("dir") {
                config.selections_dir = dir.clone();
            }
            manage_selections(sub, &config)?;
        }
        _ => {
            cmd_for_help
                .print_help()
                .map_err(|e| AppError::IoError(format!("Failed to print help: {e}")))?;
        }
    }

    Ok(())
}

/// Reads the `fetch` options into a request and the pipeline configuration.
pub fn fetch_options(sub: &ArgMatches) -> AppResult<(FetchRequest, ResolvedConfig)> {
    let mut config = ResolvedConfig::default();
    if let Some(dir) = sub.get_one::<PathBuf>("output") {
        config.output_dir = dir.clone();
    }
    if let Some(path) = sub.get_one::<PathBuf>("catalog") {
        config.feeds_catalog = path.clone();
    }

    let format: ExportFormat = sub
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("xlsx")
        .parse()?;
    config.export_format = format.extension().to_string();

    let portals = strings(sub, "portal")
        .iter()
        .map(|name| name.parse::<PortalKind>())
        .collect::<AppResult<Vec<_>>>()?;

    let request = FetchRequest {
        mode: sub
            .get_one::<String>("mode")
            .cloned()
            .unwrap_or_else(|| "last_7_days".to_string()),
        start: sub.get_one::<String>("start").cloned(),
        end: sub.get_one::<String>("end").cloned(),
        feeds: strings(sub, "feed"),
        all_feeds: sub.get_flag("all_feeds"),
        selection: sub.get_one::<String>("selection").cloned(),
        portals,
        include_undated: !sub.get_flag("exclude_undated"),
        format,
    };
    Ok((request, config))
}

fn strings(sub: &ArgMatches, id: &str) -> Vec<String> {
    sub.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

async fn run_workflow(request: &FetchRequest, config: &ResolvedConfig) -> AppResult<()> {
    print_fetch_info(request);
    let summary = pipeline::run(request, config).await?;
    println!(
        "Exported {} of {} records to {}",
        summary.exported,
        summary.raw_items,
        summary.path.display()
    );
    if summary.failed_feeds > 0 {
        println!("{} feed(s) failed; see the log for details", summary.failed_feeds);
    }
    Ok(())
}

fn print_fetch_info(request: &FetchRequest) {
    let portals: Vec<&str> = request.portals.iter().map(|p| p.display_name()).collect();
    info!(
        mode = request.mode.as_str(),
        start = request.start.as_deref().unwrap_or("-"),
        end = request.end.as_deref().unwrap_or("-"),
        feeds = request.feeds.len(),
        all_feeds = request.all_feeds,
        selection = request.selection.as_deref().unwrap_or("-"),
        portals = ?portals,
        "Starting fetch"
    );
}

fn list_feeds(config: &ResolvedConfig) -> AppResult<()> {
    let catalog = FeedCatalog::load(&config.feeds_catalog)?;
    if catalog.is_empty() {
        println!("No feeds in {}", config.feeds_catalog.display());
        return Ok(());
    }
    for entry in catalog.entries() {
        println!(
            "{:<3} {} > {}\n    {}",
            entry.kind.key(),
            entry.main,
            entry.sub,
            entry.url
        );
    }
    Ok(())
}

fn manage_selections(sub: &ArgMatches, config: &ResolvedConfig) -> AppResult<()> {
    let store = SelectionStore::new(&config.selections_dir);
    match sub.subcommand() {
        Some(("list", _)) => {
            let summaries = store.list()?;
            if summaries.is_empty() {
                println!("No saved selections");
            }
            for s in summaries {
                println!("{:<30} {:<5} {:>4} feeds  {}", s.name, s.feed_type, s.count, s.created);
            }
        }
        Some(("show", args)) => {
            let name = required(args, "name")?;
            let selection = store
                .load(name)?
                .ok_or_else(|| AppError::InvalidInput(format!("Selection '{name}' not found")))?;
            for url in &selection.selected_feeds {
                println!("{url}");
            }
        }
        Some(("save", args)) => {
            let name = required(args, "name")?;
            let kind: SelectionKind = required(args, "type")?.parse()?;
            let mut feeds = strings(args, "feed");
            if args.get_flag("all") {
                let catalog = FeedCatalog::load(&config.feeds_catalog)?;
                feeds.extend(
                    catalog
                        .entries()
                        .filter(|entry| kind_matches(kind, entry.kind))
                        .map(|entry| entry.url),
                );
            }
            if feeds.is_empty() {
                return Err(AppError::InvalidInput(
                    "A selection needs at least one feed (--feed or --all)".into(),
                ));
            }
            let saved = store.save(name, kind, feeds)?;
            println!("Saved '{}' with {} feeds", saved.name, saved.count);
        }
        Some(("delete", args)) => {
            let name = required(args, "name")?;
            store.delete(name)?;
            println!("Deleted '{name}'");
        }
        _ => {}
    }
    Ok(())
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> AppResult<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| AppError::InvalidInput(format!("{id} is required")))
}

fn kind_matches(selection: SelectionKind, feed: FeedKind) -> bool {
    match selection {
        SelectionKind::Both => true,
        SelectionKind::Bo => feed == FeedKind::BusinessOpportunity,
        SelectionKind::Awd => feed == FeedKind::Award,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["tender-comb", "fetch"];
        argv.extend_from_slice(args);
        build_command()
            .try_get_matches_from(argv)
            .unwrap()
            .subcommand_matches("fetch")
            .unwrap()
            .clone()
    }

    #[test]
    fn fetch_defaults() {
        let (request, config) = fetch_options(&fetch_matches(&[])).unwrap();
        assert_eq!(request.mode, "last_7_days");
        assert!(request.include_undated);
        assert!(request.portals.is_empty());
        assert_eq!(request.format, ExportFormat::Xlsx);
        assert_eq!(config.output_dir, PathBuf::from("exports"));
    }

    #[test]
    fn fetch_collects_repeated_options() {
        let sub = fetch_matches(&[
            "-m",
            "custom",
            "-s",
            "2026-01-01",
            "-f",
            "https://a",
            "-f",
            "https://b",
            "-p",
            "tb",
            "-p",
            "jpmc",
            "--format",
            "parquet",
            "--exclude-undated",
            "-o",
            "out",
        ]);
        let (request, config) = fetch_options(&sub).unwrap();
        assert_eq!(request.start.as_deref(), Some("2026-01-01"));
        assert_eq!(request.feeds, vec!["https://a", "https://b"]);
        assert_eq!(request.portals, vec![PortalKind::TenderBoard, PortalKind::Jpmc]);
        assert_eq!(request.format, ExportFormat::Parquet);
        assert!(!request.include_undated);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.export_format, "parquet");
    }

    #[test]
    fn fetch_rejects_unknown_portal() {
        let sub = fetch_matches(&["-p", "bidzone"]);
        assert!(fetch_options(&sub).is_err());
    }

    #[test]
    fn toml_command_requires_path() {
        let err = build_command().try_get_matches_from(vec!["tender-comb", "toml"]);
        assert!(err.is_err());
    }

    #[test]
    fn selections_requires_a_subcommand() {
        assert!(build_command()
            .try_get_matches_from(vec!["tender-comb", "selections"])
            .is_err());
        assert!(build_command()
            .try_get_matches_from(vec!["tender-comb", "selections", "save", "Weekly", "-t", "bo"])
            .is_ok());
    }

    #[test]
    fn kind_filter_for_saved_selections() {
        assert!(kind_matches(SelectionKind::Both, FeedKind::Award));
        assert!(kind_matches(SelectionKind::Bo, FeedKind::BusinessOpportunity));
        assert!(!kind_matches(SelectionKind::Awd, FeedKind::BusinessOpportunity));
    }
}
