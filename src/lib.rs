//! tender-comb library
//!
//! Collects procurement opportunities and awards from GeBIZ RSS feeds and a
//! handful of scraped portals, normalizes them into one record shape, filters
//! them by date and exports a workbook.
//!
//! ## Overview
//!
//! - [`collector`] - RSS fetching and parsing, the shared page fetcher and the portal clients
//! - [`normalize`] - Field extraction heuristics and per-source header mapping
//! - [`dates`] - Date parsing in Singapore time, date modes and the date filter
//! - [`exporter`] - XLSX workbook and Parquet writers
//! - [`pipeline`] - The fetch, normalize, dedupe, filter and export workflow
//! - [`catalog`] and [`selection`] - The feed catalog and saved feed selections
//! - [`cli`] - Command-line interface
//! - [`models`] and [`errors`] - Shared data structures and error types
//!
//! ## Example Usage
//!
//! ```no_run
//! use tender_comb::config::ResolvedConfig;
//! use tender_comb::errors::AppResult;
//! use tender_comb::models::PortalKind;
//! use tender_comb::pipeline::{self, FetchRequest};
//!
//! # async fn example() -> AppResult<()> {
//! let request = FetchRequest {
//!     mode: "last_working_day".to_string(),
//!     all_feeds: true,
//!     portals: vec![PortalKind::Sesami, PortalKind::TenderBoard],
//!     ..Default::default()
//! };
//! let summary = pipeline::run(&request, &ResolvedConfig::default()).await?;
//! println!("{} records written to {}", summary.exported, summary.path.display());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod constants;
pub mod dates;
pub mod errors;
pub mod exporter;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod selection;
pub mod ui;
pub mod utils;
