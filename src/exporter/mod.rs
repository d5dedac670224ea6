//! Export of normalized records to an XLSX workbook or a Parquet file.

pub mod parquet;
pub mod xlsx;

pub use parquet::{tenders_to_dataframe, write_parquet};
pub use xlsx::build_workbook;

use crate::catalog::CategorizedSelection;
use crate::constants::EXPORT_SUFFIX;
use crate::errors::{AppError, AppResult};
use crate::models::{PortalKind, Tender};
use crate::utils::{format_duration, kb_from_bytes, round_two_decimals};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "parquet" => Ok(Self::Parquet),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported export format '{other}'. Expected 'xlsx' or 'parquet'"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Details of a run, written to the workbook's Settings sheet.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub exported_at: DateTime<FixedOffset>,
    /// Display form of the date mode
    pub mode: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub portals: Vec<PortalKind>,
    pub feeds: Vec<String>,
    pub categories: CategorizedSelection,
    pub include_undated: bool,
}

impl RunMetadata {
    /// `(Setting, Value)` rows in display order.
    pub fn settings(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            (
                "Export Date".to_string(),
                self.exported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("Date Mode".to_string(), self.mode.clone()),
            ("Start Date".to_string(), self.start_date.to_string()),
            ("End Date".to_string(), self.end_date.to_string()),
        ];
        for kind in PortalKind::ALL {
            rows.push((
                format!("Use {}", kind.display_name()),
                self.portals.contains(&kind).to_string(),
            ));
        }
        rows.push((
            "Include Undated".to_string(),
            self.include_undated.to_string(),
        ));
        rows.push((
            "Selected Feeds Count".to_string(),
            self.feeds.len().to_string(),
        ));
        rows.push(("Selected Feeds".to_string(), feed_file_names(&self.feeds)));
        rows.push((
            "BO Categories".to_string(),
            join_or_none(self.categories.bo.iter()),
        ));
        rows.push((
            "AWD Categories".to_string(),
            join_or_none(self.categories.awd.iter()),
        ));
        rows
    }
}

/// Last path segment of each feed URL, one per line.
fn feed_file_names(feeds: &[String]) -> String {
    join_or_none(
        feeds
            .iter()
            .map(|url| url.rsplit('/').next().unwrap_or(url.as_str())),
    )
}

fn join_or_none<S: AsRef<str>>(values: impl Iterator<Item = S>) -> String {
    let joined = values
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() {
        "None".to_string()
    } else {
        joined
    }
}

/// `"YYMMDD-YYMMDD Tender Export.<ext>"`.
pub fn export_filename(start: NaiveDate, end: NaiveDate, extension: &str) -> String {
    format!(
        "{}-{} {EXPORT_SUFFIX}.{extension}",
        start.format("%y%m%d"),
        end.format("%y%m%d")
    )
}

/// Writes `tenders` to `output_dir` and returns the path of the new file.
///
/// The file is written next to its destination and renamed into place, so an
/// interrupted export never leaves a truncated workbook behind.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, the workbook or
/// DataFrame cannot be built, or the file cannot be persisted.
pub fn export(
    tenders: &[Tender],
    metadata: &RunMetadata,
    format: ExportFormat,
    output_dir: &Path,
) -> AppResult<PathBuf> {
    let start = Instant::now();
    fs::create_dir_all(output_dir).map_err(|e| {
        AppError::IoError(format!(
            "Failed to create output directory {}: {e}",
            output_dir.display()
        ))
    })?;

    let bytes = match format {
        ExportFormat::Xlsx => build_workbook(tenders, metadata)?,
        ExportFormat::Parquet => write_parquet(tenders)?,
    };

    let file_name = export_filename(metadata.start_date, metadata.end_date, format.extension());
    let path = output_dir.join(file_name);
    persist_bytes(output_dir, &path, &bytes)?;

    let awards = tenders.iter().filter(|t| t.is_award).count();
    info!(
        path = %path.display(),
        format = %format,
        opportunities = tenders.len() - awards,
        awards,
        size_kb = round_two_decimals(kb_from_bytes(bytes.len() as u64)),
        elapsed = format_duration(start.elapsed()),
        "Export written"
    );
    Ok(path)
}

fn persist_bytes(dir: &Path, path: &Path, bytes: &[u8]) -> AppResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| {
        AppError::IoError(format!("Failed to persist {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::singapore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn metadata() -> RunMetadata {
        let mut categories = CategorizedSelection::default();
        categories.bo.insert("Construction > Building Works".to_string());
        RunMetadata {
            exported_at: singapore().with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap(),
            mode: "last_7_days".to_string(),
            start_date: day(2026, 1, 8),
            end_date: day(2026, 1, 15),
            portals: vec![PortalKind::Sesami],
            feeds: vec!["https://www.gebiz.gov.sg/rss/Building_Works-CREATE_BO_FEED.xml".to_string()],
            categories,
            include_undated: true,
        }
    }

    #[test]
    fn export_filename_uses_short_dates() {
        assert_eq!(
            export_filename(day(2026, 1, 8), day(2026, 1, 15), "xlsx"),
            "260108-260115 Tender Export.xlsx"
        );
    }

    #[test]
    fn export_format_parses_names() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!(
            " parquet ".parse::<ExportFormat>().unwrap(),
            ExportFormat::Parquet
        );
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn settings_rows_describe_the_run() {
        let rows = metadata().settings();
        let value = |key: &str| {
            rows.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("Export Date"), "2026-01-15 09:30:00");
        assert_eq!(value("Start Date"), "2026-01-08");
        assert_eq!(value("Use Sesami"), "true");
        assert_eq!(value("Use TenderBoard"), "false");
        assert_eq!(value("Use SAP Ariba"), "false");
        assert_eq!(value("Selected Feeds Count"), "1");
        assert_eq!(value("Selected Feeds"), "Building_Works-CREATE_BO_FEED.xml");
        assert_eq!(value("BO Categories"), "Construction > Building Works");
        assert_eq!(value("AWD Categories"), "None");
    }

    #[test]
    fn export_writes_file_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("exports");
        let tenders = vec![Tender::new("Supply of chairs", day(2026, 1, 15))];

        let path = export(&tenders, &metadata(), ExportFormat::Xlsx, &out).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "260108-260115 Tender Export.xlsx"
        );
        assert!(fs::metadata(&path).unwrap().len() > 0);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn export_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let tenders = vec![Tender::new("Supply of chairs", day(2026, 1, 15))];
        let first = export(&tenders, &metadata(), ExportFormat::Parquet, dir.path()).unwrap();
        let second = export(&tenders, &metadata(), ExportFormat::Parquet, dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
