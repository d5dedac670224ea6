use crate::constants::DEFAULT_MAX_PAGES;
use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved configuration with all values filled in.
///
/// This struct represents the pipeline defaults and can be deserialized by the TOML
/// loader. Every field has a concrete default, so a run file only needs to name what
/// it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolvedConfig {
    /// TOML file describing the GeBIZ feed catalog
    pub feeds_catalog: PathBuf,
    /// Directory holding saved feed selections
    pub selections_dir: PathBuf,
    /// Directory where exports are written
    pub output_dir: PathBuf,

    // Network
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Requests sent per URL before giving up, the first one included
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry
    pub retry_initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries
    pub retry_max_delay_ms: u64,
    /// Number of feeds fetched at the same time
    pub concurrent_fetches: usize,
    /// Listing pages followed per paginated portal
    pub max_pages: usize,

    // Portals
    /// Grid data endpoint for ST Logistics. The portal is skipped when unset.
    pub stlogs_grid_url: Option<String>,
    /// Public SAP Ariba leads endpoint. The portal is skipped when unset.
    pub ariba_leads_url: Option<String>,

    // Export
    /// `"xlsx"` or `"parquet"`
    pub export_format: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            feeds_catalog: PathBuf::from("config/feeds.toml"),
            selections_dir: PathBuf::from("config/selections"),
            output_dir: PathBuf::from("exports"),
            request_timeout_secs: 15,
            max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 10000,
            concurrent_fetches: 4,
            max_pages: DEFAULT_MAX_PAGES,
            stlogs_grid_url: None,
            ariba_leads_url: None,
            export_format: "xlsx".to_string(),
        }
    }
}

/// Run configuration loaded from a TOML file.
///
/// Holds the run parameters (date mode, feeds, portals) and the flattened pipeline
/// defaults. Unknown keys are rejected to catch typos, and `concurrent_fetches` must
/// be positive.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfigFile {
    /// Date mode name such as `"last_7_days"` or `"last_working_day"`
    #[serde(default = "default_mode")]
    pub mode: String,
    /// First day of a custom range (`YYYY-MM-DD`)
    #[serde(default)]
    pub start: Option<String>,
    /// Last day of a custom range (`YYYY-MM-DD`)
    #[serde(default)]
    pub end: Option<String>,
    /// Explicit feed URLs
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Fetch every feed in the catalog
    #[serde(default)]
    pub all_feeds: bool,
    /// Name of a saved feed selection
    #[serde(default)]
    pub selection: Option<String>,
    /// Portals to scrape in addition to the feeds
    #[serde(default)]
    pub portals: Vec<String>,
    /// Keep records that carry no usable date (defaults to `true`)
    #[serde(default = "default_include_undated")]
    pub include_undated: bool,
    /// Flattened resolved configuration with pipeline defaults
    #[serde(flatten)]
    pub resolved: ResolvedConfig,
}

impl RunConfigFile {
    /// Loads and validates a run configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the TOML is malformed, unknown keys are present,
    /// `concurrent_fetches` or `max_pages` is zero or the export format is not recognized.
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RunConfigFile = toml::from_str(&contents)
            .map_err(|e| AppError::InvalidInput(format!("Failed to parse config: {e}")))?;

        config.resolved.validate()?;
        Ok(config)
    }
}

impl ResolvedConfig {
    /// Checks values that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.concurrent_fetches == 0 {
            return Err(AppError::InvalidInput(
                "Concurrent fetches must be greater than 0".into(),
            ));
        }
        if self.max_pages == 0 {
            return Err(AppError::InvalidInput(
                "Max pages must be greater than 0".into(),
            ));
        }
        if !matches!(self.export_format.as_str(), "xlsx" | "parquet") {
            return Err(AppError::InvalidInput(format!(
                "Unsupported export format '{}'. Expected 'xlsx' or 'parquet'",
                self.export_format
            )));
        }
        Ok(())
    }
}

fn default_mode() -> String {
    "last_7_days".to_string()
}

fn default_include_undated() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_values() {
        let config = ResolvedConfig::default();
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.concurrent_fetches, 4);
        assert_eq!(config.export_format, "xlsx");
        assert!(config.stlogs_grid_url.is_none());
        assert_eq!(config.max_pages, 10);
        assert!(config.ariba_leads_url.is_none());
    }

    #[test]
    fn minimal_toml_is_parsed_and_defaults_apply() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
            mode = "yesterday"
            portals = ["sesami", "tb"]
            "#,
        )
        .unwrap();

        let config = RunConfigFile::from_toml_file(tmp.path()).unwrap();
        assert_eq!(config.mode, "yesterday");
        assert_eq!(config.portals, vec!["sesami", "tb"]);
        assert!(config.include_undated);
        assert!(!config.all_feeds);
        assert_eq!(config.resolved.max_retries, 3);
        assert_eq!(config.resolved.output_dir, PathBuf::from("exports"));
    }

    #[test]
    fn empty_toml_uses_default_mode() {
        let tmp = NamedTempFile::new().unwrap();
        let config = RunConfigFile::from_toml_file(tmp.path()).unwrap();
        assert_eq!(config.mode, "last_7_days");
    }

    #[test]
    fn unknown_key_errors() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
            mode = "all"
            extra_flag = true
            "#,
        )
        .unwrap();

        assert!(RunConfigFile::from_toml_file(tmp.path()).is_err());
    }

    #[test]
    fn zero_concurrency_errors() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "concurrent_fetches = 0").unwrap();

        let err = RunConfigFile::from_toml_file(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Concurrent fetches"));
    }

    #[test]
    fn unknown_export_format_errors() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "export_format = \"csv\"").unwrap();

        assert!(RunConfigFile::from_toml_file(tmp.path()).is_err());
    }
}
