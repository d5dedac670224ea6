//! Named feed-selection presets.
//!
//! Each preset is a pretty-printed JSON file in the selections directory, named
//! after the sanitized preset name.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Which feeds a preset was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Bo,
    Awd,
    Both,
}

impl FromStr for SelectionKind {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "bo" => Ok(Self::Bo),
            "awd" => Ok(Self::Awd),
            "both" => Ok(Self::Both),
            other => Err(AppError::InvalidInput(format!(
                "Unknown feed type '{other}'. Expected 'bo', 'awd' or 'both'"
            ))),
        }
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bo => "bo",
            Self::Awd => "awd",
            Self::Both => "both",
        })
    }
}

/// A saved selection of feed URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    pub feed_type: SelectionKind,
    pub selected_feeds: Vec<String>,
    /// ISO-8601 creation timestamp
    pub created: String,
    pub count: usize,
}

/// Summary shown by `selections list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub name: String,
    pub feed_type: SelectionKind,
    pub count: usize,
    pub created: String,
}

/// Reduces a preset name to alphanumerics, spaces, `-` and `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reads and writes presets under one directory.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    dir: PathBuf,
}

impl SelectionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> AppResult<PathBuf> {
        let safe = sanitize_name(name);
        if safe.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Invalid selection name '{name}'"
            )));
        }
        Ok(self.dir.join(format!("{safe}.json")))
    }

    /// Saves a preset, replacing any preset with the same sanitized name.
    pub fn save(
        &self,
        name: &str,
        feed_type: SelectionKind,
        selected_feeds: Vec<String>,
    ) -> AppResult<Selection> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;

        let selection = Selection {
            name: name.to_string(),
            feed_type,
            count: selected_feeds.len(),
            selected_feeds,
            created: chrono::Local::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&selection)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&path).map_err(|e| {
            AppError::IoError(format!("Failed to write {}: {}", path.display(), e.error))
        })?;

        info!(name = name, feeds = selection.count, "Saved selection");
        Ok(selection)
    }

    /// Loads a preset by name; `None` when it does not exist.
    pub fn load(&self, name: &str) -> AppResult<Option<Selection>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        read_selection(&path).map(Some)
    }

    /// Lists every readable preset, sorted by name. Unreadable files are skipped.
    pub fn list(&self) -> AppResult<Vec<SelectionSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries: Vec<SelectionSummary> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
            })
            .filter_map(|entry| match read_selection(entry.path()) {
                Ok(selection) => Some(SelectionSummary {
                    name: selection.name,
                    feed_type: selection.feed_type,
                    count: selection.count,
                    created: selection.created,
                }),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping unreadable selection");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Deletes a preset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the preset does not exist.
    pub fn delete(&self, name: &str) -> AppResult<()> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(AppError::InvalidInput(format!(
                "Selection '{name}' not found"
            )));
        }
        fs::remove_file(&path)?;
        info!(name = name, "Deleted selection");
        Ok(())
    }
}

fn read_selection(path: &Path) -> AppResult<Selection> {
    let contents = fs::read_to_string(path)?;
    let selection = serde_json::from_str(&contents)?;
    Ok(selection)
}
