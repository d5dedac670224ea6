//! GeBIZ feed catalog.
//!
//! The catalog is a TOML file mapping a main category and a sub category to the
//! business-opportunity (`bo`) and award (`awd`) feed URLs:
//!
//! ```toml
//! [feeds."9. Dental, Medical & Pharmaceutical"."a. Others"]
//! bo = "https://www.gebiz.gov.sg/rss/Others-CREATE_BO_FEED.xml"
//! awd = "https://www.gebiz.gov.sg/rss/Others-CREATE_AWD_FEED.xml"
//! ```

use crate::constants::LISTING_FEED_URL;
use crate::errors::{AppError, AppResult};
use crate::models::FeedKind;
use crate::utils::cached_regex;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

static FEED_FILE_NAME: OnceLock<Regex> = OnceLock::new();
static ENUMERATION_PREFIX: OnceLock<Regex> = OnceLock::new();

const FEED_FILE_NAME_PATTERN: &str = r"/([^/]+)-CREATE_(?:BO|AWD)_FEED\.xml";
const ENUMERATION_PREFIX_PATTERN: &str = r"^[0-9A-Za-z]{1,3}\.\s+";

/// Feed URLs configured for one sub category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedPair {
    pub bo: Option<String>,
    pub awd: Option<String>,
}

impl FeedPair {
    fn urls(&self) -> impl Iterator<Item = (FeedKind, &str)> {
        self.bo
            .as_deref()
            .map(|url| (FeedKind::BusinessOpportunity, url))
            .into_iter()
            .chain(self.awd.as_deref().map(|url| (FeedKind::Award, url)))
    }
}

/// One catalog row, as listed by the `feeds` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub main: String,
    pub sub: String,
    pub kind: FeedKind,
    pub url: String,
}

/// Selected feeds grouped by kind as "Main > Sub" category names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedSelection {
    pub bo: BTreeSet<String>,
    pub awd: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    feeds: BTreeMap<String, BTreeMap<String, FeedPair>>,
}

/// The loaded feed catalog.
#[derive(Debug, Clone, Default)]
pub struct FeedCatalog {
    feeds: BTreeMap<String, BTreeMap<String, FeedPair>>,
    by_url: BTreeMap<String, (String, String)>,
}

impl FeedCatalog {
    /// Loads the catalog from `path`.
    ///
    /// A missing file yields an empty catalog and a warning, so runs that only use
    /// explicit feed URLs or portals still work.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the file exists but is not a valid catalog.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Feed catalog not found, continuing with an empty catalog");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&contents).map_err(|e| {
            AppError::InvalidInput(format!("Failed to read feed catalog {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), feeds = catalog.by_url.len(), "Loaded feed catalog");
        Ok(catalog)
    }

    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        let mut by_url = BTreeMap::new();
        for (main, subs) in &file.feeds {
            for (sub, pair) in subs {
                for (_, url) in pair.urls() {
                    by_url.insert(url.to_string(), (main.clone(), sub.clone()));
                }
            }
        }
        Ok(Self {
            feeds: file.feeds,
            by_url,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Every configured feed URL.
    pub fn all_urls(&self) -> Vec<String> {
        self.entries().map(|entry| entry.url).collect()
    }

    /// Catalog rows in category order.
    pub fn entries(&self) -> impl Iterator<Item = CatalogEntry> + '_ {
        self.feeds.iter().flat_map(|(main, subs)| {
            subs.iter().flat_map(move |(sub, pair)| {
                pair.urls().map(move |(kind, url)| CatalogEntry {
                    main: main.clone(),
                    sub: sub.clone(),
                    kind,
                    url: url.to_string(),
                })
            })
        })
    }

    /// Main and sub category for a feed URL.
    ///
    /// URLs missing from the catalog fall back to the feed file name, which
    /// gives a sub category but no main category.
    pub fn category_for_url(&self, url: &str) -> (String, String) {
        if url.is_empty() || url == LISTING_FEED_URL {
            return (String::new(), String::new());
        }
        if let Some((main, sub)) = self.by_url.get(url) {
            return (main.clone(), sub.clone());
        }

        let re = cached_regex(&FEED_FILE_NAME, FEED_FILE_NAME_PATTERN);
        match re.captures(url).and_then(|c| c.get(1)) {
            Some(name) => {
                let sub = name.as_str().replace('_', " ").replace(',', ", ");
                (String::new(), sub)
            }
            None => (String::new(), String::new()),
        }
    }

    /// Groups selected URLs into BO and AWD category names ("Main > Sub").
    ///
    /// A selected URL matches a configured one when they are equal or when either
    /// contains the other, so bare feed file names are accepted.
    pub fn categorize_selected(&self, selected: &[String]) -> CategorizedSelection {
        let mut result = CategorizedSelection::default();
        for (main, subs) in &self.feeds {
            for (sub, pair) in subs {
                let name = format!(
                    "{} > {}",
                    strip_enumeration(main),
                    strip_enumeration(sub)
                );
                for (kind, cfg_url) in pair.urls() {
                    let matched = selected.iter().any(|s| {
                        !s.is_empty() && (s == cfg_url || cfg_url.contains(s.as_str()) || s.contains(cfg_url))
                    });
                    if matched {
                        match kind {
                            FeedKind::BusinessOpportunity => result.bo.insert(name.clone()),
                            FeedKind::Award => result.awd.insert(name.clone()),
                        };
                    }
                }
            }
        }
        result
    }
}

/// Drops list numbering such as `"9. "` or `"a. "` from a category name.
pub fn strip_enumeration(name: &str) -> &str {
    let re = cached_regex(&ENUMERATION_PREFIX, ENUMERATION_PREFIX_PATTERN);
    match re.find(name) {
        Some(m) => &name[m.end()..],
        None => name,
    }
}
