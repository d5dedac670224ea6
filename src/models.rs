use crate::constants::*;
use crate::errors::{AppError, AppResult};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Where a raw item was collected from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Source {
    /// A GeBIZ RSS/Atom category feed.
    #[default]
    GebizRss,
    /// The GeBIZ opportunity listing page.
    GebizListing,
    Sesami,
    TenderBoard,
    JpmcBrunei,
    /// ST Logistics eProcurement; the business unit is part of the label.
    StLogistics { business_unit: String },
    /// SAP Ariba Discovery public leads.
    Ariba,
}

impl Source {
    /// Returns a human-readable name for the source.
    pub fn display_name(&self) -> String {
        match self {
            Self::GebizRss => "GeBIZ RSS".to_string(),
            Self::GebizListing => "GeBIZ Listing".to_string(),
            Self::Sesami => "Sesami".to_string(),
            Self::TenderBoard => "TenderBoard".to_string(),
            Self::JpmcBrunei => "JPMC Brunei".to_string(),
            Self::StLogistics { business_unit } if !business_unit.is_empty() => {
                format!("ST Logistics ({business_unit})")
            }
            Self::StLogistics { .. } => "ST Logistics".to_string(),
            Self::Ariba => "SAP Ariba".to_string(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Type of GeBIZ feed: business opportunities or awards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedKind {
    BusinessOpportunity,
    Award,
}

impl FeedKind {
    /// Classifies a feed URL by the GeBIZ naming convention.
    pub fn from_url(url: &str) -> Self {
        if url.contains("_AWD_FEED") || url.contains("-CREATE_AWD_FEED") {
            Self::Award
        } else {
            Self::BusinessOpportunity
        }
    }

    /// Short key used in the catalog and in selection presets.
    pub fn key(&self) -> &'static str {
        match self {
            Self::BusinessOpportunity => "bo",
            Self::Award => "awd",
        }
    }
}

/// Portals that are scraped rather than read through RSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortalKind {
    GebizListing,
    Sesami,
    TenderBoard,
    Jpmc,
    StLogistics,
    Ariba,
}

impl PortalKind {
    pub const ALL: [PortalKind; 6] = [
        Self::GebizListing,
        Self::Sesami,
        Self::TenderBoard,
        Self::Jpmc,
        Self::StLogistics,
        Self::Ariba,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GebizListing => "GeBIZ Listing",
            Self::Sesami => "Sesami",
            Self::TenderBoard => "TenderBoard",
            Self::Jpmc => "JPMC Brunei",
            Self::StLogistics => "ST Logistics",
            Self::Ariba => "SAP Ariba",
        }
    }
}

impl FromStr for PortalKind {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        // Trim whitespace and compare case-insensitively
        let lower = value.trim().to_lowercase();
        let lower = lower.as_str();

        if GEBIZ_LISTING_ALIASES.contains(&lower) {
            Ok(Self::GebizListing)
        } else if SESAMI_ALIASES.contains(&lower) {
            Ok(Self::Sesami)
        } else if TENDERBOARD_ALIASES.contains(&lower) {
            Ok(Self::TenderBoard)
        } else if JPMC_ALIASES.contains(&lower) {
            Ok(Self::Jpmc)
        } else if STLOGS_ALIASES.contains(&lower) {
            Ok(Self::StLogistics)
        } else if ARIBA_ALIASES.contains(&lower) {
            Ok(Self::Ariba)
        } else {
            Err(AppError::InvalidInput(format!(
                "Unknown portal '{value}'. Expected one of: sesami, tenderboard, jpmc, stlogs, ariba, gebiz-listing"
            )))
        }
    }
}

/// A loosely-typed record as produced by a collector, before normalization.
///
/// Empty strings mean "not provided"; each portal fills in what its markup offers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub source: Source,
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Publish date as found on the page or feed.
    pub published: String,
    /// Closing date, possibly with a time component.
    pub closing_date: String,
    pub closing_time: String,
    /// Reference, document or quotation number.
    pub ref_no: String,
    pub calling_entity: String,
    pub category: String,
    pub industry: String,
    /// The feed the item came from (RSS) or a pseudo URL for listing pages.
    pub feed_url: String,
    pub awarded_to: String,
    pub award_value: String,
    pub awarded_date: String,
    /// Sourcing document number (SAP Ariba `Doc...`).
    pub sourcing_doc_no: String,
    pub opportunity_amount: String,
    pub is_award: bool,
}

impl RawItem {
    pub fn new(source: Source, title: impl Into<String>) -> Self {
        Self {
            source,
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A normalized opportunity or award, one row of the exported workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct Tender {
    pub no: usize,
    pub published_date: Option<NaiveDate>,
    pub awarded_date: Option<NaiveDate>,
    pub award_value: String,
    pub awarded_to: String,
    pub closing_date: Option<NaiveDate>,
    /// `HH:MM`, or the raw text when the time could not be read.
    pub closing_time: String,
    pub date_detected: NaiveDate,
    /// ITQ/ITT or portal reference number.
    pub tender_number: String,
    pub calling_entity: String,
    pub description: String,
    pub link: String,
    pub main_header: String,
    pub sub_header: String,
    pub sourcing_doc_no: String,
    pub opportunity_amount: String,
    pub is_award: bool,
}

impl Tender {
    /// Creates an empty record detected on `date_detected`.
    pub fn new(description: impl Into<String>, date_detected: NaiveDate) -> Self {
        Self {
            no: 0,
            published_date: None,
            awarded_date: None,
            award_value: String::new(),
            awarded_to: String::new(),
            closing_date: None,
            closing_time: String::new(),
            date_detected,
            tender_number: String::new(),
            calling_entity: String::new(),
            description: description.into(),
            link: String::new(),
            main_header: String::new(),
            sub_header: String::new(),
            sourcing_doc_no: String::new(),
            opportunity_amount: String::new(),
            is_award: false,
        }
    }
}
