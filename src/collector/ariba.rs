use super::{first_non_empty, lenient_text, PageFetcher, Portal};
use crate::constants::ARIBA_DISCOVERY_URL;
use crate::dates::DateWindow;
use crate::errors::{AppError, AppResult};
use crate::models::{PortalKind, RawItem, Source};
use crate::utils::{cached_regex, collapse_whitespace, first_capture};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info};

const RESPOND_BY_PATTERN: &str = r"Respond By\s+(\d{1,2}\s+[A-Za-z]{3}\s+\d{4}(?:\s+\d{1,2}:\d{2}(?:\s*GMT[+\-]\d{2}:\d{2})?)?)";
const DOC_ID_PATTERN: &str = r"(?i)Sourcing(?: reference)?[\s\-:]*(Doc\d+)";
const NUMERIC_ID_PATTERN: &str = r"(?i)\b(?:Solicitation\s+)?ID\b\s*[:.\-\s]\s*(11\d+)";
const ANY_ID_PATTERN: &str = r"(?i)\b(?:Solicitation\s+)?ID\b\s*[:.\-\s]\s*([\w\-]+)";
const BUYER_PATTERN: &str = r"(?i)(?:Company|Buyer)\s*[:.\-]\s*([^\n\r]+)";
const CATEGORY_PATTERN: &str = r"(?i)(?:Product\s+)?Category\s*[:.\-]\s*([^\n\r]+)";
const GMT_SUFFIX_PATTERN: &str = r"\s*GMT[+\-]\d{2}:\d{2}\s*$";

const DEFAULT_BUYER: &str = "SAP Ariba";
/// Characters of the lead text kept as the summary.
const SUMMARY_CHARS: usize = 200;

static RESPOND_BY: OnceLock<Regex> = OnceLock::new();
static DOC_ID: OnceLock<Regex> = OnceLock::new();
static NUMERIC_ID: OnceLock<Regex> = OnceLock::new();
static ANY_ID: OnceLock<Regex> = OnceLock::new();
static BUYER: OnceLock<Regex> = OnceLock::new();
static CATEGORY: OnceLock<Regex> = OnceLock::new();
static GMT_SUFFIX: OnceLock<Regex> = OnceLock::new();

/// SAP Ariba Discovery public leads for Singapore, read from a leads endpoint.
#[derive(Debug, Clone, Default)]
pub struct AribaPortal {
    leads_url: Option<String>,
}

impl AribaPortal {
    pub fn new(leads_url: Option<String>) -> Self {
        Self { leads_url }
    }
}

#[async_trait]
impl Portal for AribaPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::Ariba
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        _window: &DateWindow,
        _now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        let url = self.leads_url.as_deref().ok_or_else(|| {
            AppError::InvalidInput(
                "SAP Ariba leads URL is not configured (set ariba_leads_url)".to_string(),
            )
        })?;
        let payload = fetcher.fetch_text(url).await?;
        parse_leads(&payload)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LeadsPayload {
    Rows(Vec<Lead>),
    Wrapped {
        #[serde(alias = "leads", alias = "results")]
        items: Vec<Lead>,
    },
}

/// One lead. Structured fields win; the free text fills whatever they leave out.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Lead {
    #[serde(alias = "subject", deserialize_with = "lenient_text")]
    title: String,
    #[serde(alias = "link", deserialize_with = "lenient_text")]
    url: String,
    #[serde(alias = "body", alias = "summary", deserialize_with = "lenient_text")]
    description: String,
    #[serde(alias = "rfi_id", alias = "solicitationId", deserialize_with = "lenient_text")]
    rfi_id: String,
    #[serde(alias = "doc_id", alias = "sourcingDocId", deserialize_with = "lenient_text")]
    doc_id: String,
    #[serde(alias = "company", deserialize_with = "lenient_text")]
    buyer: String,
    #[serde(deserialize_with = "lenient_text")]
    category: String,
    #[serde(alias = "respond_by", alias = "closingDate", deserialize_with = "lenient_text")]
    respond_by: String,
    #[serde(alias = "posted_date", alias = "postedOn", deserialize_with = "lenient_text")]
    posted_date: String,
    #[serde(
        alias = "amount",
        alias = "opportunity_amount",
        deserialize_with = "lenient_text"
    )]
    opportunity_amount: String,
}

impl Lead {
    fn into_item(self) -> RawItem {
        let text = self.description.as_str();
        let found = |cell: &'static OnceLock<Regex>, pattern: &str| {
            first_capture(cell, pattern, text).unwrap_or_default()
        };
        let respond_by = first_non_empty(&[
            self.respond_by.as_str(),
            found(&RESPOND_BY, RESPOND_BY_PATTERN).as_str(),
        ]);
        let text_id = first_capture(&NUMERIC_ID, NUMERIC_ID_PATTERN, text)
            .or_else(|| first_capture(&ANY_ID, ANY_ID_PATTERN, text))
            .unwrap_or_default();

        let mut item = RawItem::new(Source::Ariba, collapse_whitespace(&self.title));
        item.link = first_non_empty(&[self.url.as_str(), ARIBA_DISCOVERY_URL]);
        item.summary = summarize(text);
        item.published = self.posted_date.clone();
        item.closing_date = strip_gmt(&respond_by);
        item.ref_no = first_non_empty(&[self.rfi_id.as_str(), text_id.as_str()]);
        item.calling_entity = first_non_empty(&[
            self.buyer.as_str(),
            found(&BUYER, BUYER_PATTERN).as_str(),
            DEFAULT_BUYER,
        ]);
        item.category = first_non_empty(&[
            self.category.as_str(),
            found(&CATEGORY, CATEGORY_PATTERN).as_str(),
        ]);
        item.sourcing_doc_no = first_non_empty(&[
            self.doc_id.as_str(),
            found(&DOC_ID, DOC_ID_PATTERN).as_str(),
        ]);
        item.opportunity_amount = self.opportunity_amount.clone();
        item
    }
}

/// Converts a leads payload (a JSON array, or an object with an `items`,
/// `leads` or `results` array) into raw items.
///
/// Leads without a title and placeholder "Mock" leads are skipped.
pub fn parse_leads(payload: &str) -> AppResult<Vec<RawItem>> {
    let leads = match serde_json::from_str::<LeadsPayload>(payload) {
        Ok(LeadsPayload::Rows(leads)) | Ok(LeadsPayload::Wrapped { items: leads }) => leads,
        Err(e) => {
            return Err(AppError::ParseError(format!(
                "SAP Ariba payload is not a lead array or an object with 'items': {e}"
            )))
        }
    };
    info!(leads = leads.len(), "SAP Ariba leads payload");

    Ok(leads
        .into_iter()
        .filter(|lead| {
            let keep = !lead.title.is_empty() && !lead.title.contains("Mock");
            if !keep {
                debug!(title = lead.title.as_str(), "Skipping SAP Ariba lead");
            }
            keep
        })
        .map(Lead::into_item)
        .collect())
}

/// `"13 Jan 2026 12:00 GMT+08:00"` becomes `"13 Jan 2026 12:00"`.
fn strip_gmt(raw: &str) -> String {
    cached_regex(&GMT_SUFFIX, GMT_SUFFIX_PATTERN)
        .replace(raw.trim(), "")
        .to_string()
}

fn summarize(text: &str) -> String {
    let flat = collapse_whitespace(text);
    if flat.chars().count() <= SUMMARY_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SUMMARY_CHARS).collect();
    format!("{cut}...")
}
