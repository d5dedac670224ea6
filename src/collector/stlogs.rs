use super::{first_non_empty, lenient_text, PageFetcher, Portal};
use crate::constants::{SINGAPORE_OFFSET_SECS, STLOGS_PORTAL_URL};
use crate::dates::{parse_date, DateWindow};
use crate::errors::{AppError, AppResult};
use crate::models::{PortalKind, RawItem, Source};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use tracing::{info, warn};

const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ST Logistics eProcurement, read from the sourcing grid's data payload.
#[derive(Debug, Clone, Default)]
pub struct StLogisticsPortal {
    grid_url: Option<String>,
}

impl StLogisticsPortal {
    pub fn new(grid_url: Option<String>) -> Self {
        Self { grid_url }
    }
}

#[async_trait]
impl Portal for StLogisticsPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::StLogistics
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        _window: &DateWindow,
        _now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        let url = self.grid_url.as_deref().ok_or_else(|| {
            AppError::InvalidInput(
                "ST Logistics grid URL is not configured (set stlogs_grid_url)".to_string(),
            )
        })?;
        let payload = fetcher.fetch_text(url).await?;
        parse_grid(&payload)
    }
}

/// The grid answers with either a bare row array or an object wrapping one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GridPayload {
    Rows(Vec<GridRow>),
    Wrapped { items: Vec<GridRow> },
}

/// One sourcing event. The grid fills either the notice or the RFx variant of
/// the date columns, and one of several grouping columns.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GridRow {
    #[serde(deserialize_with = "lenient_text")]
    rfx_tit: String,
    #[serde(deserialize_with = "lenient_text")]
    rfx_no: String,
    #[serde(deserialize_with = "lenient_text")]
    bu_nm: String,
    #[serde(deserialize_with = "lenient_text")]
    sg_nm: String,
    #[serde(deserialize_with = "lenient_text")]
    purc_grp_nm: String,
    #[serde(deserialize_with = "lenient_text")]
    item_cls_nm: String,
    #[serde(deserialize_with = "lenient_text")]
    noti_start_dt: String,
    #[serde(deserialize_with = "lenient_text")]
    rfx_start_dt: String,
    #[serde(deserialize_with = "lenient_text")]
    noti_end_dt: String,
    #[serde(deserialize_with = "lenient_text")]
    rfx_close_dt: String,
}

impl GridRow {
    fn into_item(self) -> RawItem {
        let mut item = RawItem::new(
            Source::StLogistics {
                business_unit: self.bu_nm,
            },
            self.rfx_tit,
        );
        item.ref_no = self.rfx_no;
        item.link = STLOGS_PORTAL_URL.to_string();
        item.category = Some(first_non_empty(&[
            self.sg_nm.as_str(),
            self.purc_grp_nm.as_str(),
            self.item_cls_nm.as_str(),
        ]))
        .filter(|category| !category.is_empty())
        .unwrap_or_else(|| "General".to_string());
        item.published = to_singapore_time(&first_non_empty(&[
            self.noti_start_dt.as_str(),
            self.rfx_start_dt.as_str(),
        ]));
        item.closing_date = to_singapore_time(&first_non_empty(&[
            self.noti_end_dt.as_str(),
            self.rfx_close_dt.as_str(),
        ]));
        item
    }
}

/// Converts the grid payload (a JSON array, or an object with an `items` array)
/// into raw items. Rows without a title are skipped.
pub fn parse_grid(payload: &str) -> AppResult<Vec<RawItem>> {
    let rows = match serde_json::from_str::<GridPayload>(payload) {
        Ok(GridPayload::Rows(rows)) | Ok(GridPayload::Wrapped { items: rows }) => rows,
        Err(e) => {
            return Err(AppError::ParseError(format!(
                "ST Logistics payload is not a row array or an object with 'items': {e}"
            )))
        }
    };
    info!(rows = rows.len(), "ST Logistics grid payload");

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        if row.rfx_tit.is_empty() {
            warn!(reference = row.rfx_no.as_str(), "Skipping ST Logistics row without a title");
            continue;
        }
        items.push(row.into_item());
    }
    Ok(items)
}

/// Shifts a grid timestamp from UTC to Singapore time.
///
/// ISO strings are read year-first; anything else goes through the day-first
/// parser. Unparseable input is returned unchanged.
pub fn to_singapore_time(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let utc = if raw.contains('T') {
        parse_iso(raw)
    } else {
        parse_date(raw).map(|parsed| parsed.naive_local())
    };
    match utc {
        Some(utc) => (utc + Duration::seconds(i64::from(SINGAPORE_OFFSET_SECS)))
            .format(OUTPUT_FORMAT)
            .to_string(),
        None => {
            warn!(value = raw, "Unreadable ST Logistics timestamp");
            raw.to_string()
        }
    }
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
