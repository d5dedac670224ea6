use crate::catalog::FeedCatalog;
use crate::models::{RawItem, Source};
use crate::utils::{cached_regex, first_capture};
use regex::Regex;
use std::sync::OnceLock;

const SIT_NAME: &str = "SINGAPORE INSTITUTE OF TECHNOLOGY";
const SIT_REF_PATTERN: &str = r"(TO\d+[A-Za-z]?)";
const TITLE_DATE_PATTERN: &str = r"(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})";
static SIT_REF: OnceLock<Regex> = OnceLock::new();
static TITLE_DATE: OnceLock<Regex> = OnceLock::new();

/// Header placement and field overrides decided by an item's source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapping {
    pub main_header: String,
    pub sub_header: String,
    /// Replaces the item's reference number when set.
    pub tender_number: Option<String>,
    /// Replaces the item's calling entity when set.
    pub calling_entity: Option<String>,
    /// Closing date to use when the item has none.
    pub closing_fallback: Option<String>,
    /// Publish date is already `YYYY-MM-DD` and must not be re-parsed.
    pub published_is_iso: bool,
    /// Publish date is forced to the detection date.
    pub published_is_today: bool,
}

/// Maps an item to its sheet headers.
///
/// Returns `None` for GeBIZ feed items whose category cannot be resolved.
pub fn map_source(item: &RawItem, catalog: &FeedCatalog) -> Option<SourceMapping> {
    let mapping = match &item.source {
        Source::GebizRss => {
            let (main, sub) = catalog.category_for_url(&item.feed_url);
            if main.is_empty() {
                return None;
            }
            SourceMapping {
                main_header: format!("GEBIZ - {main}"),
                sub_header: sub,
                ..Default::default()
            }
        }
        Source::GebizListing => {
            let category = or_default(&item.category, "Business Opportunities");
            let (main, sub) = match category.split_once('⇒') {
                Some((main, sub)) => (main.trim().to_string(), sub.trim().to_string()),
                None => (category.clone(), category),
            };
            SourceMapping {
                main_header: format!("GEBIZ - {main}"),
                sub_header: sub,
                ..Default::default()
            }
        }
        Source::Sesami => SourceMapping {
            main_header: "Sesami Business Opportunities".to_string(),
            sub_header: or_default(&item.category, "General"),
            ..Default::default()
        },
        Source::TenderBoard => tenderboard_mapping(item),
        Source::JpmcBrunei => SourceMapping {
            main_header: "JPMC Brunei Tenders".to_string(),
            sub_header: or_default(&item.category, "General"),
            calling_entity: Some("Jerudong Park Medical Centre".to_string()),
            published_is_today: true,
            ..Default::default()
        },
        Source::StLogistics { .. } => SourceMapping {
            main_header: "ST Logistics Business Opportunities".to_string(),
            sub_header: or_default(&item.category, "General"),
            calling_entity: Some("ST Logistics".to_string()),
            published_is_iso: true,
            ..Default::default()
        },
        Source::Ariba => SourceMapping {
            main_header: "SAP Ariba - Singapore".to_string(),
            sub_header: or_default(&item.category, "General"),
            ..Default::default()
        },
    };
    Some(mapping)
}

/// Industry as the sub header; SIT notices carry their reference and closing
/// date in the title.
fn tenderboard_mapping(item: &RawItem) -> SourceMapping {
    let sub_header = if item.industry.is_empty() {
        or_default(&item.category, "General")
    } else {
        item.industry.clone()
    };
    let mut mapping = SourceMapping {
        main_header: "TenderBoard Opportunities".to_string(),
        sub_header,
        ..Default::default()
    };

    if item.calling_entity.to_uppercase().contains(SIT_NAME) {
        if item.ref_no.is_empty() {
            mapping.tender_number = first_capture(&SIT_REF, SIT_REF_PATTERN, &item.title);
        }
        if item.closing_date.is_empty() {
            mapping.closing_fallback = cached_regex(&TITLE_DATE, TITLE_DATE_PATTERN)
                .find_iter(&item.title)
                .last()
                .map(|m| m.as_str().to_string());
        }
    }
    mapping
}

fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [feeds."Construction"."Building Works"]
        bo = "https://www.gebiz.gov.sg/rss/Building_Works-CREATE_BO_FEED.xml"
    "#;

    fn catalog() -> FeedCatalog {
        FeedCatalog::from_toml_str(CATALOG).unwrap()
    }

    #[test]
    fn rss_items_take_catalog_headers() {
        let mut item = RawItem::new(Source::GebizRss, "Repaint blocks");
        item.feed_url = "https://www.gebiz.gov.sg/rss/Building_Works-CREATE_BO_FEED.xml".to_string();
        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.main_header, "GEBIZ - Construction");
        assert_eq!(mapping.sub_header, "Building Works");
    }

    #[test]
    fn rss_items_without_main_header_are_dropped() {
        let mut item = RawItem::new(Source::GebizRss, "Unknown feed");
        item.feed_url = "https://www.gebiz.gov.sg/rss/Others-CREATE_BO_FEED.xml".to_string();
        assert!(map_source(&item, &catalog()).is_none());
    }

    #[test]
    fn listing_category_is_split_on_arrow() {
        let mut item = RawItem::new(Source::GebizListing, "Desks");
        item.category = "Furniture ⇒ Office Furniture".to_string();
        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.main_header, "GEBIZ - Furniture");
        assert_eq!(mapping.sub_header, "Office Furniture");

        item.category = String::new();
        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.main_header, "GEBIZ - Business Opportunities");
        assert_eq!(mapping.sub_header, "Business Opportunities");
    }

    #[test]
    fn fixed_entities_for_jpmc_and_stlogs() {
        let jpmc = map_source(&RawItem::new(Source::JpmcBrunei, "Gloves"), &catalog()).unwrap();
        assert_eq!(jpmc.calling_entity.as_deref(), Some("Jerudong Park Medical Centre"));
        assert!(jpmc.published_is_today);
        assert_eq!(jpmc.sub_header, "General");

        let source = Source::StLogistics {
            business_unit: "Aviation".to_string(),
        };
        let stlogs = map_source(&RawItem::new(source, "Racks"), &catalog()).unwrap();
        assert_eq!(stlogs.main_header, "ST Logistics Business Opportunities");
        assert_eq!(stlogs.calling_entity.as_deref(), Some("ST Logistics"));
        assert!(stlogs.published_is_iso);
    }

    #[test]
    fn ariba_items_group_by_category() {
        let mut item = RawItem::new(Source::Ariba, "Printer toner");
        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.main_header, "SAP Ariba - Singapore");
        assert_eq!(mapping.sub_header, "General");
        assert_eq!(mapping.calling_entity, None);

        item.category = "Office supplies".to_string();
        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.sub_header, "Office supplies");
    }

    #[test]
    fn tenderboard_uses_industry_and_sit_title() {
        let mut item = RawItem::new(
            Source::TenderBoard,
            "TO2026012A Campus Cleaning 05 Jan 2026 to 19 Jan 2026",
        );
        item.industry = "Facilities".to_string();
        item.calling_entity = "Singapore Institute of Technology".to_string();

        let mapping = map_source(&item, &catalog()).unwrap();
        assert_eq!(mapping.main_header, "TenderBoard Opportunities");
        assert_eq!(mapping.sub_header, "Facilities");
        assert_eq!(mapping.tender_number.as_deref(), Some("TO2026012A"));
        assert_eq!(mapping.closing_fallback.as_deref(), Some("19 Jan 2026"));
    }
}
