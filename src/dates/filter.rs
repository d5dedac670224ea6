use super::mode::DateWindow;
use crate::models::Tender;
use chrono::NaiveDate;
use tracing::info;

/// Which field a record was judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Awarded,
    Published,
    /// Closing date standing in for a missing publish date.
    ClosingFallback,
}

/// Counts gathered while filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub kept: usize,
    pub undated: usize,
    pub by_awarded: usize,
    pub by_published: usize,
    pub by_closing: usize,
}

/// Picks the date a record is filtered on: awarded, then published, then closing.
pub fn effective_date(tender: &Tender) -> Option<(NaiveDate, DateField)> {
    tender
        .awarded_date
        .map(|d| (d, DateField::Awarded))
        .or_else(|| tender.published_date.map(|d| (d, DateField::Published)))
        .or_else(|| tender.closing_date.map(|d| (d, DateField::ClosingFallback)))
}

/// Keeps the records whose effective date falls inside `window`.
///
/// Records with no date are kept only when `include_undated` is set.
pub fn filter_by_date(
    tenders: Vec<Tender>,
    window: &DateWindow,
    include_undated: bool,
) -> (Vec<Tender>, FilterStats) {
    let mut stats = FilterStats {
        total: tenders.len(),
        ..Default::default()
    };

    let kept: Vec<Tender> = tenders
        .into_iter()
        .filter(|tender| match effective_date(tender) {
            Some((day, field)) => {
                match field {
                    DateField::Awarded => stats.by_awarded += 1,
                    DateField::Published => stats.by_published += 1,
                    DateField::ClosingFallback => stats.by_closing += 1,
                }
                window.contains_day(day)
            }
            None => {
                stats.undated += 1;
                include_undated
            }
        })
        .collect();
    stats.kept = kept.len();

    if stats.undated > 0 {
        info!(
            undated = stats.undated,
            included = include_undated,
            "Records without a usable date"
        );
    }
    info!(
        kept = stats.kept,
        total = stats.total,
        awarded_date = stats.by_awarded,
        published_date = stats.by_published,
        closing_date_fallback = stats.by_closing,
        "Date filter applied"
    );

    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::mode::start_of_day;
    use crate::dates::DateMode;
    use crate::dates::parse::singapore;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tender(published: Option<NaiveDate>, closing: Option<NaiveDate>) -> Tender {
        let mut t = Tender::new("Supply of chairs", day(2025, 3, 12));
        t.published_date = published;
        t.closing_date = closing;
        t
    }

    fn last_7_days() -> DateWindow {
        let now = singapore()
            .with_ymd_and_hms(2025, 3, 12, 9, 0, 0)
            .single()
            .unwrap();
        DateMode::Last7Days.window(now)
    }

    #[test]
    fn keeps_records_inside_window() {
        let items = vec![
            tender(Some(day(2025, 3, 10)), None),
            tender(Some(day(2025, 2, 1)), None),
        ];
        let (kept, stats) = filter_by_date(items, &last_7_days(), false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].published_date, Some(day(2025, 3, 10)));
        assert_eq!(stats.by_published, 2);
    }

    #[test]
    fn awarded_date_takes_precedence() {
        let mut award = tender(Some(day(2025, 1, 1)), None);
        award.awarded_date = Some(day(2025, 3, 11));
        let (kept, stats) = filter_by_date(vec![award], &last_7_days(), false);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.by_awarded, 1);
        assert_eq!(stats.by_published, 0);
    }

    #[test]
    fn closing_date_is_a_fallback() {
        let item = tender(None, Some(day(2025, 3, 20)));
        let (kept, stats) = filter_by_date(vec![item], &last_7_days(), false);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.by_closing, 1);
    }

    #[test]
    fn undated_records_follow_the_flag() {
        let (kept, stats) = filter_by_date(vec![tender(None, None)], &last_7_days(), false);
        assert!(kept.is_empty());
        assert_eq!(stats.undated, 1);

        let (kept, _) = filter_by_date(vec![tender(None, None)], &last_7_days(), true);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn window_end_is_inclusive_of_the_whole_day() {
        let window = DateMode::Custom {
            start: day(2025, 3, 1),
            end: Some(day(2025, 3, 5)),
        }
        .window(start_of_day(day(2025, 3, 12)).unwrap());
        let items = vec![
            tender(Some(day(2025, 3, 1)), None),
            tender(Some(day(2025, 3, 5)), None),
            tender(Some(day(2025, 3, 6)), None),
        ];
        let (kept, stats) = filter_by_date(items, &window, true);
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.total, 3);
    }
}
