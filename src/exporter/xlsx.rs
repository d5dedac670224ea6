use super::RunMetadata;
use crate::constants::{
    AWARDS_SHEET, AWARD_COLUMNS, OPPORTUNITIES_SHEET, OPPORTUNITY_COLUMNS, SETTINGS_SHEET,
};
use crate::errors::AppResult;
use crate::models::Tender;
use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{
    Color, ExcelDateTime, Format, FormatAlign, FormatBorder, FormatUnderline, Workbook, Worksheet,
};
use tracing::warn;

const DATE_FORMAT: &str = "dd/mm/yyyy";
/// Same layout as [`DATE_FORMAT`], for days Excel cannot store as dates.
const DATE_TEXT_FORMAT: &str = "%d/%m/%Y";
/// Years an Excel date serial can hold.
const EXCEL_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;
/// Longest URL Excel accepts in a hyperlink.
const MAX_URL_LEN: usize = 2079;
/// Display width of a `dd/mm/yyyy` cell.
const DATE_WIDTH: usize = 10;
const WIDTH_PADDING: usize = 5;
const MAX_COLUMN_WIDTH: usize = 100;
const SETTINGS_WIDTHS: [f64; 2] = [25.0, 80.0];
const RIGHT_ALIGNED_AWARD_COLUMNS: &[&str] = &["Award Value", "Closing Time"];

/// One cell of a record row.
#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Number(usize),
    Text(String),
    Date(Option<NaiveDate>),
    Link(String),
}

impl CellValue {
    fn display_len(&self) -> usize {
        match self {
            Self::Number(n) => n.to_string().len(),
            Self::Text(s) | Self::Link(s) => longest_line(s),
            Self::Date(Some(_)) => DATE_WIDTH,
            Self::Date(None) => 0,
        }
    }
}

struct Formats {
    header: Format,
    cell: Format,
    right: Format,
    date: Format,
    link: Format,
}

impl Formats {
    fn new() -> Self {
        let cell = Format::new()
            .set_border(FormatBorder::Thin)
            .set_text_wrap()
            .set_align(FormatAlign::Top);
        Self {
            header: Format::new().set_bold().set_border(FormatBorder::Thin),
            right: cell.clone().set_align(FormatAlign::Right),
            date: cell
                .clone()
                .set_align(FormatAlign::Left)
                .set_num_format(DATE_FORMAT),
            link: cell
                .clone()
                .set_font_color(Color::Blue)
                .set_underline(FormatUnderline::Single),
            cell,
        }
    }
}

/// Builds the workbook and returns its bytes.
///
/// Opportunities and awards go to separate sheets, each numbered from 1. The
/// awards sheet is only added when there are awards.
pub fn build_workbook(tenders: &[Tender], metadata: &RunMetadata) -> AppResult<Vec<u8>> {
    let formats = Formats::new();
    let (awards, opportunities): (Vec<&Tender>, Vec<&Tender>) =
        tenders.iter().partition(|t| t.is_award);

    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(OPPORTUNITIES_SHEET)?;
    let rows = record_rows(&opportunities, OPPORTUNITY_COLUMNS);
    write_records(sheet, OPPORTUNITY_COLUMNS, &rows, &[], &formats)?;

    if !awards.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(AWARDS_SHEET)?;
        let rows = record_rows(&awards, AWARD_COLUMNS);
        write_records(
            sheet,
            AWARD_COLUMNS,
            &rows,
            RIGHT_ALIGNED_AWARD_COLUMNS,
            &formats,
        )?;
    }

    let settings = metadata.settings();
    if !settings.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SETTINGS_SHEET)?;
        write_settings(sheet, &settings, &formats)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn record_rows(tenders: &[&Tender], columns: &[&str]) -> Vec<Vec<CellValue>> {
    tenders
        .iter()
        .enumerate()
        .map(|(idx, tender)| {
            columns
                .iter()
                .map(|column| cell_value(tender, column, idx + 1))
                .collect()
        })
        .collect()
}

fn cell_value(tender: &Tender, column: &str, no: usize) -> CellValue {
    let text = |value: &str| CellValue::Text(value.to_string());
    match column {
        "No." => CellValue::Number(no),
        "Published Date" => CellValue::Date(tender.published_date),
        "Awarded Date" => CellValue::Date(tender.awarded_date),
        "Closing Date" => CellValue::Date(tender.closing_date),
        "Date Detected" => CellValue::Date(Some(tender.date_detected)),
        "Award Value" => text(&tender.award_value),
        "Awarded To" if tender.awarded_to.trim().is_empty() => text("No Award"),
        "Awarded To" => text(&tender.awarded_to),
        "Closing Time" => text(&tender.closing_time),
        "ITQ/ITT" => text(&tender.tender_number),
        "Calling Entity" => text(&tender.calling_entity),
        "Description" => text(&tender.description),
        "Link" if tender.link.starts_with("http") && tender.link.chars().count() <= MAX_URL_LEN => {
            CellValue::Link(tender.link.clone())
        }
        "Link" => text(&tender.link),
        "Main Header" => text(&tender.main_header),
        "Sub Header" => text(&tender.sub_header),
        "Sourcing Doc No." => text(&tender.sourcing_doc_no),
        "Opportunity Amount" => text(&tender.opportunity_amount),
        _ => CellValue::Text(String::new()),
    }
}

fn write_records(
    sheet: &mut Worksheet,
    columns: &[&str],
    rows: &[Vec<CellValue>],
    right_aligned: &[&str],
    formats: &Formats,
) -> AppResult<()> {
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &formats.header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_num = idx as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            let col_num = col as u16;
            let text_format = if right_aligned.contains(&columns[col]) {
                &formats.right
            } else {
                &formats.cell
            };
            match value {
                CellValue::Number(n) => {
                    sheet.write_number_with_format(row_num, col_num, *n as f64, text_format)?;
                }
                CellValue::Text(s) => {
                    sheet.write_string_with_format(row_num, col_num, s.as_str(), text_format)?;
                }
                CellValue::Date(Some(day)) => match excel_date(*day) {
                    Some(date) => {
                        sheet.write_datetime_with_format(row_num, col_num, &date, &formats.date)?;
                    }
                    None => {
                        let text = day.format(DATE_TEXT_FORMAT).to_string();
                        sheet.write_string_with_format(row_num, col_num, text, &formats.date)?;
                    }
                },
                CellValue::Date(None) => {
                    sheet.write_blank(row_num, col_num, &formats.date)?;
                }
                CellValue::Link(url) => {
                    let written = sheet
                        .write_url_with_format(row_num, col_num, url.as_str(), &formats.link)
                        .map(|_| ());
                    if let Err(e) = written {
                        warn!(row = row_num, url = url.as_str(), error = %e, "Writing link as text");
                        sheet.write_string_with_format(row_num, col_num, url.as_str(), text_format)?;
                    }
                }
            }
        }
    }

    sheet.autofilter(0, 0, rows.len() as u32, columns.len().saturating_sub(1) as u16)?;
    for (col, width) in column_widths(columns, rows).into_iter().enumerate() {
        sheet.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}

fn write_settings(
    sheet: &mut Worksheet,
    settings: &[(String, String)],
    formats: &Formats,
) -> AppResult<()> {
    sheet.write_string_with_format(0, 0, "Setting", &formats.header)?;
    sheet.write_string_with_format(0, 1, "Value", &formats.header)?;
    for (idx, (key, value)) in settings.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string_with_format(row, 0, key.as_str(), &formats.cell)?;
        sheet.write_string_with_format(row, 1, value.as_str(), &formats.cell)?;
    }
    for (col, width) in SETTINGS_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }
    Ok(())
}

/// Longest content (header included) plus padding, capped.
fn column_widths(columns: &[&str], rows: &[Vec<CellValue>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(CellValue::display_len)
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or_default();
            (longest + WIDTH_PADDING).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn longest_line(text: &str) -> usize {
    text.lines()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or_default()
}

/// `None` for days outside the range Excel dates cover.
fn excel_date(day: NaiveDate) -> Option<ExcelDateTime> {
    if !EXCEL_YEARS.contains(&day.year()) {
        return None;
    }
    let year = u16::try_from(day.year()).ok()?;
    ExcelDateTime::from_ymd(year, day.month() as u8, day.day() as u8).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn award(awarded_to: &str) -> Tender {
        let mut tender = Tender::new("Award of cleaning", day(2026, 1, 15));
        tender.is_award = true;
        tender.awarded_to = awarded_to.to_string();
        tender.award_value = "$12,000".to_string();
        tender
    }

    #[test]
    fn blank_awardee_reads_no_award() {
        assert_eq!(
            cell_value(&award("  "), "Awarded To", 1),
            CellValue::Text("No Award".to_string())
        );
        assert_eq!(
            cell_value(&award("Sparkle Pte Ltd"), "Awarded To", 1),
            CellValue::Text("Sparkle Pte Ltd".to_string())
        );
    }

    #[test]
    fn only_http_links_become_hyperlinks() {
        let mut tender = Tender::new("Desks", day(2026, 1, 15));
        tender.link = "https://www.gebiz.gov.sg/x".to_string();
        assert!(matches!(cell_value(&tender, "Link", 1), CellValue::Link(_)));
        tender.link = "HTML_LISTING".to_string();
        assert!(matches!(cell_value(&tender, "Link", 1), CellValue::Text(_)));
    }

    #[test]
    fn overlong_links_stay_text() {
        let mut tender = Tender::new("Desks", day(2026, 1, 15));
        tender.link = format!("https://www.gebiz.gov.sg/?q={}", "a".repeat(MAX_URL_LEN));
        assert!(matches!(cell_value(&tender, "Link", 1), CellValue::Text(_)));
    }

    #[test]
    fn days_outside_excel_range_have_no_serial() {
        assert!(excel_date(day(2026, 1, 15)).is_some());
        assert!(excel_date(day(1899, 12, 31)).is_none());
        assert!(excel_date(day(10000, 1, 1)).is_none());
    }

    #[test]
    fn odd_dates_and_long_links_do_not_abort_the_workbook() {
        let mut tender = Tender::new("Archive scan", day(2026, 1, 15));
        tender.published_date = Some(day(1850, 6, 1));
        tender.closing_date = Some(day(12026, 1, 1));
        tender.link = format!("https://www.gebiz.gov.sg/?q={}", "a".repeat(3000));
        let metadata = RunMetadata {
            exported_at: crate::dates::singapore()
                .with_ymd_and_hms(2026, 1, 15, 9, 30, 0)
                .unwrap(),
            mode: "all".to_string(),
            start_date: day(2026, 1, 1),
            end_date: day(2026, 1, 15),
            portals: Vec::new(),
            feeds: Vec::new(),
            categories: Default::default(),
            include_undated: true,
        };
        let bytes = build_workbook(&[tender], &metadata).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn rows_are_numbered_per_sheet() {
        let first = award("A");
        let second = award("B");
        let rows = record_rows(&[&first, &second], AWARD_COLUMNS);
        assert_eq!(rows[0][0], CellValue::Number(1));
        assert_eq!(rows[1][0], CellValue::Number(2));
    }

    #[test]
    fn column_widths_are_padded_and_capped() {
        let rows = vec![vec![
            CellValue::Text("x".repeat(300)),
            CellValue::Date(Some(day(2026, 1, 1))),
            CellValue::Text("two\nlines here".to_string()),
        ]];
        let widths = column_widths(&["Description", "Closing Date", "Sub Header"], &rows);
        assert_eq!(widths, vec![100, 17, 15]);
    }
}
