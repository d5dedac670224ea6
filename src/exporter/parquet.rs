use crate::errors::{AppError, AppResult};
use crate::models::Tender;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Days from 0001-01-01 to 1970-01-01, the epoch of polars `Date` columns.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn epoch_days(day: Option<NaiveDate>) -> Option<i32> {
    day.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
}

fn date_series(name: &str, days: Vec<Option<i32>>) -> AppResult<Series> {
    Series::new(name, days)
        .cast(&DataType::Date)
        .map_err(|e| AppError::ExportError(format!("Failed to build date column {name}: {e}")))
}

/// Converts records into a DataFrame with one column per field.
///
/// Date fields become `Date` columns; everything else is kept as text.
pub fn tenders_to_dataframe(tenders: &[Tender]) -> AppResult<DataFrame> {
    let len = tenders.len();
    let mut nos = Vec::with_capacity(len);
    let mut published = Vec::with_capacity(len);
    let mut awarded = Vec::with_capacity(len);
    let mut award_values = Vec::with_capacity(len);
    let mut awarded_tos = Vec::with_capacity(len);
    let mut closing = Vec::with_capacity(len);
    let mut closing_times = Vec::with_capacity(len);
    let mut detected = Vec::with_capacity(len);
    let mut tender_numbers = Vec::with_capacity(len);
    let mut entities = Vec::with_capacity(len);
    let mut descriptions = Vec::with_capacity(len);
    let mut links = Vec::with_capacity(len);
    let mut main_headers = Vec::with_capacity(len);
    let mut sub_headers = Vec::with_capacity(len);
    let mut sourcing_docs = Vec::with_capacity(len);
    let mut amounts = Vec::with_capacity(len);
    let mut is_awards = Vec::with_capacity(len);

    for tender in tenders {
        nos.push(tender.no as u32);
        published.push(epoch_days(tender.published_date));
        awarded.push(epoch_days(tender.awarded_date));
        award_values.push(tender.award_value.as_str());
        awarded_tos.push(tender.awarded_to.as_str());
        closing.push(epoch_days(tender.closing_date));
        closing_times.push(tender.closing_time.as_str());
        detected.push(epoch_days(Some(tender.date_detected)));
        tender_numbers.push(tender.tender_number.as_str());
        entities.push(tender.calling_entity.as_str());
        descriptions.push(tender.description.as_str());
        links.push(tender.link.as_str());
        main_headers.push(tender.main_header.as_str());
        sub_headers.push(tender.sub_header.as_str());
        sourcing_docs.push(tender.sourcing_doc_no.as_str());
        amounts.push(tender.opportunity_amount.as_str());
        is_awards.push(tender.is_award);
    }

    DataFrame::new(vec![
        Series::new("no", nos),
        date_series("published_date", published)?,
        date_series("awarded_date", awarded)?,
        Series::new("award_value", award_values),
        Series::new("awarded_to", awarded_tos),
        date_series("closing_date", closing)?,
        Series::new("closing_time", closing_times),
        date_series("date_detected", detected)?,
        Series::new("tender_number", tender_numbers),
        Series::new("calling_entity", entities),
        Series::new("description", descriptions),
        Series::new("link", links),
        Series::new("main_header", main_headers),
        Series::new("sub_header", sub_headers),
        Series::new("sourcing_doc_no", sourcing_docs),
        Series::new("opportunity_amount", amounts),
        Series::new("is_award", is_awards),
    ])
    .map_err(|e| AppError::ExportError(format!("Failed to create DataFrame: {e}")))
}

/// Serializes every record into Parquet bytes.
pub fn write_parquet(tenders: &[Tender]) -> AppResult<Vec<u8>> {
    let mut df = tenders_to_dataframe(tenders)?;
    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer)
        .finish(&mut df)
        .map_err(|e| AppError::ExportError(format!("Failed to write parquet: {e}")))?;
    Ok(buffer)
}
