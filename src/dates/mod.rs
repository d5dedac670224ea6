//! Date handling for collected records.
//!
//! Portals publish dates in many shapes. This module parses them into Singapore
//! time ([`parse_date`]), turns named presets into concrete bounds ([`DateMode`])
//! and filters normalized records against those bounds ([`filter_by_date`]).

mod filter;
mod mode;
mod parse;

pub use filter::{effective_date, filter_by_date, DateField, FilterStats};
pub use mode::{end_of_day, start_of_day, DateMode, DateWindow};
pub use parse::{
    extract_date_only, month_from_name, now_in_singapore, parse_date, parse_date_fuzzy, parse_day,
    parse_partial_day_month, parse_time, singapore, YearBias,
};
