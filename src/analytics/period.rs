//! Turns the year and month requested by a client into a range of dates.

use serde::Deserialize;
use time::{Date, Month};

use crate::Error;

/// The smallest year accepted in an analytics query or a transaction date.
pub const MIN_YEAR: i32 = 1;
/// The largest year accepted in an analytics query or a transaction date.
///
/// Dates are stored as `YYYY-MM-DD` text, so the end of the range must still have four digits.
pub const MAX_YEAR: i32 = 9998;

const MONTH_NAMES: [(&str, Month); 12] = [
    ("january", Month::January),
    ("february", Month::February),
    ("march", Month::March),
    ("april", Month::April),
    ("may", Month::May),
    ("june", Month::June),
    ("july", Month::July),
    ("august", Month::August),
    ("september", Month::September),
    ("october", Month::October),
    ("november", Month::November),
    ("december", Month::December),
];

/// The query parameters of an analytics request.
///
/// Both fields are kept as raw text so that they can be validated with useful error messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyticsQuery {
    /// The year to report on, e.g. "2024".
    pub year: Option<String>,
    /// The English name of a month in `year` to narrow the report to, e.g. "March".
    pub month: Option<String>,
}

/// A validated reporting period: a whole year or one month of a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    /// The calendar year.
    pub year: i32,
    /// The month, or `None` for the whole year.
    pub month: Option<Month>,
}

/// A range of dates from `start` up to but not including `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// The first date in the range.
    pub start: Date,
    /// The first date after the range, or `None` if the range has no end.
    pub end: Option<Date>,
}

impl DateRange {
    /// The range from `start` to `end` with both dates included.
    pub fn inclusive(start: Date, end: Date) -> Self {
        Self {
            start,
            end: end.next_day(),
        }
    }

    /// Whether `date` falls in the range.
    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && self.end.is_none_or(|end| date < end)
    }
}

impl Period {
    /// The dates covered by the period.
    ///
    /// A month covers the first of that month up to the first of the following month, rolling
    /// over into January of the next year after December. A whole year covers January 1st up
    /// to January 1st of the next year.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidYear] if the dates cannot be represented.
    pub fn date_range(&self) -> Result<DateRange, Error> {
        let invalid_year = |_| Error::InvalidYear(self.year.to_string());

        let (start, end) = match self.month {
            None => (
                Date::from_calendar_date(self.year, Month::January, 1).map_err(invalid_year)?,
                Date::from_calendar_date(self.year + 1, Month::January, 1)
                    .map_err(invalid_year)?,
            ),
            Some(month) => {
                let (end_year, end_month) = match month {
                    Month::December => (self.year + 1, Month::January),
                    month => (self.year, month.next()),
                };

                (
                    Date::from_calendar_date(self.year, month, 1).map_err(invalid_year)?,
                    Date::from_calendar_date(end_year, end_month, 1).map_err(invalid_year)?,
                )
            }
        };

        Ok(DateRange {
            start,
            end: Some(end),
        })
    }
}

/// Parse the English name of a month, e.g. "March", "march" or "Mar".
fn parse_month(text: &str) -> Option<Month> {
    let name = text.trim().to_lowercase();

    if name.len() < 3 {
        return None;
    }

    MONTH_NAMES
        .iter()
        .find(|(full_name, _)| *full_name == name || full_name[..3] == name)
        .map(|(_, month)| *month)
}

/// Validate the raw `year` and `month` of an analytics query.
///
/// An empty month is treated the same as no month.
///
/// # Errors
///
/// This function will return a:
/// - [Error::MissingYear] if `year` is missing or empty,
/// - [Error::InvalidYear] if `year` is not a whole number in the supported range,
/// - or [Error::InvalidMonth] if `month` is not the name of a month.
pub fn resolve_period(year: Option<&str>, month: Option<&str>) -> Result<Period, Error> {
    let year_text = year.map(str::trim).unwrap_or_default();

    if year_text.is_empty() {
        return Err(Error::MissingYear);
    }

    let year = year_text
        .parse::<i32>()
        .ok()
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
        .ok_or_else(|| Error::InvalidYear(year_text.to_owned()))?;

    let month = match month.map(str::trim).filter(|month| !month.is_empty()) {
        Some(month_text) => {
            Some(parse_month(month_text).ok_or_else(|| Error::InvalidMonth(month_text.to_owned()))?)
        }
        None => None,
    };

    Ok(Period { year, month })
}
