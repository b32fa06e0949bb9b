use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid first day {0}: first day of monthly cycle must be in [1,28]")]
    InvalidFirstDay(u32),
}

/// First day of a monthly billing cycle, always in `1..=28` so that every
/// month contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FirstDay(u32);

impl FirstDay {
    pub const FIRST: FirstDay = FirstDay(1);

    pub fn new(day: u32) -> Result<Self, PeriodError> {
        if (1..=28).contains(&day) {
            Ok(FirstDay(day))
        } else {
            Err(PeriodError::InvalidFirstDay(day))
        }
    }

    pub fn day(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for FirstDay {
    type Error = PeriodError;

    fn try_from(day: u32) -> Result<Self, Self::Error> {
        FirstDay::new(day)
    }
}

impl From<FirstDay> for u32 {
    fn from(first_day: FirstDay) -> u32 {
        first_day.0
    }
}

impl fmt::Display for FirstDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }
}

/// The greatest period start that is less than or equal to `date`.
pub fn greatest_start(date: NaiveDate, first_day: FirstDay) -> NaiveDate {
    let first_of_month = date - Days::new(u64::from(date.day0()));
    let month = if date.day() >= first_day.day() {
        first_of_month
    } else {
        first_of_month - Months::new(1)
    };
    month + Days::new(u64::from(first_day.day() - 1))
}

/// The lowest (inclusive) period end that is greater than or equal to `date`.
pub fn lowest_end(date: NaiveDate, first_day: FirstDay) -> NaiveDate {
    greatest_start(date, first_day) + Months::new(1) - Days::new(1)
}

/// The monthly period containing `date`, both ends inclusive.
pub fn enclose_date(date: NaiveDate, first_day: FirstDay) -> DateRange {
    DateRange::new(greatest_start(date, first_day), lowest_end(date, first_day))
}

/// One month later, clamped to the last day of the following month.
pub fn next_month(date: NaiveDate) -> NaiveDate {
    date + Months::new(1)
}

/// One month earlier, clamped to the last day of the preceding month.
pub fn prev_month(date: NaiveDate) -> NaiveDate {
    date - Months::new(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fd(day: u32) -> FirstDay {
        FirstDay::new(day).unwrap()
    }

    #[test]
    fn period_bounds() {
        let cases = [
            ("2016-01-01", 1, "2016-01-01", "2016-01-31"),
            ("2016-01-02", 1, "2016-01-01", "2016-01-31"),
            ("2016-01-31", 1, "2016-01-01", "2016-01-31"),
            ("2016-01-01", 15, "2015-12-15", "2016-01-14"),
            ("2016-01-14", 15, "2015-12-15", "2016-01-14"),
            ("2016-01-15", 15, "2016-01-15", "2016-02-14"),
            ("2016-01-16", 15, "2016-01-15", "2016-02-14"),
            ("2015-12-14", 15, "2015-11-15", "2015-12-14"),
            ("2015-12-15", 15, "2015-12-15", "2016-01-14"),
            ("2016-02-10", 1, "2016-02-01", "2016-02-29"),
        ];
        for (d, first, start, end) in cases {
            let range = enclose_date(date(d), fd(first));
            assert_eq!(range, DateRange::new(date(start), date(end)), "{d} / {first}");
            assert_eq!(greatest_start(date(d), fd(first)), date(start));
            assert_eq!(lowest_end(date(d), fd(first)), date(end));
        }
    }

    #[test]
    fn first_day_out_of_range() {
        assert_eq!(FirstDay::new(0), Err(PeriodError::InvalidFirstDay(0)));
        assert_eq!(FirstDay::new(29), Err(PeriodError::InvalidFirstDay(29)));
        assert!(FirstDay::new(28).is_ok());
    }

    #[test]
    fn first_day_deserializes_with_validation() {
        use serde::de::value::{Error, U32Deserializer};
        use serde::de::IntoDeserializer;

        let de: U32Deserializer<Error> = 4u32.into_deserializer();
        assert_eq!(FirstDay::deserialize(de).unwrap().day(), 4);
        let de: U32Deserializer<Error> = 29u32.into_deserializer();
        assert!(FirstDay::deserialize(de).is_err());
    }

    #[test]
    fn next_and_prev_clamp_to_month_end() {
        assert_eq!(next_month(date("2016-01-01")), date("2016-02-01"));
        assert_eq!(next_month(date("2016-01-31")), date("2016-02-29"));
        assert_eq!(next_month(date("2016-12-15")), date("2017-01-15"));
        assert_eq!(prev_month(date("2016-01-01")), date("2015-12-01"));
        assert_eq!(prev_month(date("2016-03-31")), date("2016-02-29"));
        assert_eq!(prev_month(date("2016-02-29")), date("2016-01-29"));
    }
}
