use chrono::{Datelike, Days, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number in `1..=12` for an English month name, its three-letter
/// abbreviation (any case), or its number with or without a leading zero.
pub fn month_number(month: &str) -> Option<u32> {
    let lower = month.to_lowercase();
    if let Some(pos) = MONTH_NAMES
        .iter()
        .position(|name| *name == lower || name[..3] == lower)
    {
        return Some(pos as u32 + 1);
    }
    if (1..=2).contains(&lower.len()) && lower.chars().all(|c| c.is_ascii_digit()) {
        return lower.parse().ok().filter(|n| (1..=12).contains(n));
    }
    None
}

/// Add a number of business days to a date. A start date on a weekend is
/// first moved to the following Monday. `None` past the last representable
/// date.
pub fn add_biz_days(date: NaiveDate, num_biz_days: u32) -> Option<NaiveDate> {
    let weeks = u64::from(num_biz_days / 5);
    let biz_days_left = num_biz_days % 5;
    let mut num_days = weeks * 7 + u64::from(biz_days_left);

    let mut weekday = date.weekday().num_days_from_monday();
    if weekday >= 5 {
        num_days += u64::from(7 - weekday);
        weekday = 0;
    }
    if weekday + biz_days_left >= 5 {
        num_days += 2;
    }
    date.checked_add_days(Days::new(num_days))
}
