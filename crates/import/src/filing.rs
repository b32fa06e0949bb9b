//! Importers that only file documents.
//!
//! A filing importer never opens the file. Its name alone identifies it and
//! tells the end date of the period it covers, through `year`, `month` and
//! `day` capture groups of the filename pattern.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use reckon_core::period::enclose_date;
use reckon_core::{month_number, AccountType, FirstDay};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::importer::{base_name, filename_regex, renamed, Extraction, ImportConfigError, Importer};

/// Documents with a known naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingFormat {
    /// American Express monthly statements, `Statement_Mar 2016.pdf`.
    AmexPdf,
}

impl FilingFormat {
    pub fn name(self) -> &'static str {
        match self {
            FilingFormat::AmexPdf => "American Express PDF",
        }
    }

    pub fn filename_pattern(self) -> &'static str {
        match self {
            FilingFormat::AmexPdf => {
                r"Statement_(?P<month>Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) (?P<year>\d{4})\.pdf$"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingConfig {
    pub account: String,
    #[serde(default)]
    pub basename: Option<String>,
    /// First day of the billing period, used when the name has no day.
    #[serde(default = "default_first_day")]
    pub first_day: FirstDay,
    /// Matched against the start of the file's base name. Overrides the
    /// pattern of `format`.
    #[serde(default)]
    pub filename_pattern: Option<String>,
    #[serde(default)]
    pub format: Option<FilingFormat>,
}

fn default_first_day() -> FirstDay {
    FirstDay::FIRST
}

impl FilingConfig {
    pub fn new(account: impl Into<String>, filename_pattern: impl Into<String>) -> Self {
        FilingConfig {
            account: account.into(),
            basename: None,
            first_day: FirstDay::FIRST,
            filename_pattern: Some(filename_pattern.into()),
            format: None,
        }
    }
}

#[derive(Debug)]
pub struct FilingImporter {
    account: String,
    basename: Option<String>,
    first_day: FirstDay,
    filename_re: Regex,
    format: Option<FilingFormat>,
    today: NaiveDate,
}

impl FilingImporter {
    pub fn new(config: &FilingConfig) -> Result<Self, ImportConfigError> {
        Self::as_of(config, chrono::Local::now().date_naive())
    }

    /// Like [`FilingImporter::new`], with `today` standing in for a year or
    /// month missing from a filename.
    pub fn as_of(config: &FilingConfig, today: NaiveDate) -> Result<Self, ImportConfigError> {
        if AccountType::of(&config.account).is_none() {
            return Err(ImportConfigError::InvalidAccount(config.account.clone()));
        }
        let pattern = config
            .filename_pattern
            .as_deref()
            .or(config.format.map(FilingFormat::filename_pattern))
            .ok_or_else(|| ImportConfigError::MissingPattern(config.account.clone()))?;

        Ok(FilingImporter {
            account: config.account.clone(),
            basename: config.basename.clone(),
            first_day: config.first_day,
            filename_re: filename_regex(pattern)?,
            format: config.format,
            today,
        })
    }

    /// The document date spelled out by the filename, or the last day of the
    /// billing period of the named month.
    fn date_from(&self, captures: &Captures<'_>) -> Option<NaiveDate> {
        let year = match captures.name("year") {
            Some(year) => year.as_str().parse().ok()?,
            None => self.today.year(),
        };
        let month = match captures.name("month") {
            Some(month) => month_number(month.as_str())?,
            None => self.today.month(),
        };
        match captures.name("day") {
            Some(day) => NaiveDate::from_ymd_opt(year, month, day.as_str().parse().ok()?),
            None => {
                let first_of_month = NaiveDate::from_ymd_opt(year, month, 1)?;
                Some(enclose_date(first_of_month, self.first_day).end)
            }
        }
    }
}

impl Importer for FilingImporter {
    fn name(&self) -> String {
        let kind = self.format.map_or("Filing", FilingFormat::name);
        format!("{}: \"{}\"", kind, self.account)
    }

    fn identify(&self, path: &Path) -> bool {
        self.filename_re.is_match(base_name(path))
    }

    fn file_account(&self, _path: &Path) -> &str {
        &self.account
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        Some(renamed(self.basename.as_ref()?, path))
    }

    fn file_date(&self, path: &Path) -> Option<NaiveDate> {
        let captures = self.filename_re.captures(base_name(path))?;
        let date = self.date_from(&captures);
        if date.is_none() {
            tracing::warn!("{}: no valid date in the file name", path.display());
        }
        date
    }

    fn extract(&self, path: &Path) -> Extraction {
        tracing::warn!(
            "Cannot extract entries from file '{}'. Please use a proper importer and data format",
            path.display()
        );
        Extraction::default()
    }
}
