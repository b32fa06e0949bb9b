use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Days, NaiveDate};
use reckon_core::period::{greatest_start, lowest_end, next_month, prev_month};
use reckon_core::{
    sort_entries, AccountSign, AccountType, Amount, Balance, Diagnostic, Directive, FirstDay, Meta,
    Posting, SortOrder, Transaction,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completer::CompleterOptions;
use crate::csv::{read_statement, StatementProfile};
use crate::filing::FilingConfig;
use crate::reconcile::reconcile;
use crate::statement::StatementRow;

#[derive(Error, Debug)]
pub enum ImportConfigError {
    #[error("Invalid filename pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid importer configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Account {0:?} does not start with a known account type")]
    InvalidAccount(String),
    #[error("Filing importer for {0:?} needs a filename pattern or a format")]
    MissingPattern(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementFormat {
    #[default]
    TdCanadaTrust,
}

impl StatementFormat {
    pub fn profile(self) -> StatementProfile {
        match self {
            StatementFormat::TdCanadaTrust => StatementProfile::td_canada_trust(),
        }
    }
}

/// History used to complete the extracted transactions. `history` is a JSON
/// array of directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleterConfig {
    pub history: PathBuf,
    #[serde(flatten)]
    pub options: CompleterOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub account: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Name given to filed statements, without extension.
    #[serde(default)]
    pub basename: Option<String>,
    /// First day of the monthly statement period.
    #[serde(default)]
    pub first_day: Option<FirstDay>,
    /// Matched against the start of the file's base name.
    #[serde(default)]
    pub filename_pattern: Option<String>,
    #[serde(default)]
    pub format: StatementFormat,
    /// Overrides `format` with explicit columns.
    #[serde(default)]
    pub profile: Option<StatementProfile>,
    #[serde(default)]
    pub completer: Option<CompleterConfig>,
}

fn default_currency() -> String {
    "CAD".to_string()
}

impl ImporterConfig {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            currency: default_currency(),
            basename: None,
            first_day: None,
            filename_pattern: None,
            format: StatementFormat::default(),
            profile: None,
            completer: None,
        }
    }
}

/// Top-level importer configuration file: `[[importer]]` tables for
/// statements and `[[filing]]` tables for documents that are only filed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportersConfig {
    #[serde(default, rename = "importer")]
    pub importers: Vec<ImporterConfig>,
    #[serde(default, rename = "filing")]
    pub filings: Vec<FilingConfig>,
}

impl ImportersConfig {
    pub fn from_toml(s: &str) -> Result<Self, ImportConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// The operations a statement-processing command runs against a file.
pub trait Importer: Send + Sync + std::fmt::Debug {
    fn name(&self) -> String;

    /// Whether this importer handles the file at `path`.
    fn identify(&self, path: &Path) -> bool;

    fn file_account(&self, path: &Path) -> &str;

    /// New name of the filed document, keeping its extension.
    fn file_name(&self, path: &Path) -> Option<String>;

    fn file_date(&self, path: &Path) -> Option<NaiveDate>;

    fn extract(&self, path: &Path) -> Extraction;
}

/// `basename` plus the extension of `path`.
pub(crate) fn renamed(basename: &str, path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{basename}.{ext}"),
        None => basename.to_string(),
    }
}

/// A pattern matched against the start of a file's base name.
pub(crate) fn filename_regex(pattern: &str) -> Result<Regex, ImportConfigError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|source| ImportConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

pub(crate) fn base_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// A stage applied to extracted entries.
pub trait EntryFilter: Send + Sync {
    fn filter(&self, entries: Vec<Directive>) -> Vec<Directive>;
}

impl<F> EntryFilter for F
where
    F: Fn(Vec<Directive>) -> Vec<Directive> + Send + Sync,
{
    fn filter(&self, entries: Vec<Directive>) -> Vec<Directive> {
        self(entries)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub entries: Vec<Directive>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Imports CSV statements of one account.
///
/// Rows are put in an order agreeing with their running balances. When that
/// order exists, balance assertions are derived from the balances; otherwise
/// only the transactions are extracted.
pub struct StatementImporter {
    account: String,
    currency: String,
    basename: Option<String>,
    first_day: Option<FirstDay>,
    account_sign: AccountSign,
    filename_re: Regex,
    profile: StatementProfile,
    filters: Vec<Box<dyn EntryFilter>>,
    parsed: Mutex<HashMap<PathBuf, Vec<StatementRow>>>,
}

impl StatementImporter {
    pub fn new(config: &ImporterConfig) -> Result<Self, ImportConfigError> {
        if AccountType::of(&config.account).is_none() {
            return Err(ImportConfigError::InvalidAccount(config.account.clone()));
        }
        let filename_re = filename_regex(config.filename_pattern.as_deref().unwrap_or(".*"))?;
        let profile = config
            .profile
            .clone()
            .unwrap_or_else(|| config.format.profile());

        Ok(Self {
            account: config.account.clone(),
            currency: config.currency.to_uppercase(),
            basename: config.basename.clone(),
            first_day: config.first_day,
            account_sign: AccountSign::of(&config.account),
            filename_re,
            profile,
            filters: Vec::new(),
            parsed: Mutex::new(HashMap::new()),
        })
    }

    /// Run extracted entries through `filter` after the filters already added.
    pub fn with_filter(mut self, filter: impl EntryFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Balance assertions for rows in reconciled order. Without a first day,
    /// one assertion the day after the last row. With one, an assertion at the
    /// start of every period following a row, walking back from the latest.
    fn balance_entries(&self, filename: &str, rows: &[StatementRow]) -> Vec<Directive> {
        let Some(last) = rows.last() else {
            return Vec::new();
        };
        let Some(first_day) = self.first_day else {
            let date = last.date + Days::new(1);
            return vec![self.balance(filename, last, date)];
        };

        let mut balances = Vec::new();
        let mut balance_date = next_month(greatest_start(last.date, first_day));
        for row in rows.iter().rev() {
            while row.date < balance_date {
                balances.push(self.balance(filename, row, balance_date));
                balance_date = prev_month(balance_date);
            }
        }
        balances
    }

    fn balance(&self, filename: &str, row: &StatementRow, date: NaiveDate) -> Directive {
        Balance {
            meta: Meta::new(filename, row.line_number),
            date,
            account: self.account.clone(),
            amount: Amount::new(self.account_sign.apply(row.balance), self.currency.as_str()),
        }
        .into()
    }

    /// Parsed rows of `path`, read once per importer.
    fn rows(&self, path: &Path) -> Vec<StatementRow> {
        if let Some(rows) = self.parsed.lock().ok().and_then(|cache| cache.get(path).cloned()) {
            return rows;
        }
        let rows = read_statement(path, &self.profile);
        if let Ok(mut cache) = self.parsed.lock() {
            cache.insert(path.to_path_buf(), rows.clone());
        }
        rows
    }
}

impl Importer for StatementImporter {
    fn name(&self) -> String {
        format!("{}: \"{}\"", self.profile.name, self.account)
    }

    fn identify(&self, path: &Path) -> bool {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        is_csv && self.filename_re.is_match(base_name(path))
    }

    fn file_account(&self, _path: &Path) -> &str {
        &self.account
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        Some(renamed(self.basename.as_ref()?, path))
    }

    /// Date of the latest row, or the end of the statement period containing
    /// it when a first day is configured.
    fn file_date(&self, path: &Path) -> Option<NaiveDate> {
        let date = self.rows(path).iter().map(|row| row.date).max()?;
        Some(match self.first_day {
            Some(first_day) => lowest_end(date, first_day),
            None => date,
        })
    }

    fn extract(&self, path: &Path) -> Extraction {
        let filename = path.display().to_string();
        let mut rows = self.rows(path);
        if rows.is_empty() {
            return Extraction::default();
        }
        rows.sort_by_key(|row| row.date);
        let reconciliation = reconcile(rows, self.account_sign);

        let mut entries: Vec<Directive> = reconciliation
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                // The position in the reconciled order keeps same-day entries
                // in balance order once sorted.
                let txn = Transaction::new(
                    Meta::new(filename.as_str(), index),
                    row.date,
                    row.description.as_str(),
                )
                .with_posting(Posting::new(
                    self.account.as_str(),
                    Amount::new(row.amount, self.currency.as_str()),
                ));
                Directive::Transaction(txn)
            })
            .collect();

        let mut diagnostics = Vec::new();
        match reconciliation.error_line {
            Some(line) => {
                let diagnostic = Diagnostic::warning(
                    Meta::new(filename.as_str(), line),
                    "cannot reorder rows to agree with balance values",
                );
                tracing::warn!("{diagnostic}");
                diagnostics.push(diagnostic);
            }
            None => {
                entries.extend(self.balance_entries(&filename, &reconciliation.rows));
            }
        }

        sort_entries(&mut entries, &SortOrder::default());
        for filter in &self.filters {
            entries = filter.filter(entries);
        }
        tracing::info!(file = %filename, entries = entries.len(), "extracted statement");
        Extraction {
            entries,
            diagnostics,
        }
    }
}

impl std::fmt::Debug for StatementImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementImporter")
            .field("account", &self.account)
            .field("currency", &self.currency)
            .field("first_day", &self.first_day)
            .field("filters", &self.filters.len())
            .finish()
    }
}
