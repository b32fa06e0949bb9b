use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::statement::StatementRow;

/// Column positions of a statement export. Amounts come either from a single
/// signed `amount_column` or from a `debit_column`/`credit_column` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date_column: usize,
    pub description_column: usize,
    #[serde(default)]
    pub amount_column: Option<usize>,
    #[serde(default)]
    pub debit_column: Option<usize>,
    #[serde(default)]
    pub credit_column: Option<usize>,
    pub balance_column: usize,
    pub date_format: String,
    /// Debits take money out of the account and become negative amounts.
    #[serde(default = "default_true")]
    pub debit_is_withdrawal: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementProfile {
    pub name: String,
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl StatementProfile {
    /// TD Canada Trust exports: no header, `date,description,withdrawal,deposit,balance`.
    pub fn td_canada_trust() -> Self {
        Self {
            name: "TD Canada Trust".to_string(),
            mapping: ColumnMapping {
                date_column: 0,
                description_column: 1,
                amount_column: None,
                debit_column: Some(2),
                credit_column: Some(3),
                balance_column: 4,
                date_format: "%m/%d/%Y".to_string(),
                debit_is_withdrawal: true,
            },
            has_header: false,
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Missing column {column}")]
    MissingColumn { line: usize, column: usize },
    #[error("Invalid date {value:?} (expected {format})")]
    InvalidDate {
        line: usize,
        value: String,
        format: String,
    },
    #[error("Invalid amount: {value:?}")]
    InvalidAmount { line: usize, value: String },
    #[error("Invalid balance: {value:?}")]
    InvalidBalance { line: usize, value: String },
    #[error("Profile has no amount column")]
    NoAmountColumn,
}

impl CsvError {
    /// Source line the error refers to, when there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            CsvError::MissingColumn { line, .. }
            | CsvError::InvalidDate { line, .. }
            | CsvError::InvalidAmount { line, .. }
            | CsvError::InvalidBalance { line, .. } => Some(*line),
            CsvError::CsvError(err) => err.position().map(|p| p.line() as usize),
            CsvError::IoError(_) | CsvError::NoAmountColumn => None,
        }
    }
}

/// Parse every record of a statement export. Rows keep the line on which
/// they start in the source.
pub fn parse_statement<R: Read>(
    data: R,
    profile: &StatementProfile,
) -> Result<Vec<StatementRow>, CsvError> {
    let mapping = &profile.mapping;
    if mapping.amount_column.is_none()
        && mapping.debit_column.is_none()
        && mapping.credit_column.is_none()
    {
        return Err(CsvError::NoAmountColumn);
    }

    let delimiter = profile.delimiter.as_bytes().first().copied().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(profile.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let field = |column: usize| {
            record
                .get(column)
                .ok_or(CsvError::MissingColumn { line, column })
        };

        let raw_date = field(mapping.date_column)?.trim();
        let date = NaiveDate::parse_from_str(raw_date, &mapping.date_format).map_err(|_| {
            CsvError::InvalidDate {
                line,
                value: raw_date.to_string(),
                format: mapping.date_format.clone(),
            }
        })?;

        let description = field(mapping.description_column)?.to_string();

        let amount = if let Some(col) = mapping.amount_column {
            let raw = field(col)?;
            parse_amount(raw).ok_or_else(|| CsvError::InvalidAmount {
                line,
                value: raw.to_string(),
            })?
        } else {
            let optional = |col: Option<usize>| -> Result<Option<Decimal>, CsvError> {
                let Some(col) = col else { return Ok(None) };
                let value = record.get(col).unwrap_or_default();
                if value.trim().is_empty() {
                    return Ok(None);
                }
                parse_amount(value).map(Some).ok_or_else(|| CsvError::InvalidAmount {
                    line,
                    value: value.to_string(),
                })
            };
            let debit = optional(mapping.debit_column)?;
            let credit = optional(mapping.credit_column)?;
            let debit_sign = if mapping.debit_is_withdrawal {
                Decimal::NEGATIVE_ONE
            } else {
                Decimal::ONE
            };
            match (debit, credit) {
                (Some(d), _) => debit_sign * d,
                (None, Some(c)) => -debit_sign * c,
                (None, None) => {
                    return Err(CsvError::InvalidAmount {
                        line,
                        value: String::new(),
                    })
                }
            }
        };

        let raw_balance = field(mapping.balance_column)?;
        let balance = parse_amount(raw_balance).ok_or_else(|| CsvError::InvalidBalance {
            line,
            value: raw_balance.to_string(),
        })?;

        rows.push(StatementRow::new(line, date, description, amount, balance));
    }

    Ok(rows)
}

/// Read a statement from disk. Any failure is logged as `file:line: message`
/// and the statement is treated as empty.
pub fn read_statement(path: &Path, profile: &StatementProfile) -> Vec<StatementRow> {
    let result = File::open(path)
        .map_err(CsvError::from)
        .and_then(|file| parse_statement(file, profile));
    match result {
        Ok(rows) => rows,
        Err(err) => {
            match err.line() {
                Some(line) => tracing::error!("{}:{}: {}", path.display(), line, err),
                None => tracing::error!("{}: {}", path.display(), err),
            }
            Vec::new()
        }
    }
}

/// Parse a money value as printed on a statement. Accepts thousands
/// separators, a dollar sign, and accounting parentheses for negatives.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned = s.replace([',', '$', ' '], "");
    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_amount_plain_and_decorated() {
        assert_eq!(parse_amount("123.45"), Some(dec!(123.45)));
        assert_eq!(parse_amount("$99.99"), Some(dec!(99.99)));
        assert_eq!(parse_amount("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_amount("-50.00"), Some(dec!(-50.00)));
        assert_eq!(parse_amount("(75.25)"), Some(dec!(-75.25)));
        assert_eq!(parse_amount(" 0 "), Some(dec!(0)));
    }

    #[test]
    fn parse_amount_keeps_scale() {
        assert_eq!(parse_amount("16.00").map(|d| d.to_string()), Some("16.00".to_string()));
    }

    #[test]
    fn parse_amount_invalid() {
        assert_eq!(parse_amount("not_a_number"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn td_withdrawals_and_deposits() {
        let data = "04/29/2016,CINEPLEX #9172,23.00,,2348.89\n\
                    04/29/2016,CANADA           RIT,,345.24,2694.13\n";
        let rows = parse_statement(data.as_bytes(), &StatementProfile::td_canada_trust()).unwrap();
        assert_eq!(
            rows,
            vec![
                StatementRow::new(1, date(2016, 4, 29), "CINEPLEX #9172", dec!(-23.00), dec!(2348.89)),
                StatementRow::new(
                    2,
                    date(2016, 4, 29),
                    "CANADA           RIT",
                    dec!(345.24),
                    dec!(2694.13)
                ),
            ]
        );
    }

    #[test]
    fn single_amount_column_with_header() {
        let profile = StatementProfile {
            name: "generic".to_string(),
            mapping: ColumnMapping {
                date_column: 0,
                description_column: 1,
                amount_column: Some(2),
                debit_column: None,
                credit_column: None,
                balance_column: 3,
                date_format: "%Y-%m-%d".to_string(),
                debit_is_withdrawal: true,
            },
            has_header: true,
            delimiter: ";".to_string(),
        };
        let data = "date;description;amount;balance\n2024-01-15;AMAZON;-49.99;950.01\n";
        let rows = parse_statement(data.as_bytes(), &profile).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line_number, 2);
        assert_eq!(rows[0].amount, dec!(-49.99));
        assert_eq!(rows[0].balance, dec!(950.01));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let profile = StatementProfile::td_canada_trust();

        let data = "04/01/2016,A,1.00,,10.00\n2016-04-02,B,1.00,,9.00\n";
        let err = parse_statement(data.as_bytes(), &profile).unwrap_err();
        assert!(matches!(err, CsvError::InvalidDate { line: 2, .. }));
        assert_eq!(err.line(), Some(2));

        let data = "04/01/2016,A,abc,,10.00\n";
        let err = parse_statement(data.as_bytes(), &profile).unwrap_err();
        assert!(matches!(err, CsvError::InvalidAmount { line: 1, .. }));

        let data = "04/01/2016,A,1.00,,\n";
        let err = parse_statement(data.as_bytes(), &profile).unwrap_err();
        assert!(matches!(err, CsvError::InvalidBalance { line: 1, .. }));

        let data = "04/01/2016,A,1.00\n";
        let err = parse_statement(data.as_bytes(), &profile).unwrap_err();
        assert!(matches!(err, CsvError::MissingColumn { line: 1, column: 4 }));
    }

    #[test]
    fn read_statement_is_fail_soft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "04/01/2016,A,1.00,,10.00\nnot a date,B,1.00,,9.00\n").unwrap();
        assert!(read_statement(&path, &StatementProfile::td_canada_trust()).is_empty());

        let missing = dir.path().join("missing.csv");
        assert!(read_statement(&missing, &StatementProfile::td_canada_trust()).is_empty());
    }

    #[test]
    fn profile_without_amount_columns_is_rejected() {
        let mut profile = StatementProfile::td_canada_trust();
        profile.mapping.debit_column = None;
        profile.mapping.credit_column = None;
        assert!(matches!(
            parse_statement("".as_bytes(), &profile),
            Err(CsvError::NoAmountColumn)
        ));
    }
}
