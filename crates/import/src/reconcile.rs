//! Recovers the chronological order of statement rows from their running
//! balances.
//!
//! Statements are exported newest-first, oldest-first, or with same-day
//! entries in arbitrary order. Given rows in ascending date order (any
//! order within a date), [`reconcile`] finds the order in which each row's
//! balance equals the previous balance plus the row's amount.

use reckon_core::AccountSign;
use rust_decimal::Decimal;

use crate::statement::StatementRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The rows in balance-consistent order, or the input order on failure.
    pub rows: Vec<StatementRow>,
    /// Line number of the first row that could not be placed.
    pub error_line: Option<usize>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.error_line.is_none()
    }
}

/// Order `rows` so that the running balances agree with the amounts.
///
/// Every row sharing the earliest date is tried in turn as the opening
/// transaction. When none works the rows come back untouched along with the
/// line of the first unplaced row of the last attempt.
pub fn reconcile(rows: Vec<StatementRow>, sign: AccountSign) -> Reconciliation {
    let Some(first_date) = rows.iter().map(|r| r.date).min() else {
        return Reconciliation {
            rows,
            error_line: None,
        };
    };
    if rows.len() == 1 {
        return Reconciliation {
            rows,
            error_line: None,
        };
    }

    let openings: Vec<Decimal> = rows
        .iter()
        .filter(|r| r.date == first_date)
        .map(|r| sign.apply(r.balance) - r.amount)
        .collect();

    let mut error_line = None;
    for opening in openings {
        match place_rows(&rows, sign, opening) {
            Ok(order) => {
                let mut slots: Vec<Option<StatementRow>> = rows.into_iter().map(Some).collect();
                let rows = order.into_iter().filter_map(|i| slots[i].take()).collect();
                return Reconciliation {
                    rows,
                    error_line: None,
                };
            }
            Err(line) => {
                tracing::debug!(%opening, line, "opening balance rejected");
                error_line = Some(line);
            }
        }
    }

    Reconciliation { rows, error_line }
}

/// Greedy placement with retry from one opening balance. Rows that do not
/// chain yet are set aside and pushed back once the chain advances; a set-aside
/// row can only wait for rows of its own date.
///
/// Returns row indices in placement order, or the line number of the first
/// row left aside.
fn place_rows(rows: &[StatementRow], sign: AccountSign, opening: Decimal) -> Result<Vec<usize>, usize> {
    let mut stack: Vec<usize> = (0..rows.len()).rev().collect();
    let mut deferred: Vec<usize> = Vec::new();
    let mut placed = Vec::with_capacity(rows.len());
    let mut prev_balance = opening;

    while let Some(i) = stack.pop() {
        let row = &rows[i];
        let balance = sign.apply(row.balance);
        if prev_balance + row.amount == balance {
            placed.push(i);
            prev_balance = balance;
            stack.append(&mut deferred);
        } else {
            if let Some(&first) = deferred.first() {
                if rows[first].date != row.date {
                    break;
                }
            }
            deferred.push(i);
        }
    }

    if placed.len() == rows.len() {
        Ok(placed)
    } else {
        Err(deferred.first().map_or(0, |&i| rows[i].line_number))
    }
}
