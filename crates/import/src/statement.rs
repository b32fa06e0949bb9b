use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of a bank or credit-card statement.
///
/// `amount` carries the sign the ledger posting will have. `balance` is the
/// running balance as printed on the statement, positive in the natural
/// sense; the account sign is applied when it is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRow {
    pub line_number: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub balance: Decimal,
}

impl StatementRow {
    pub fn new(
        line_number: usize,
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        balance: Decimal,
    ) -> Self {
        StatementRow {
            line_number,
            date,
            description: description.into(),
            amount,
            balance,
        }
    }
}
