use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the components of an account name.
pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Assets => write!(f, "Assets"),
            AccountType::Liabilities => write!(f, "Liabilities"),
            AccountType::Equity => write!(f, "Equity"),
            AccountType::Income => write!(f, "Income"),
            AccountType::Expenses => write!(f, "Expenses"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assets" => Ok(AccountType::Assets),
            "Liabilities" => Ok(AccountType::Liabilities),
            "Equity" => Ok(AccountType::Equity),
            "Income" => Ok(AccountType::Income),
            "Expenses" => Ok(AccountType::Expenses),
            other => Err(format!("Unknown account type: '{other}'")),
        }
    }
}

impl AccountType {
    /// The type of an account, read from its root component.
    pub fn of(account: &str) -> Option<Self> {
        account.split(SEPARATOR).next()?.parse().ok()
    }

    /// The sign of the balance an account of this type normally carries.
    pub fn sign(self) -> AccountSign {
        match self {
            AccountType::Assets | AccountType::Expenses => AccountSign::Positive,
            AccountType::Liabilities | AccountType::Equity | AccountType::Income => {
                AccountSign::Negative
            }
        }
    }
}

/// Sign convention used to turn a balance printed on a statement (always
/// positive in the natural sense) into the balance of the ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountSign {
    #[default]
    Positive,
    Negative,
}

impl AccountSign {
    /// Sign for an account name; unknown roots count as positive.
    pub fn of(account: &str) -> Self {
        AccountType::of(account)
            .map(AccountType::sign)
            .unwrap_or_default()
    }

    pub fn apply(self, number: Decimal) -> Decimal {
        match self {
            AccountSign::Positive => number,
            AccountSign::Negative => -number,
        }
    }
}

impl fmt::Display for AccountSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountSign::Positive => write!(f, "+1"),
            AccountSign::Negative => write!(f, "-1"),
        }
    }
}

/// Whether `component` is one of the `:`-separated components of `account`.
pub fn has_component(account: &str, component: &str) -> bool {
    account.split(SEPARATOR).any(|c| c == component)
}
