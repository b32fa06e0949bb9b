use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::money::Amount;

/// Source location of a directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meta {
    pub filename: String,
    pub lineno: usize,
}

impl Meta {
    pub fn new(filename: impl Into<String>, lineno: usize) -> Self {
        Meta {
            filename: filename.into(),
            lineno,
        }
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.lineno)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    /// `*`, a completed transaction.
    #[default]
    Okay,
    /// `!`, a transaction that needs review.
    Warning,
    Other(char),
}

impl From<char> for Flag {
    fn from(c: char) -> Self {
        match c {
            '*' => Flag::Okay,
            '!' => Flag::Warning,
            other => Flag::Other(other),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Okay => write!(f, "*"),
            Flag::Warning => write!(f, "!"),
            Flag::Other(c) => write!(f, "{c}"),
        }
    }
}

/// One leg of a transaction. `units` is `None` when the amount is left for
/// the ledger to interpolate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    pub units: Option<Amount>,
    pub cost: Option<Amount>,
    pub price: Option<Amount>,
    pub flag: Option<Flag>,
}

impl Posting {
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Posting {
            account: account.into(),
            units: Some(units),
            cost: None,
            price: None,
            flag: None,
        }
    }

    pub fn elided(account: impl Into<String>) -> Self {
        Posting {
            account: account.into(),
            units: None,
            cost: None,
            price: None,
            flag: None,
        }
    }

    pub fn with_flag(mut self, flag: Option<Flag>) -> Self {
        self.flag = flag;
        self
    }

    pub fn has_conversion(&self) -> bool {
        self.cost.is_some() || self.price.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub meta: Meta,
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn new(meta: Meta, date: NaiveDate, narration: impl Into<String>) -> Self {
        Transaction {
            meta,
            date,
            flag: Flag::Okay,
            payee: None,
            narration: narration.into(),
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            postings: Vec::new(),
        }
    }

    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.links.insert(link.to_string());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Payee and narration joined by a space and trimmed.
    pub fn description(&self) -> String {
        match &self.payee {
            Some(payee) => format!("{} {}", payee, self.narration).trim().to_string(),
            None => self.narration.trim().to_string(),
        }
    }

    pub fn postings_to<'a>(&'a self, account: &'a str) -> impl Iterator<Item = &'a Posting> {
        self.postings.iter().filter(move |p| p.account == account)
    }

    /// Units of the posting at `index`. An elided amount is inferred when it
    /// is the only one missing and every other posting shares its currency.
    pub fn posting_units(&self, index: usize) -> Option<Amount> {
        let posting = self.postings.get(index)?;
        if let Some(units) = &posting.units {
            return Some(units.clone());
        }
        let mut currency: Option<&str> = None;
        let mut sum = Decimal::ZERO;
        for (i, other) in self.postings.iter().enumerate() {
            if i == index {
                continue;
            }
            let units = other.units.as_ref()?;
            match currency {
                Some(c) if c != units.currency => return None,
                _ => currency = Some(units.currency.as_str()),
            }
            sum += units.number;
        }
        currency.map(|c| Amount::new(-sum, c))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
}

/// Assertion of an account balance at the start of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub meta: Meta,
    pub date: NaiveDate,
    pub account: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Open,
    Close,
    Balance,
    Transaction,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Open(Open),
    Close(Close),
    Balance(Balance),
    Transaction(Transaction),
    Document(Document),
}

impl Directive {
    pub fn date(&self) -> NaiveDate {
        match self {
            Directive::Open(d) => d.date,
            Directive::Close(d) => d.date,
            Directive::Balance(d) => d.date,
            Directive::Transaction(d) => d.date,
            Directive::Document(d) => d.date,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            Directive::Open(d) => &d.meta,
            Directive::Close(d) => &d.meta,
            Directive::Balance(d) => &d.meta,
            Directive::Transaction(d) => &d.meta,
            Directive::Document(d) => &d.meta,
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Open(_) => DirectiveKind::Open,
            Directive::Close(_) => DirectiveKind::Close,
            Directive::Balance(_) => DirectiveKind::Balance,
            Directive::Transaction(_) => DirectiveKind::Transaction,
            Directive::Document(_) => DirectiveKind::Document,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Directive::Transaction(txn) => Some(txn),
            _ => None,
        }
    }

    /// Every account the directive refers to.
    pub fn accounts(&self) -> Vec<&str> {
        match self {
            Directive::Open(d) => vec![d.account.as_str()],
            Directive::Close(d) => vec![d.account.as_str()],
            Directive::Balance(d) => vec![d.account.as_str()],
            Directive::Document(d) => vec![d.account.as_str()],
            Directive::Transaction(d) => d.postings.iter().map(|p| p.account.as_str()).collect(),
        }
    }
}

impl From<Transaction> for Directive {
    fn from(txn: Transaction) -> Self {
        Directive::Transaction(txn)
    }
}

impl From<Balance> for Directive {
    fn from(balance: Balance) -> Self {
        Directive::Balance(balance)
    }
}

impl From<Open> for Directive {
    fn from(open: Open) -> Self {
        Directive::Open(open)
    }
}
