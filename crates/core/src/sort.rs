use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entry::{Directive, DirectiveKind};

/// Priority of each directive kind among entries sharing a date; lower sorts
/// first. Callers that need a different order pass their own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub open: i8,
    pub balance: i8,
    pub transaction: i8,
    pub document: i8,
    pub close: i8,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder {
            open: -2,
            balance: -1,
            transaction: 0,
            document: 1,
            close: 2,
        }
    }
}

impl SortOrder {
    pub fn priority(&self, kind: DirectiveKind) -> i8 {
        match kind {
            DirectiveKind::Open => self.open,
            DirectiveKind::Balance => self.balance,
            DirectiveKind::Transaction => self.transaction,
            DirectiveKind::Document => self.document,
            DirectiveKind::Close => self.close,
        }
    }

    pub fn key(&self, entry: &Directive) -> (NaiveDate, i8, usize) {
        (entry.date(), self.priority(entry.kind()), entry.meta().lineno)
    }
}

/// Stable sort by `(date, kind priority, line number)`.
pub fn sort_entries(entries: &mut [Directive], order: &SortOrder) {
    entries.sort_by_key(|entry| order.key(entry));
}
