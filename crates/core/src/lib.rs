pub mod account;
pub mod dates;
pub mod diagnostic;
pub mod entry;
pub mod link;
pub mod money;
pub mod period;
pub mod render;
pub mod sort;

pub use account::{has_component, AccountSign, AccountType};
pub use dates::{add_biz_days, month_number};
pub use diagnostic::{Diagnostic, Severity};
pub use entry::{Balance, Close, Directive, DirectiveKind, Document, Flag, Meta, Open, Posting, Transaction};
pub use link::LinkNames;
pub use money::{same_sign, Amount};
pub use period::{DateRange, FirstDay, PeriodError};
pub use sort::{sort_entries, SortOrder};
