//! Pairing of transfers through clearing accounts.
//!
//! Each leg of a transfer posts to a clearing account; the two legs carry
//! opposite amounts and exactly one of them also posts to the clearing
//! account's main account. Matched legs are tagged and linked, legs without
//! a partner inside the matching window are marked pending.

use std::collections::{BTreeSet, HashMap};

use chrono::{Days, NaiveDate};
use clap::Parser;
use reckon_core::{add_biz_days, Diagnostic, Directive, Flag, LinkNames, SortOrder, Transaction};

use crate::config::{parse_account_pair, parse_options, AccountPair, ConfigError};
use crate::{PluginContext, PluginOutput};

/// Upper bound accepted for `--max_days`, ten years.
const MAX_DAYS_LIMIT: i64 = 3650;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "clear_transactions",
    about = "Match transfers through clearing accounts and tag them as cleared or pending.",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct ClearOptions {
    /// Flag pending transactions with '!'.
    #[arg(long = "flag_pending")]
    pub flag_pending: bool,
    /// Tag added to matched transactions.
    #[arg(long = "cleared_tag", value_name = "TAG", default_value = "CLEARED")]
    pub cleared_tag: String,
    /// Tag added to transactions still waiting for their other leg.
    #[arg(long = "pending_tag", value_name = "TAG", default_value = "PENDING")]
    pub pending_tag: String,
    /// Transactions with this tag are left alone.
    #[arg(long = "ignored_tag", value_name = "TAG", default_value = "PRE_CLEARED")]
    pub ignored_tag: String,
    #[arg(long = "link_prefix", value_name = "PREFIX", default_value = "cleared")]
    pub link_prefix: String,
    /// Largest gap in days between the two legs of a transfer.
    #[arg(
        long = "max_days",
        value_name = "N",
        default_value_t = 7,
        value_parser = clap::value_parser!(u32).range(0..=MAX_DAYS_LIMIT)
    )]
    pub max_days: u32,
    /// Count only business days towards max_days.
    #[arg(long = "skip_weekends")]
    pub skip_weekends: bool,
    #[arg(
        value_name = "CLEARING_ACCOUNT,MAIN_ACCOUNT",
        required = true,
        num_args = 1..,
        value_parser = parse_account_pair
    )]
    pub account_pairs: Vec<AccountPair>,
}

impl ClearOptions {
    /// Reject account pairs naming accounts the ledger never uses.
    fn check_accounts(&self, entries: &[Directive]) -> Result<(), ConfigError> {
        let known: BTreeSet<&str> = entries.iter().flat_map(Directive::accounts).collect();
        for pair in &self.account_pairs {
            for account in [&pair.clearing, &pair.main] {
                if !known.contains(account.as_str()) {
                    return Err(ConfigError::invalid::<ClearOptions>(
                        pair.to_string(),
                        format!("argument {pair}: account '{account}' does not exist"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A transaction taking part in clearing, and the posting that made it so.
#[derive(Debug, Clone, Copy)]
struct ClearingPosting<'a> {
    index: usize,
    txn: &'a Transaction,
    posting: usize,
}

#[derive(Debug, Clone)]
pub struct Clearer {
    options: ClearOptions,
    main_accounts: HashMap<String, String>,
    sort_order: SortOrder,
}

impl Clearer {
    pub fn new(options: ClearOptions, sort_order: SortOrder) -> Self {
        let main_accounts = options
            .account_pairs
            .iter()
            .map(|pair| (pair.clearing.clone(), pair.main.clone()))
            .collect();
        Clearer {
            options,
            main_accounts,
            sort_order,
        }
    }

    /// Last date on which a partner for a leg dated `date` is accepted.
    /// Windows running past the calendar end at its last date.
    pub fn deadline(&self, date: NaiveDate) -> NaiveDate {
        let deadline = if self.options.skip_weekends {
            add_biz_days(date, self.options.max_days)
        } else {
            date.checked_add_days(Days::new(u64::from(self.options.max_days)))
        };
        deadline.unwrap_or(NaiveDate::MAX)
    }

    /// Replacement transactions keyed by their index in `entries`.
    pub fn clear(&self, entries: &[Directive]) -> (HashMap<usize, Transaction>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut groups: Vec<(&str, Vec<ClearingPosting<'_>>)> = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let Some(txn) = entry.as_transaction() else {
                continue;
            };
            if txn.has_tag(&self.options.ignored_tag) {
                continue;
            }
            let mut clearing = txn
                .postings
                .iter()
                .enumerate()
                .filter(|(_, p)| self.main_accounts.contains_key(&p.account));
            let Some((posting, first)) = clearing.next() else {
                continue;
            };
            if clearing.next().is_some() {
                tracing::warn!("{}: multiple clearing postings", txn.meta);
                diagnostics.push(Diagnostic::error(
                    txn.meta.clone(),
                    format!("found entry with multiple postings to clearing accounts; only clearing {}", first.account),
                ));
            }
            let item = ClearingPosting { index, txn, posting };
            match groups.iter_mut().find(|(account, _)| *account == first.account) {
                Some((_, group)) => group.push(item),
                None => groups.push((first.account.as_str(), vec![item])),
            }
        }

        let mut links = LinkNames::new(Some(self.options.link_prefix.as_str()));
        let mut modified = HashMap::new();
        for (clearing_account, mut group) in groups {
            group.sort_by_key(|item| (self.sort_order.key(&entries[item.index]), item.index));
            let main_account = self.main_accounts.get(clearing_account).map_or("", String::as_str);
            self.clear_group(&group, main_account, &mut links, &mut modified);
        }
        (modified, diagnostics)
    }

    fn clear_group(
        &self,
        group: &[ClearingPosting<'_>],
        main_account: &str,
        links: &mut LinkNames,
        modified: &mut HashMap<usize, Transaction>,
    ) {
        for (i, item) in group.iter().enumerate() {
            if modified.contains_key(&item.index) {
                continue;
            }
            let deadline = self.deadline(item.txn.date);
            let partner = group[i + 1..]
                .iter()
                .take_while(|other| other.txn.date <= deadline)
                .filter(|other| !modified.contains_key(&other.index))
                .find(|other| is_match(item, other, main_account));

            match partner {
                Some(other) => {
                    let link = links.next().unwrap_or_default();
                    tracing::debug!("{}: cleared with {} as {}", item.txn.meta, other.txn.meta, link);
                    modified.insert(item.index, self.cleared(item.txn, &link));
                    modified.insert(other.index, self.cleared(other.txn, &link));
                }
                None => {
                    tracing::debug!("{}: no match by {}, pending", item.txn.meta, deadline);
                    modified.insert(item.index, self.pending(item.txn));
                }
            }
        }
    }

    fn cleared(&self, txn: &Transaction, link: &str) -> Transaction {
        txn.clone().with_tag(&self.options.cleared_tag).with_link(link)
    }

    fn pending(&self, txn: &Transaction) -> Transaction {
        let mut txn = txn.clone().with_tag(&self.options.pending_tag);
        if self.options.flag_pending {
            txn.flag = Flag::Warning;
        }
        txn
    }
}

fn is_match(a: &ClearingPosting<'_>, b: &ClearingPosting<'_>, main_account: &str) -> bool {
    let opposite = match (a.txn.posting_units(a.posting), b.txn.posting_units(b.posting)) {
        (Some(x), Some(y)) => x == -y,
        _ => false,
    };
    let main_legs = a.txn.postings_to(main_account).count() + b.txn.postings_to(main_account).count();
    opposite && main_legs == 1
}

/// Plugin entry point. Entries keep their positions; cleared and pending
/// transactions are replaced in place.
pub fn clear_transactions(entries: Vec<Directive>, config: &str, ctx: &PluginContext) -> PluginOutput {
    let options = match parse_options::<ClearOptions>(config).and_then(|options| {
        options.check_accounts(&entries)?;
        Ok(options)
    }) {
        Ok(options) => options,
        Err(err) => {
            tracing::error!("clear_transactions: {}", err.message);
            return (entries, vec![err.to_diagnostic(&ctx.filename)]);
        }
    };

    let (mut modified, diagnostics) = Clearer::new(options, ctx.sort_order).clear(&entries);
    tracing::info!("clear_transactions: {} transactions updated", modified.len());
    let entries = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| modified.remove(&index).map_or(entry, Directive::Transaction))
        .collect();
    (entries, diagnostics)
}
