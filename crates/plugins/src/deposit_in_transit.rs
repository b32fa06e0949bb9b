//! Deposits in transit.
//!
//! A transfer between two accounts is booked as two transactions, each with
//! one leg posted to an account carrying the DIT component (for instance
//! `Assets:DIT:Checking`). Once both sides are in the ledger the plugin
//! pairs them, either merging them into one transaction or linking them
//! through a connector entry that zeroes the DIT accounts. Legs still
//! waiting for their counterpart are tagged as in transit.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use clap::Parser;
use reckon_core::{
    has_component, sort_entries, Amount, Diagnostic, Directive, Flag, LinkNames, Meta, Open, Posting,
    Transaction,
};
use regex::Regex;
use rust_decimal::Decimal;

use crate::config::{parse_options, parse_regex};
use crate::{PluginContext, PluginOutput};

const PLUGIN_NAME: &str = "deposit_in_transit";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "deposit_in_transit",
    about = "Pair the two legs of transfers booked through DIT accounts.",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct DitOptions {
    /// Account component marking a deposit-in-transit account.
    #[arg(long = "dit_component", value_name = "NAME", default_value = "DIT")]
    pub dit_component: String,
    /// Open DIT accounts on first use when the ledger does not.
    #[arg(long = "auto_open")]
    pub auto_open: bool,
    /// Merge the legs of a transfer completed on a single day.
    #[arg(long = "same_day_merge")]
    pub same_day_merge: bool,
    /// Flag legs still in transit with '!'.
    #[arg(long = "flag_pending")]
    pub flag_pending: bool,
    #[arg(long = "cleared_tag", value_name = "TAG", default_value = "DEPOSITED")]
    pub cleared_tag: String,
    #[arg(long = "pending_tag", value_name = "TAG", default_value = "IN-TRANSIT")]
    pub pending_tag: String,
    #[arg(long = "ignored_tag", value_name = "TAG", default_value = "IGNORED")]
    pub ignored_tag: String,
    /// Prefix of generated links; random UUIDs without it.
    #[arg(long = "link_prefix", value_name = "PREFIX")]
    pub link_prefix: Option<String>,
    /// Do nothing when REGEX matches an argument of the running command.
    #[arg(long = "skip_re", value_name = "REGEX", value_parser = parse_regex)]
    pub skip_re: Option<Regex>,
}

/// A transaction with a DIT posting.
#[derive(Debug, Clone)]
struct Leg {
    txn: Transaction,
    posting: usize,
    units: Option<Amount>,
}

impl Leg {
    fn new(txn: Transaction, posting: usize) -> Self {
        let units = txn.posting_units(posting);
        Leg { txn, posting, units }
    }

    fn dit_posting(&self) -> &Posting {
        &self.txn.postings[self.posting]
    }

    fn other_postings(&self) -> impl Iterator<Item = &Posting> {
        self.txn
            .postings
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.posting)
            .map(|(_, p)| p)
    }

    fn number(&self) -> Decimal {
        self.units.as_ref().map_or(Decimal::ZERO, |u| u.number)
    }
}

#[derive(Debug)]
pub struct DepositInTransit {
    options: DitOptions,
}

impl DepositInTransit {
    pub fn new(options: DitOptions) -> Self {
        DepositInTransit { options }
    }

    /// Entries not involved come back untouched; paired, merged, pending and
    /// auto-opened entries are appended. The caller sorts the result.
    pub fn process(&self, entries: Vec<Directive>) -> PluginOutput {
        let mut added = Vec::new();
        if self.options.auto_open {
            added.extend(self.open_accounts(&entries).into_iter().map(Directive::Open));
        }

        let (legs, mut output, diagnostics) = self.split_entries(entries);
        let (pairs, singles) = pair_legs(legs);
        tracing::info!(
            "{}: {} transfers paired, {} in transit",
            PLUGIN_NAME,
            pairs.len(),
            singles.len()
        );

        let mut links = LinkNames::new(self.options.link_prefix.as_deref());
        for (a, b) in pairs {
            added.extend(self.process_pair(a, b, &mut links).into_iter().map(Directive::Transaction));
        }
        added.extend(singles.into_iter().map(|leg| Directive::Transaction(self.pending(leg))));

        output.extend(added);
        (output, diagnostics)
    }

    /// Open directives for DIT accounts used without being opened, dated at
    /// first use.
    fn open_accounts(&self, entries: &[Directive]) -> Vec<Open> {
        let mut opened = HashSet::new();
        let mut first_use: BTreeMap<&str, NaiveDate> = BTreeMap::new();
        for entry in entries {
            if let Directive::Open(open) = entry {
                opened.insert(open.account.as_str());
            }
            for account in entry.accounts() {
                let date = first_use.entry(account).or_insert(entry.date());
                *date = (*date).min(entry.date());
            }
        }

        first_use
            .into_iter()
            .enumerate()
            .filter(|(_, (account, _))| {
                has_component(account, &self.options.dit_component) && !opened.contains(account)
            })
            .map(|(index, (account, date))| Open {
                meta: Meta::new(PLUGIN_NAME, index),
                date,
                account: account.to_string(),
                currencies: Vec::new(),
            })
            .collect()
    }

    fn split_entries(&self, entries: Vec<Directive>) -> (Vec<Leg>, Vec<Directive>, Vec<Diagnostic>) {
        let mut legs = Vec::new();
        let mut unchanged = Vec::new();
        let mut diagnostics = Vec::new();

        for entry in entries {
            let txn = match entry {
                Directive::Transaction(txn) if !txn.has_tag(&self.options.ignored_tag) => txn,
                other => {
                    unchanged.push(other);
                    continue;
                }
            };
            let dit: Vec<usize> = txn
                .postings
                .iter()
                .enumerate()
                .filter(|(_, p)| has_component(&p.account, &self.options.dit_component))
                .map(|(i, _)| i)
                .collect();
            match dit.as_slice() {
                [] => unchanged.push(Directive::Transaction(txn)),
                [first, rest @ ..] => {
                    if !rest.is_empty() {
                        let account = &txn.postings[*first].account;
                        tracing::warn!("{}: multiple DIT postings", txn.meta);
                        diagnostics.push(Diagnostic::error(
                            txn.meta.clone(),
                            format!(
                                "({PLUGIN_NAME}) Found entry with multiple postings to DIT accounts; \
                                 only processing posting to {account} account"
                            ),
                        ));
                    }
                    legs.push(Leg::new(txn, *first));
                }
            }
        }
        (legs, unchanged, diagnostics)
    }

    fn process_pair(&self, a: Leg, b: Leg, links: &mut LinkNames) -> Vec<Transaction> {
        let (sender, receiver) = if a.number() < b.number() { (b, a) } else { (a, b) };

        let date = sender.txn.date.max(receiver.txn.date);
        let narration = if sender.txn.narration == receiver.txn.narration {
            sender.txn.narration.clone()
        } else {
            format!("{} / {}", sender.txn.narration, receiver.txn.narration)
        };
        let payee = match (&sender.txn.payee, &receiver.txn.payee) {
            (Some(s), Some(r)) if s != r => Some(format!("{s} / {r}")),
            (Some(s), _) => Some(s.clone()),
            (None, r) => r.clone(),
        };

        if self.options.same_day_merge && is_mergeable(&sender, &receiver) {
            tracing::debug!("{}: merged with {}", sender.txn.meta, receiver.txn.meta);
            let mut tags: BTreeSet<String> = sender.txn.tags.union(&receiver.txn.tags).cloned().collect();
            tags.insert(self.options.cleared_tag.clone());
            let merged = Transaction {
                meta: sender.txn.meta.clone(),
                date,
                flag: sender.txn.flag,
                payee,
                narration,
                tags,
                links: sender.txn.links.union(&receiver.txn.links).cloned().collect(),
                postings: sender
                    .other_postings()
                    .chain(receiver.other_postings())
                    .cloned()
                    .collect(),
            };
            return vec![merged];
        }

        let link = links.next().unwrap_or_default();
        tracing::debug!("{}: linked to {} as {}", sender.txn.meta, receiver.txn.meta, link);

        // Halfway between the two legs so the connector sorts between them.
        let lineno = (sender.txn.meta.lineno + receiver.txn.meta.lineno) / 2;
        let connector = Transaction {
            meta: Meta::new(PLUGIN_NAME, lineno),
            date,
            flag: Flag::Okay,
            payee,
            narration,
            tags: BTreeSet::from([self.options.cleared_tag.clone()]),
            links: BTreeSet::from([link.clone()]),
            postings: [&sender, &receiver]
                .into_iter()
                .filter_map(|leg| {
                    let units = leg.units.as_ref()?;
                    Some(Posting::new(leg.dit_posting().account.clone(), -units))
                })
                .collect(),
        };

        let cleared_tag = &self.options.cleared_tag;
        vec![
            sender.txn.with_tag(cleared_tag).with_link(&link),
            receiver.txn.with_tag(cleared_tag).with_link(&link),
            connector,
        ]
    }

    fn pending(&self, leg: Leg) -> Transaction {
        let mut txn = leg.txn.with_tag(&self.options.pending_tag);
        if self.options.flag_pending {
            txn.flag = Flag::Warning;
        }
        txn
    }
}

fn is_mergeable(sender: &Leg, receiver: &Leg) -> bool {
    sender.txn.flag == receiver.txn.flag
        && sender.txn.date == receiver.txn.date
        && !sender.dit_posting().has_conversion()
        && !receiver.dit_posting().has_conversion()
}

/// Pair each leg, in entry order, with the first later unpaired leg whose
/// DIT units are its exact opposite.
fn pair_legs(legs: Vec<Leg>) -> (Vec<(Leg, Leg)>, Vec<Leg>) {
    let mut slots: Vec<Option<Leg>> = legs.into_iter().map(Some).collect();
    let mut pairs = Vec::new();
    let mut singles = Vec::new();

    for i in 0..slots.len() {
        let Some(leg) = slots[i].take() else {
            continue;
        };
        let partner = leg.units.as_ref().and_then(|units| {
            let wanted = -units;
            (i + 1..slots.len()).find(|&j| {
                slots[j]
                    .as_ref()
                    .is_some_and(|other| other.units.as_ref() == Some(&wanted))
            })
        });
        match partner.and_then(|j| slots[j].take()) {
            Some(other) => pairs.push((leg, other)),
            None => singles.push(leg),
        }
    }
    (pairs, singles)
}

/// Plugin entry point.
pub fn deposit_in_transit(entries: Vec<Directive>, config: &str, ctx: &PluginContext) -> PluginOutput {
    let options = match parse_options::<DitOptions>(config) {
        Ok(options) => options,
        Err(err) => {
            tracing::error!("{}: {}", PLUGIN_NAME, err.message);
            return (entries, vec![err.to_diagnostic(&ctx.filename)]);
        }
    };

    if let Some(skip_re) = &options.skip_re {
        let skip = ctx
            .argv
            .iter()
            .find(|arg| skip_re.find(arg).is_some_and(|m| m.start() == 0));
        if let Some(arg) = skip {
            tracing::info!("{}: skipped because of argument {:?}", PLUGIN_NAME, arg);
            return (entries, Vec::new());
        }
    }

    let (mut output, diagnostics) = DepositInTransit::new(options).process(entries);
    sort_entries(&mut output, &ctx.sort_order);
    (output, diagnostics)
}
