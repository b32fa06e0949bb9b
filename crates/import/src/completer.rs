use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use reckon_core::{Directive, Flag, Posting, Transaction};
use serde::{Deserialize, Serialize};

use crate::importer::EntryFilter;
use crate::util::common_prefix_len;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleterOptions {
    /// Lowest score a model may have to be used.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Only transactions this many days old or younger serve as models.
    #[serde(default)]
    pub max_age_days: Option<u32>,
    /// Give the new posting an explicit amount instead of leaving it to the ledger.
    #[serde(default)]
    pub interpolated: bool,
}

fn default_min_score() -> f64 {
    0.5
}

impl Default for CompleterOptions {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_age_days: None,
            interpolated: false,
        }
    }
}

/// Completes single-legged transactions to one account by copying the other
/// leg of the most similar historical transaction.
///
/// Models are existing transactions with exactly two postings, one of them to
/// the target account. A model scores the length of the prefix its
/// description shares with the incomplete transaction's description, as a
/// fraction of the latter. Only models whose target posting has the same sign
/// as the incomplete posting compete. Ties go to the most recent model.
#[derive(Debug, Clone)]
pub struct TransactionCompleter {
    account: String,
    options: CompleterOptions,
    models: Vec<Transaction>,
}

impl TransactionCompleter {
    /// Build a completer from `existing` entries, in ascending date order,
    /// measuring model age from today.
    pub fn new(existing: &[Directive], account: impl Into<String>, options: CompleterOptions) -> Self {
        let today = chrono::Local::now().date_naive();
        Self::as_of(existing, account, options, today)
    }

    pub fn as_of(
        existing: &[Directive],
        account: impl Into<String>,
        options: CompleterOptions,
        as_of: NaiveDate,
    ) -> Self {
        let account = account.into();
        let is_model = |txn: &Transaction| {
            txn.postings.len() == 2 && txn.postings_to(&account).count() == 1
        };

        let transactions = existing.iter().filter_map(Directive::as_transaction);
        let models: Vec<Transaction> = match options
            .max_age_days
            .and_then(|days| as_of.checked_sub_days(Days::new(u64::from(days))))
        {
            Some(min_date) => {
                let mut recent: Vec<Transaction> = transactions
                    .rev()
                    .take_while(|txn| txn.date >= min_date)
                    .filter(|txn| is_model(txn))
                    .cloned()
                    .collect();
                recent.reverse();
                recent
            }
            None => transactions.filter(|txn| is_model(txn)).cloned().collect(),
        };

        tracing::debug!(account = %account, models = models.len(), "transaction completer ready");
        Self {
            account,
            options,
            models,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn models(&self) -> &[Transaction] {
        &self.models
    }

    /// Complete every eligible transaction in `entries`, keeping their order.
    pub fn complete_entries(&self, entries: Vec<Directive>) -> Vec<Directive> {
        entries
            .into_iter()
            .map(|entry| {
                let completed = entry.as_transaction().and_then(|txn| self.complete_entry(txn));
                completed.map_or(entry, Directive::Transaction)
            })
            .collect()
    }

    /// The completed version of `txn`, or `None` when it is not a
    /// single-legged transaction to the target account or no model qualifies.
    pub fn complete_entry(&self, txn: &Transaction) -> Option<Transaction> {
        if txn.postings.len() != 1 || txn.postings[0].account != self.account {
            return None;
        }
        let units = txn.postings[0].units.clone()?;
        let (model, ambiguous) = self.find_best_model(txn)?;
        let counter = model.postings.iter().find(|p| p.account != self.account)?;

        let flag = ambiguous.then_some(Flag::Warning);
        let posting = if self.options.interpolated {
            Posting::new(counter.account.clone(), -units)
        } else {
            Posting::elided(counter.account.clone())
        };
        tracing::debug!(
            date = %txn.date,
            description = %txn.description(),
            model = %model.description(),
            account = %counter.account,
            ambiguous,
            "completed transaction"
        );
        Some(txn.clone().with_posting(posting.with_flag(flag)))
    }

    /// The most recent top-scoring model, and whether the models sharing the
    /// top score disagree on the counter account.
    fn find_best_model(&self, txn: &Transaction) -> Option<(&Transaction, bool)> {
        let scored: Vec<(f64, &Transaction)> = self
            .models
            .iter()
            .filter_map(|model| self.score_model(model, txn).map(|score| (score, model)))
            .collect();

        let best_score = scored.iter().map(|(score, _)| *score).reduce(f64::max)?;
        if best_score < self.options.min_score {
            return None;
        }

        let tied: Vec<&Transaction> = scored
            .iter()
            .filter(|(score, _)| *score == best_score)
            .map(|(_, model)| *model)
            .collect();
        let counter_accounts: BTreeSet<&str> = tied
            .iter()
            .flat_map(|model| model.postings.iter())
            .filter(|p| p.account != self.account)
            .map(|p| p.account.as_str())
            .collect();
        let model = tied.into_iter().max_by_key(|model| model.date)?;
        Some((model, counter_accounts.len() > 1))
    }

    /// Score of `model` for completing `txn`, in `[0, 1]`. `None` when the
    /// model cannot be used at all.
    fn score_model(&self, model: &Transaction, txn: &Transaction) -> Option<f64> {
        let description = txn.description();
        let n_max = description.chars().count();
        if n_max <= 1 {
            return None;
        }
        let units = txn.postings.first()?.units.as_ref()?;
        let index = model.postings.iter().position(|p| p.account == self.account)?;
        let model_units = model.posting_units(index)?;
        if !model_units.same_sign(units) {
            return None;
        }
        let n = common_prefix_len(&model.description(), &description);
        Some(n as f64 / n_max as f64)
    }
}

impl EntryFilter for TransactionCompleter {
    fn filter(&self, entries: Vec<Directive>) -> Vec<Directive> {
        self.complete_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reckon_core::{Amount, Meta};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const CHECKING: &str = "Assets:TD:Checking";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cad(n: Decimal) -> Amount {
        Amount::new(n, "CAD")
    }

    fn model(day: u32, payee: &str, narration: &str, amount: Decimal, other: &str) -> Directive {
        let mut txn = Transaction::new(Meta::new("ledger", day as usize), date(2016, 3, day), narration)
            .with_posting(Posting::new(CHECKING, cad(amount)))
            .with_posting(Posting::new(other, cad(-amount)));
        if !payee.is_empty() {
            txn = txn.with_payee(payee);
        }
        txn.into()
    }

    fn incomplete(narration: &str, amount: Decimal) -> Transaction {
        Transaction::new(Meta::new("statement.csv", 1), date(2016, 4, 5), narration)
            .with_posting(Posting::new(CHECKING, cad(amount)))
    }

    fn history() -> Vec<Directive> {
        vec![
            model(1, "COSTCO", "#9876543", dec!(-120.00), "Expenses:Groceries"),
            model(2, "", "METRO ETS 2020", dec!(-34.90), "Expenses:Groceries"),
            model(3, "", "CHQ#00123-456789", dec!(-16.00), "Expenses:Rent"),
            model(4, "", "CANADA RIT", dec!(345.24), "Income:Government"),
            model(10, "", "CHQ#00124-9876543", dec!(-900.00), "Expenses:Daycare"),
        ]
    }

    fn completer(options: CompleterOptions) -> TransactionCompleter {
        TransactionCompleter::as_of(&history(), CHECKING, options, date(2016, 4, 30))
    }

    #[test]
    fn models_are_two_legged_transactions_to_the_account() {
        let mut entries = history();
        entries.push(
            Transaction::new(Meta::default(), date(2016, 3, 20), "split")
                .with_posting(Posting::new(CHECKING, cad(dec!(-10))))
                .with_posting(Posting::new("Expenses:A", cad(dec!(5))))
                .with_posting(Posting::new("Expenses:B", cad(dec!(5))))
                .into(),
        );
        entries.push(
            Transaction::new(Meta::default(), date(2016, 3, 21), "elsewhere")
                .with_posting(Posting::new("Assets:Savings", cad(dec!(-10))))
                .with_posting(Posting::new("Expenses:A", cad(dec!(10))))
                .into(),
        );
        let c = TransactionCompleter::as_of(&entries, CHECKING, CompleterOptions::default(), date(2016, 4, 30));
        assert_eq!(c.models().len(), 5);
    }

    #[test]
    fn completes_with_best_prefix_match() {
        let c = completer(CompleterOptions::default());
        let txn = c.complete_entry(&incomplete("METRO ETS 2021", dec!(-12.00))).unwrap();
        assert_eq!(txn.postings.len(), 2);
        assert_eq!(txn.postings[1], Posting::elided("Expenses:Groceries"));
    }

    #[test]
    fn payee_is_part_of_the_model_description() {
        let c = completer(CompleterOptions::default());
        let txn = c.complete_entry(&incomplete("COSTCO #9876543", dec!(-60.24))).unwrap();
        assert_eq!(txn.postings[1].account, "Expenses:Groceries");
    }

    #[test]
    fn ties_go_to_the_most_recent_model_and_are_flagged() {
        let c = completer(CompleterOptions::default());
        let txn = c.complete_entry(&incomplete("CHQ#00126-45", dec!(-160.00))).unwrap();
        // Both cheques share "CHQ#0012", the later one wins.
        assert_eq!(txn.postings[1].account, "Expenses:Daycare");
        assert_eq!(txn.postings[1].flag, Some(Flag::Warning));
    }

    #[test]
    fn ties_on_one_counter_account_are_not_flagged() {
        let mut entries = history();
        entries.push(model(11, "", "METRO ETS 2020", dec!(-20.00), "Expenses:Groceries"));
        let c = TransactionCompleter::as_of(&entries, CHECKING, CompleterOptions::default(), date(2016, 4, 30));
        let txn = c.complete_entry(&incomplete("METRO ETS 2020", dec!(-5.00))).unwrap();
        assert_eq!(txn.postings[1].flag, None);
    }

    #[test]
    fn interpolated_amount_balances_the_transaction() {
        let c = completer(CompleterOptions {
            interpolated: true,
            ..CompleterOptions::default()
        });
        let txn = c.complete_entry(&incomplete("CANADA RIT", dec!(345.24))).unwrap();
        assert_eq!(txn.postings[1], Posting::new("Income:Government", cad(dec!(-345.24))));
    }

    #[test]
    fn opposite_sign_models_are_never_used() {
        let c = completer(CompleterOptions::default());
        // A refund looks like a grocery purchase but moves money the other way.
        assert_eq!(c.complete_entry(&incomplete("METRO ETS 2020", dec!(34.90))), None);

        let c = completer(CompleterOptions {
            min_score: 0.0,
            ..CompleterOptions::default()
        });
        let txn = c.complete_entry(&incomplete("CANADA RIT", dec!(-1.00))).unwrap();
        assert_ne!(txn.postings[1].account, "Income:Government");
    }

    #[test]
    fn low_scores_and_trivial_descriptions_are_left_alone() {
        let c = completer(CompleterOptions::default());
        assert_eq!(c.complete_entry(&incomplete("BELL CANADA", dec!(-25.30))), None);
        assert_eq!(c.complete_entry(&incomplete("M", dec!(-25.30))), None);
        assert_eq!(c.complete_entry(&incomplete("", dec!(-25.30))), None);
    }

    #[test]
    fn only_single_legged_transactions_to_the_account_are_completed() {
        let c = completer(CompleterOptions::default());
        let other = Transaction::new(Meta::default(), date(2016, 4, 5), "METRO ETS 2020")
            .with_posting(Posting::new("Assets:Savings", cad(dec!(-10))));
        assert_eq!(c.complete_entry(&other), None);
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let c = completer(CompleterOptions::default());
        let once = c.complete_entries(vec![incomplete("METRO ETS 2020", dec!(-5.00)).into()]);
        let twice = c.complete_entries(once.clone());
        assert_eq!(once, twice);
        assert_eq!(twice[0].as_transaction().unwrap().postings.len(), 2);
    }

    #[test]
    fn max_age_limits_models() {
        let c = TransactionCompleter::as_of(
            &history(),
            CHECKING,
            CompleterOptions {
                max_age_days: Some(25),
                ..CompleterOptions::default()
            },
            date(2016, 3, 30),
        );
        // Only the model of March 10 is young enough.
        assert_eq!(c.models().len(), 1);
        assert_eq!(c.models()[0].date, date(2016, 3, 10));
        assert_eq!(c.complete_entry(&incomplete("METRO ETS 2020", dec!(-5.00))), None);
    }

    #[test]
    fn entry_filter_passes_other_directives_through() {
        let c = completer(CompleterOptions::default());
        let balance: Directive = reckon_core::Balance {
            meta: Meta::default(),
            date: date(2016, 5, 1),
            account: CHECKING.into(),
            amount: cad(dec!(1)),
        }
        .into();
        let out = c.filter(vec![balance.clone(), incomplete("METRO ETS 2020", dec!(-5.00)).into()]);
        assert_eq!(out[0], balance);
        assert_eq!(out[1].as_transaction().unwrap().postings.len(), 2);
    }
}
