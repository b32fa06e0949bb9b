//! Beancount-syntax rendering of directives.

use std::fmt;
use std::io::{self, Write};

use super::entry::{Balance, Close, Directive, Document, Open, Posting, Transaction};

pub fn render<W: Write>(w: &mut W, entries: &[Directive]) -> io::Result<()> {
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        write!(w, "{entry}")?;
    }
    Ok(())
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Open(d) => fmt::Display::fmt(d, f),
            Directive::Close(d) => fmt::Display::fmt(d, f),
            Directive::Balance(d) => fmt::Display::fmt(d, f),
            Directive::Transaction(d) => fmt::Display::fmt(d, f),
            Directive::Document(d) => fmt::Display::fmt(d, f),
        }
    }
}

impl fmt::Display for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} open {}", self.date, self.account)?;
        if !self.currencies.is_empty() {
            write!(f, " {}", self.currencies.join(","))?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Close {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} close {}", self.date, self.account)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} balance {}  {}", self.date, self.account, self.amount)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} document {} {}", self.date, self.account, quoted(&self.path))
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.flag)?;
        if let Some(payee) = &self.payee {
            write!(f, " {}", quoted(payee))?;
        }
        write!(f, " {}", quoted(&self.narration))?;
        for tag in &self.tags {
            write!(f, " #{tag}")?;
        }
        for link in &self.links {
            write!(f, " ^{link}")?;
        }
        writeln!(f)?;
        for posting in &self.postings {
            writeln!(f, "  {posting}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(flag) = &self.flag {
            write!(f, "{flag} ")?;
        }
        write!(f, "{}", self.account)?;
        if let Some(units) = &self.units {
            write!(f, "  {units}")?;
        }
        if let Some(cost) = &self.cost {
            write!(f, " {{{cost}}}")?;
        }
        if let Some(price) = &self.price {
            write!(f, " @ {price}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Flag, Meta};
    use crate::money::Amount;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renders_transaction_with_tags_and_links() {
        let txn = Transaction::new(Meta::default(), date(2000, 2, 7), "Pay \"card\"")
            .with_payee("Visa")
            .with_tag("CLEARED")
            .with_link("cleared-2")
            .with_posting(Posting::new("Assets:Checking", Amount::new(dec!(-100.00), "USD")))
            .with_posting(Posting::elided("Liabilities:Clearing:Visa").with_flag(Some(Flag::Warning)));
        let text = Directive::from(txn).to_string();
        assert_eq!(
            text,
            "2000-02-07 * \"Visa\" \"Pay \\\"card\\\"\" #CLEARED ^cleared-2\n  \
             Assets:Checking  -100.00 USD\n  \
             ! Liabilities:Clearing:Visa\n"
        );
    }

    #[test]
    fn renders_balance_and_open() {
        let entries = vec![
            Directive::Open(Open {
                meta: Meta::default(),
                date: date(2016, 4, 1),
                account: "Assets:TD:Checking".into(),
                currencies: vec!["CAD".into()],
            }),
            Directive::Balance(Balance {
                meta: Meta::default(),
                date: date(2016, 5, 1),
                account: "Assets:TD:Checking".into(),
                amount: Amount::new(dec!(2883.17), "CAD"),
            }),
        ];
        let mut out = Vec::new();
        render(&mut out, &entries).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2016-04-01 open Assets:TD:Checking CAD\n\n2016-05-01 balance Assets:TD:Checking  2883.17 CAD\n"
        );
    }
}
