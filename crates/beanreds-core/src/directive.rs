//! The entries a plugin pass reads and rewrites.
//!
//! Only the directive kinds that carry account names are modelled. A host
//! that holds other kinds keeps them out of the plugin pass.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Amount, IncompleteAmount};

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// Quoted text
    String(String),
    /// Number, as used for `lineno`
    Number(Decimal),
}

impl MetaValue {
    /// The text, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

/// Key-value metadata on an entry or posting.
pub type Metadata = HashMap<String, MetaValue>;

/// One leg of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Account booked to
    pub account: String,
    /// Units, or `None` when the host interpolates the whole amount
    pub units: Option<IncompleteAmount>,
    /// Posting metadata
    pub meta: Metadata,
}

impl Posting {
    /// A posting with complete units.
    #[must_use]
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Self::with_incomplete(account, IncompleteAmount::Complete(units))
    }

    /// A posting whose units lack a number or a currency.
    #[must_use]
    pub fn with_incomplete(account: impl Into<String>, units: IncompleteAmount) -> Self {
        Self {
            account: account.into(),
            units: Some(units),
            meta: Metadata::new(),
        }
    }

    /// A posting with no units.
    #[must_use]
    pub fn auto(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            units: None,
            meta: Metadata::new(),
        }
    }

    /// The number of the units, if one was written.
    #[must_use]
    pub fn number(&self) -> Option<Decimal> {
        self.units.as_ref().and_then(IncompleteAmount::number)
    }
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Transfer between accounts
    Transaction(Transaction),
    /// Balance assertion
    Balance(Balance),
    /// Account opening
    Open(Open),
    /// Account closing
    Close(Close),
    /// Padding from a source account
    Pad(Pad),
    /// Free-form note on an account
    Note(Note),
}

impl Directive {
    /// Entry date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        match self {
            Self::Transaction(t) => t.date,
            Self::Balance(b) => b.date,
            Self::Open(o) => o.date,
            Self::Close(c) => c.date,
            Self::Pad(p) => p.date,
            Self::Note(n) => n.date,
        }
    }

    /// Entry metadata.
    #[must_use]
    pub const fn meta(&self) -> &Metadata {
        match self {
            Self::Transaction(t) => &t.meta,
            Self::Balance(b) => &b.meta,
            Self::Open(o) => &o.meta,
            Self::Close(c) => &c.meta,
            Self::Pad(p) => &p.meta,
            Self::Note(n) => &n.meta,
        }
    }

    /// The transaction, if this is one.
    #[must_use]
    pub const fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(t) => Some(t),
            _ => None,
        }
    }

    /// The transaction, mutably, if this is one.
    pub fn as_transaction_mut(&mut self) -> Option<&mut Transaction> {
        match self {
            Self::Transaction(t) => Some(t),
            _ => None,
        }
    }

    /// Rank among entries of the same day.
    const fn day_rank(&self) -> u8 {
        match self {
            Self::Open(_) => 0,
            Self::Pad(_) => 1,
            Self::Balance(_) => 2,
            Self::Transaction(_) => 3,
            Self::Note(_) => 4,
            Self::Close(_) => 5,
        }
    }
}

/// Stable sort by date. Within a day, opens come first and closes last.
pub fn sort_directives(directives: &mut [Directive]) {
    directives.sort_by(|a, b| {
        a.date()
            .cmp(&b.date())
            .then_with(|| a.day_rank().cmp(&b.day_rank()))
    });
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction date
    pub date: NaiveDate,
    /// `*` for cleared, `!` for pending
    pub flag: char,
    /// Description
    pub narration: String,
    /// Links, without the `^`
    pub links: Vec<String>,
    /// Transaction metadata
    pub meta: Metadata,
    /// Legs in written order
    pub postings: Vec<Posting>,
}

impl Transaction {
    /// A cleared transaction with no postings.
    #[must_use]
    pub fn new(date: NaiveDate, narration: impl Into<String>) -> Self {
        Self {
            date,
            flag: '*',
            narration: narration.into(),
            links: Vec::new(),
            meta: Metadata::new(),
            postings: Vec::new(),
        }
    }

    /// Append a posting.
    #[must_use]
    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    /// Add a link unless it is already present.
    pub fn add_link(&mut self, link: impl Into<String>) {
        let link = link.into();
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }
}

/// A balance assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Assertion date
    pub date: NaiveDate,
    /// Account checked
    pub account: String,
    /// Expected balance
    pub amount: Amount,
    /// Metadata
    pub meta: Metadata,
}

impl Balance {
    /// Create a balance assertion.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            account: account.into(),
            amount,
            meta: Metadata::new(),
        }
    }
}

/// An account opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    /// Opening date
    pub date: NaiveDate,
    /// Account name, e.g. `Assets:Bank:Checking`
    pub account: String,
    /// Metadata
    pub meta: Metadata,
}

impl Open {
    /// Create an open entry.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            meta: Metadata::new(),
        }
    }
}

/// An account closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Closing date
    pub date: NaiveDate,
    /// Account name
    pub account: String,
    /// Metadata
    pub meta: Metadata,
}

impl Close {
    /// Create a close entry.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            meta: Metadata::new(),
        }
    }
}

/// Padding of an account from a source account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pad {
    /// Pad date
    pub date: NaiveDate,
    /// Account padded
    pub account: String,
    /// Account the padding comes from
    pub source_account: String,
    /// Metadata
    pub meta: Metadata,
}

impl Pad {
    /// Create a pad entry.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        account: impl Into<String>,
        source_account: impl Into<String>,
    ) -> Self {
        Self {
            date,
            account: account.into(),
            source_account: source_account.into(),
            meta: Metadata::new(),
        }
    }
}

/// A note on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note date
    pub date: NaiveDate,
    /// Account annotated
    pub account: String,
    /// Note text
    pub comment: String,
    /// Metadata
    pub meta: Metadata,
}

impl Note {
    /// Create a note entry.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            comment: comment.into(),
            meta: Metadata::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_links_are_a_set() {
        let mut txn = Transaction::new(date(2024, 1, 1), "Test");
        txn.add_link("ZeroSum.abc");
        txn.add_link("ZeroSum.abc");
        txn.add_link("ZeroSum.def");
        assert_eq!(txn.links, vec!["ZeroSum.abc", "ZeroSum.def"]);
    }

    #[test]
    fn test_posting_number() {
        let complete = Posting::new("Assets:Cash", Amount::new(dec!(10.00), "USD"));
        let number_only =
            Posting::with_incomplete("Assets:Cash", IncompleteAmount::NumberOnly(dec!(3)));
        let currency_only =
            Posting::with_incomplete("Assets:Cash", IncompleteAmount::currency_only("USD"));

        assert_eq!(complete.number(), Some(dec!(10.00)));
        assert_eq!(number_only.number(), Some(dec!(3)));
        assert_eq!(currency_only.number(), None);
        assert_eq!(Posting::auto("Assets:Cash").number(), None);
    }

    #[test]
    fn test_sort_directives_same_day() {
        let mut directives = vec![
            Directive::Close(Close::new(date(2024, 1, 1), "Assets:Bank")),
            Directive::Transaction(Transaction::new(date(2024, 1, 1), "Payment")),
            Directive::Open(Open::new(date(2024, 1, 1), "Assets:Bank")),
            Directive::Pad(Pad::new(
                date(2024, 1, 1),
                "Assets:Bank",
                "Equity:Opening-Balances",
            )),
            Directive::Balance(Balance::new(
                date(2024, 1, 1),
                "Assets:Bank",
                Amount::new(Decimal::ZERO, "USD"),
            )),
            Directive::Note(Note::new(date(2023, 12, 31), "Assets:Bank", "earlier")),
        ];

        sort_directives(&mut directives);

        let ranks: Vec<_> = directives.iter().map(Directive::day_rank).collect();
        assert_eq!(ranks, vec![4, 0, 1, 2, 3, 5]);
        assert_eq!(directives[0].date(), date(2023, 12, 31));
        assert!(directives[4].as_transaction().is_some());
    }
}
