//! Posting quantities.
//!
//! Postings carry their units as an [`IncompleteAmount`] because an entry may
//! leave the number or the currency for the host to infer. The plugins only
//! compare numbers, so they read whatever [`IncompleteAmount::number`] yields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A number paired with a currency.
///
/// # Examples
///
/// ```
/// use beanreds_core::Amount;
/// use rust_decimal_macros::dec;
///
/// let amount = Amount::new(dec!(-20.00), "USD");
/// assert_eq!(amount.number, dec!(-20.00));
/// assert_eq!(amount.currency, "USD");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Exact quantity
    pub number: Decimal,
    /// Currency code
    pub currency: String,
}

impl Amount {
    /// Create a new amount.
    #[must_use]
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }
}

/// Units as written on a posting.
///
/// A posting with no units at all has `units: None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncompleteAmount {
    /// `100.00 USD`
    Complete(Amount),
    /// `100.00`, currency inferred later
    NumberOnly(Decimal),
    /// `USD`, number interpolated later
    CurrencyOnly(String),
}

impl IncompleteAmount {
    /// Units with a currency but no number.
    #[must_use]
    pub fn currency_only(currency: impl Into<String>) -> Self {
        Self::CurrencyOnly(currency.into())
    }

    /// The number, if one was written.
    #[must_use]
    pub const fn number(&self) -> Option<Decimal> {
        match self {
            Self::Complete(a) => Some(a.number),
            Self::NumberOnly(n) => Some(*n),
            Self::CurrencyOnly(_) => None,
        }
    }
}

impl From<Amount> for IncompleteAmount {
    fn from(amount: Amount) -> Self {
        Self::Complete(amount)
    }
}
