//! Core types for beanreds
//!
//! This crate provides the directive model the plugins operate on:
//!
//! - [`Amount`] - A decimal number with a currency
//! - [`IncompleteAmount`] - Posting units that may lack a number or currency
//! - [`Directive`] - Transaction, Open, Close, Balance, Pad and Note
//!
//! # Example
//!
//! ```
//! use beanreds_core::{Amount, Directive, Posting, Transaction};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let txn = Transaction::new(NaiveDate::from_ymd_opt(2005, 1, 1).unwrap(), "Transfer")
//!     .with_posting(Posting::new("Assets:Checking", Amount::new(dec!(-20), "USD")))
//!     .with_posting(Posting::new("Assets:ZSA:Transfers", Amount::new(dec!(20), "USD")));
//!
//! let entry = Directive::Transaction(txn);
//! let legs = &entry.as_transaction().unwrap().postings;
//! assert_eq!(legs[1].number(), Some(dec!(20)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod directive;

pub use amount::{Amount, IncompleteAmount};
pub use directive::{
    sort_directives, Balance, Close, Directive, MetaValue, Metadata, Note, Open, Pad, Posting,
    Transaction,
};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
