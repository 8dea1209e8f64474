//! Ledger rewrite plugins.
//!
//! Each plugin is a pass over an already parsed list of directives that
//! returns a modified list plus any errors it found. Nothing is kept between
//! calls.
//!
//! # Built-in Plugins (4)
//!
//! - `zerosum`: Matches postings that cancel out in a clearing account and
//!   moves both legs to a matched account
//! - `flag_unmatched`: Flags transactions still sitting in a clearing account
//! - `rename_accounts`: Renames accounts by regular expression
//! - `autoclose_tree`: Closes descendant accounts when a parent closes
//!
//! # Example
//!
//! ```
//! use beanreds_core::{Amount, Directive, NaiveDate, Posting, Transaction};
//! use beanreds_plugin::{NativePlugin, NativePluginRegistry, PluginInput};
//! use rust_decimal_macros::dec;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2005, 1, d).unwrap();
//! let entries = vec![
//!     Directive::Transaction(
//!         Transaction::new(day(1), "Transfer")
//!             .with_posting(Posting::new("Assets:Checking", Amount::new(dec!(-20), "USD")))
//!             .with_posting(Posting::new("Assets:ZSA:Transfers", Amount::new(dec!(20), "USD"))),
//!     ),
//!     Directive::Transaction(
//!         Transaction::new(day(3), "Payment")
//!             .with_posting(Posting::new("Assets:ZSA:Transfers", Amount::new(dec!(-20), "USD")))
//!             .with_posting(Posting::new("Liabilities:Card", Amount::new(dec!(20), "USD"))),
//!     ),
//! ];
//!
//! let registry = NativePluginRegistry::new();
//! let plugin = registry.find("beancount_reds_plugins.zerosum.zerosum").unwrap();
//! let output = plugin.process(
//!     PluginInput::new(entries)
//!         .with_config("{'zerosum_accounts': {'Assets:ZSA:Transfers': ('Assets:ZSA-Matched:Transfers', 30)}}"),
//! );
//!
//! assert!(output.errors.is_empty());
//! // Both transactions plus the open for the matched account.
//! assert_eq!(output.directives.len(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod common;
pub mod config;
pub mod error;
pub mod native;
pub mod types;
pub mod zerosum;

pub use common::create_open_directives;
pub use config::{parse_config, parse_literal, ConfigValue};
pub use error::ConfigError;
pub use native::{
    AccountRenames, AutoCloseTreePlugin, FlagUnmatchedPlugin, NativePlugin, NativePluginRegistry,
    RenameAccountsPlugin, ZeroSumPlugin,
};
pub use types::{PluginError, PluginErrorSeverity, PluginInput, PluginOptions, PluginOutput};
pub use zerosum::{
    flag_unmatched, ClearingAccount, ZeroSumConfig, ZeroSumMatcher, ZeroSumOutcome,
};
