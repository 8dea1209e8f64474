//! Zero-sum posting matching.
//!
//! A zero-sum account is a clearing account that should net to zero once
//! every transfer through it has both legs recorded: a payment leaving
//! checking on Monday and arriving at the credit card on Wednesday. The
//! matcher pairs the two legs of each transfer (postings to the same
//! clearing account whose numbers cancel within a tolerance and whose dates
//! fall inside a window) and moves both postings to a "matched" account, so
//! the clearing account ends up holding only the transfers still in flight.
//!
//! The rewrite is idempotent: matched postings no longer sit in the clearing
//! account and are never considered again.

use beanreds_core::{Directive, MetaValue, NaiveDate};
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::debug;

use crate::common::{create_open_directives, source_location};
use crate::config::{parse_config, ConfigValue};
use crate::error::ConfigError;
use crate::types::PluginError;

/// Length of generated match ids.
pub const MATCH_ID_LENGTH: usize = 20;

/// `filename` recorded on the opens the matcher synthesizes.
pub const OPEN_META_DESC: &str = "<zerosum>";

/// A clearing account and where its matched postings go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingAccount {
    /// Account whose postings are matched.
    pub account: String,
    /// Explicit destination for matched postings.
    pub target: Option<String>,
    /// How many days after a posting its counterpart may appear.
    pub date_range: u32,
}

impl ClearingAccount {
    /// Create a clearing account with no explicit target.
    pub fn new(account: impl Into<String>, date_range: u32) -> Self {
        Self {
            account: account.into(),
            target: None,
            date_range,
        }
    }

    /// Set the destination for matched postings.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Operating parameters of the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroSumConfig {
    /// Clearing accounts, in the order they were configured.
    pub clearing_accounts: Vec<ClearingAccount>,
    /// `(from, to)` substitution deriving a target from the clearing account
    /// name when no explicit target is set.
    pub account_name_replace: (String, String),
    /// Two postings match when the absolute value of their sum is below this.
    pub tolerance: Decimal,
    /// Stamp a match id on both matched postings.
    pub match_metadata: bool,
    /// Metadata key for the match id.
    pub match_metadata_name: String,
    /// Link both matched transactions with `link_prefix` + match id.
    pub link_transactions: bool,
    /// Prefix of generated links.
    pub link_prefix: String,
    /// Whether the unmatched flagger marks leftover transactions.
    pub flag_unmatched: bool,
}

impl Default for ZeroSumConfig {
    fn default() -> Self {
        Self {
            clearing_accounts: Vec::new(),
            account_name_replace: (String::new(), String::new()),
            tolerance: Self::DEFAULT_TOLERANCE,
            match_metadata: false,
            match_metadata_name: "match_id".to_string(),
            link_transactions: false,
            link_prefix: "ZeroSum.".to_string(),
            flag_unmatched: false,
        }
    }
}

impl ZeroSumConfig {
    /// Default matching tolerance.
    pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(99, 0, 0, false, 4);

    /// Decode a plugin configuration string.
    ///
    /// An absent or blank string yields the defaults with no clearing
    /// accounts.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is malformed or a value has
    /// the wrong shape.
    pub fn from_config_str(config: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_value(&parse_config(config)?)
    }

    /// Decode an already parsed configuration value.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a value has the wrong shape.
    pub fn from_value(value: &ConfigValue) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tolerance = value.decimal_or("tolerance", defaults.tolerance)?;
        if tolerance <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveTolerance(tolerance));
        }

        let config = Self {
            clearing_accounts: decode_clearing_accounts(value.get("zerosum_accounts"))?,
            account_name_replace: value.string_pair_or("account_name_replace", ("", ""))?,
            tolerance,
            match_metadata: value.bool_or("match_metadata", defaults.match_metadata)?,
            match_metadata_name: value
                .string_or("match_metadata_name", &defaults.match_metadata_name)?,
            link_transactions: value.bool_or("link_transactions", defaults.link_transactions)?,
            link_prefix: value.string_or("link_prefix", &defaults.link_prefix)?,
            flag_unmatched: value.bool_or("flag_unmatched", defaults.flag_unmatched)?,
        };

        for clearing in &config.clearing_accounts {
            if config.target_for(clearing) == clearing.account {
                return Err(ConfigError::TargetIsClearingAccount(
                    clearing.account.clone(),
                ));
            }
        }

        Ok(config)
    }

    /// Account that matched postings of `clearing` are moved to.
    ///
    /// An explicit, non-empty target wins. Otherwise the clearing account
    /// name has `account_name_replace.0` replaced by `account_name_replace.1`.
    #[must_use]
    pub fn target_for(&self, clearing: &ClearingAccount) -> String {
        if let Some(target) = clearing.target.as_deref().filter(|t| !t.is_empty()) {
            return target.to_string();
        }
        let (from, to) = &self.account_name_replace;
        if from.is_empty() {
            clearing.account.clone()
        } else {
            clearing.account.replace(from.as_str(), to)
        }
    }

    fn is_clearing_account(&self, account: &str) -> bool {
        self.clearing_accounts.iter().any(|c| c.account == account)
    }
}

fn decode_clearing_accounts(
    value: Option<&ConfigValue>,
) -> Result<Vec<ClearingAccount>, ConfigError> {
    const KEY: &str = "zerosum_accounts";

    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let entries = value
        .as_map()
        .ok_or_else(|| ConfigError::invalid(KEY, "a mapping of account to (target, days)"))?;

    let mut accounts: Vec<ClearingAccount> = Vec::with_capacity(entries.len());
    for (account, pair) in entries {
        if accounts.iter().any(|c| &c.account == account) {
            return Err(ConfigError::DuplicateAccount(account.clone()));
        }

        let Some([target, days]) = pair.as_list() else {
            return Err(ConfigError::invalid(account.as_str(), "a (target, days) pair"));
        };

        let target = match target {
            ConfigValue::Str(s) if !s.is_empty() => Some(s.clone()),
            ConfigValue::Str(_) | ConfigValue::None => None,
            _ => return Err(ConfigError::invalid(account.as_str(), "a target account or ''")),
        };

        let days = match days.as_decimal() {
            Some(n) if n < Decimal::ZERO => {
                return Err(ConfigError::NegativeDateRange {
                    account: account.clone(),
                    days: n,
                });
            }
            Some(_) => days
                .as_days()
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| ConfigError::invalid(account.as_str(), "a whole number of days"))?,
            None => return Err(ConfigError::invalid(account.as_str(), "a whole number of days")),
        };

        accounts.push(ClearingAccount {
            account: account.clone(),
            target,
            date_range: days,
        });
    }

    Ok(accounts)
}

/// Result of one matcher run.
#[derive(Debug, Clone, Default)]
pub struct ZeroSumOutcome {
    /// Rewritten entries followed by the synthesized opens.
    pub directives: Vec<Directive>,
    /// Target accounts that received at least one matched posting.
    pub new_accounts: BTreeSet<String>,
    /// Number of matched pairs.
    pub match_count: usize,
    /// Clearing-account postings considered.
    pub postings_seen: usize,
    /// Data-shape warnings.
    pub errors: Vec<PluginError>,
}

/// Matches and rewrites zero-sum postings.
///
/// The random source for match ids is injected so runs can be reproduced.
#[derive(Debug)]
pub struct ZeroSumMatcher<R = StdRng> {
    config: ZeroSumConfig,
    rng: R,
}

impl ZeroSumMatcher<StdRng> {
    /// Create a matcher with an entropy-seeded random source.
    #[must_use]
    pub fn new(config: ZeroSumConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> ZeroSumMatcher<R> {
    /// Create a matcher drawing match ids from `rng`.
    pub const fn with_rng(config: ZeroSumConfig, rng: R) -> Self {
        Self { config, rng }
    }

    /// The configuration this matcher runs with.
    #[must_use]
    pub const fn config(&self) -> &ZeroSumConfig {
        &self.config
    }

    /// Match postings in `entries`, which should be sorted by date.
    ///
    /// Unsorted input never panics but may miss matches.
    pub fn run(&mut self, mut entries: Vec<Directive>) -> ZeroSumOutcome {
        let start = Instant::now();
        let mut outcome = ZeroSumOutcome::default();

        let index = self.build_index(&entries, &mut outcome);

        for (slot, clearing) in self.config.clearing_accounts.iter().enumerate() {
            let target = self.config.target_for(clearing);
            let candidates = &index[slot];

            for (i, &ti) in candidates.iter().enumerate() {
                let Some(txn) = entries[ti].as_transaction() else {
                    continue;
                };
                let window_end = txn
                    .date
                    .checked_add_signed(Duration::days(i64::from(clearing.date_range)));
                let posting_count = txn.postings.len();

                for pi in 0..posting_count {
                    let Some(number) = entries[ti].as_transaction().and_then(|t| {
                        let posting = &t.postings[pi];
                        (posting.account == clearing.account)
                            .then(|| posting.number())
                            .flatten()
                    }) else {
                        continue;
                    };

                    let Some((tj, pj)) = find_counterpart(
                        &entries,
                        &candidates[i..],
                        (ti, pi),
                        &clearing.account,
                        number,
                        window_end,
                        self.config.tolerance,
                    ) else {
                        continue;
                    };

                    let match_id = (self.config.match_metadata || self.config.link_transactions)
                        .then(|| generate_match_id(&mut self.rng));
                    for (t, p) in [(ti, pi), (tj, pj)] {
                        rewrite_posting(&mut entries[t], p, &target, match_id.as_deref(), &self.config);
                    }

                    outcome.match_count += 1;
                    outcome.new_accounts.insert(target.clone());
                }
            }
        }

        let opens = create_open_directives(&outcome.new_accounts, &entries, OPEN_META_DESC);
        let opens_added = opens.len();
        entries.extend(opens);

        debug!(
            match_count = outcome.match_count,
            postings_seen = outcome.postings_seen,
            entries = entries.len(),
            opens_added,
            elapsed = ?start.elapsed(),
            "zerosum matching complete"
        );

        outcome.directives = entries;
        outcome
    }

    /// Positions of the transactions posting to each clearing account, in
    /// entry order. Built in a single pass, which also counts the postings
    /// and records transactions that cannot be matched.
    fn build_index(&self, entries: &[Directive], outcome: &mut ZeroSumOutcome) -> Vec<Vec<usize>> {
        let slots: HashMap<&str, usize> = self
            .config
            .clearing_accounts
            .iter()
            .enumerate()
            .map(|(slot, c)| (c.account.as_str(), slot))
            .collect();
        let mut index = vec![Vec::new(); slots.len()];

        for (ti, entry) in entries.iter().enumerate() {
            let Some(txn) = entry.as_transaction() else {
                continue;
            };

            let mut touched: Vec<usize> = Vec::new();
            let mut incomplete: Vec<usize> = Vec::new();
            for posting in &txn.postings {
                let Some(&slot) = slots.get(posting.account.as_str()) else {
                    continue;
                };
                if posting.number().is_none() {
                    if !incomplete.contains(&slot) {
                        incomplete.push(slot);
                    }
                    continue;
                }
                outcome.postings_seen += 1;
                if !touched.contains(&slot) {
                    touched.push(slot);
                }
            }

            for slot in touched {
                if !incomplete.contains(&slot) {
                    index[slot].push(ti);
                }
            }

            if !incomplete.is_empty() {
                let accounts: Vec<&str> = incomplete
                    .iter()
                    .map(|&slot| self.config.clearing_accounts[slot].account.as_str())
                    .collect();
                let mut error = PluginError::warning(format!(
                    "zerosum: transaction on {} has a posting to {} without a number; left unmatched",
                    txn.date,
                    accounts.join(", ")
                ));
                if let Some((file, line)) = source_location(entry) {
                    error = error.at(file, line);
                }
                outcome.errors.push(error);
            }
        }

        index
    }
}

/// First posting in `candidates` (transaction positions) that cancels
/// `number` within `tolerance`, skipping the posting at `origin`.
fn find_counterpart(
    entries: &[Directive],
    candidates: &[usize],
    origin: (usize, usize),
    account: &str,
    number: Decimal,
    window_end: Option<NaiveDate>,
    tolerance: Decimal,
) -> Option<(usize, usize)> {
    for &tj in candidates {
        let Some(txn) = entries[tj].as_transaction() else {
            continue;
        };
        if window_end.is_some_and(|end| txn.date > end) {
            break;
        }
        let hit = txn.postings.iter().enumerate().position(|(pj, p)| {
            (tj, pj) != origin
                && p.account == account
                && p.number()
                    .and_then(|n| n.checked_add(number))
                    .is_some_and(|sum| sum.abs() < tolerance)
        });
        if let Some(pj) = hit {
            return Some((tj, pj));
        }
    }
    None
}

fn rewrite_posting(
    entry: &mut Directive,
    posting: usize,
    target: &str,
    match_id: Option<&str>,
    config: &ZeroSumConfig,
) {
    let Some(txn) = entry.as_transaction_mut() else {
        return;
    };
    let p = &mut txn.postings[posting];
    p.account = target.to_string();
    if let Some(id) = match_id {
        if config.match_metadata {
            p.meta.insert(
                config.match_metadata_name.clone(),
                MetaValue::String(id.to_string()),
            );
        }
        if config.link_transactions {
            txn.add_link(format!("{}{id}", config.link_prefix));
        }
    }
}

fn generate_match_id<R: Rng>(rng: &mut R) -> String {
    (0..MATCH_ID_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Flag every transaction that still posts to a clearing account with `'!'`.
///
/// Returns `entries` unchanged when `config.flag_unmatched` is off.
#[must_use]
pub fn flag_unmatched(mut entries: Vec<Directive>, config: &ZeroSumConfig) -> Vec<Directive> {
    if !config.flag_unmatched {
        return entries;
    }

    let mut flagged = 0usize;
    for entry in &mut entries {
        if let Some(txn) = entry.as_transaction_mut() {
            if txn
                .postings
                .iter()
                .any(|p| config.is_clearing_account(&p.account))
            {
                txn.flag = '!';
                flagged += 1;
            }
        }
    }
    debug!(flagged, "zerosum unmatched transactions flagged");

    entries
}
