//! Built-in plugins.
//!
//! Each plugin takes the full directive list and returns the list the
//! pipeline continues with. A plugin whose configuration cannot be decoded
//! hands its input back untouched together with one error record.

use beanreds_core::{Close, Directive, MetaValue, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::{parse_config, ConfigValue};
use crate::error::ConfigError;
use crate::types::{PluginError, PluginInput, PluginOutput};
use crate::zerosum::{flag_unmatched, ZeroSumConfig, ZeroSumMatcher};

/// Trait for native plugins.
pub trait NativePlugin: Send + Sync {
    /// Plugin name.
    fn name(&self) -> &str;

    /// Process directives and return modified directives + errors.
    fn process(&self, input: PluginInput) -> PluginOutput;
}

/// Registry of built-in native plugins.
pub struct NativePluginRegistry {
    plugins: Vec<Box<dyn NativePlugin>>,
}

impl NativePluginRegistry {
    /// Create a new registry with all built-in plugins.
    pub fn new() -> Self {
        Self {
            plugins: vec![
                Box::new(ZeroSumPlugin::new()),
                Box::new(FlagUnmatchedPlugin),
                Box::new(RenameAccountsPlugin),
                Box::new(AutoCloseTreePlugin),
            ],
        }
    }

    /// Find a plugin by name.
    ///
    /// A dotted module path such as `beancount_reds_plugins.zerosum.zerosum`
    /// resolves by its last segment.
    pub fn find(&self, name: &str) -> Option<&dyn NativePlugin> {
        let name = short_name(name);

        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(std::convert::AsRef::as_ref)
    }

    /// Check if a name refers to a built-in plugin.
    pub fn is_builtin(name: &str) -> bool {
        matches!(
            short_name(name),
            "zerosum" | "flag_unmatched" | "rename_accounts" | "autoclose_tree"
        )
    }

    /// Names of all registered plugins.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.name())
    }
}

impl Default for NativePluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn config_error(plugin: &str, err: &ConfigError) -> PluginError {
    warn!(plugin, error = %err, "invalid plugin configuration");
    PluginError::error(format!("{plugin}: invalid configuration: {err}"))
}

// ============================================================================
// Zero-sum matching
// ============================================================================

/// Plugin that matches zero-sum postings and moves them to a matched account.
///
/// Configured with a literal such as:
///
/// ```text
/// {
///   'zerosum_accounts': {
///     'Assets:Zero-Sum-Accounts:Transfers': ('Assets:ZSA-Matched:Transfers', 30),
///   },
///   'tolerance': 0.0098,
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroSumPlugin {
    seed: Option<u64>,
}

impl ZeroSumPlugin {
    /// Create a plugin drawing match ids from system entropy.
    pub const fn new() -> Self {
        Self { seed: None }
    }

    /// Create a plugin whose match ids are reproducible.
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl NativePlugin for ZeroSumPlugin {
    fn name(&self) -> &'static str {
        "zerosum"
    }

    fn process(&self, input: PluginInput) -> PluginOutput {
        let config = match ZeroSumConfig::from_config_str(input.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                return PluginOutput::passthrough_with_error(
                    input.directives,
                    config_error(self.name(), &e),
                )
            }
        };

        let outcome = match self.seed {
            Some(seed) => {
                ZeroSumMatcher::with_rng(config, StdRng::seed_from_u64(seed)).run(input.directives)
            }
            None => ZeroSumMatcher::new(config).run(input.directives),
        };

        PluginOutput {
            directives: outcome.directives,
            errors: outcome.errors,
        }
    }
}

/// Plugin that flags transactions still posting to a zero-sum account.
///
/// Takes the same configuration as [`ZeroSumPlugin`] and only acts when
/// `flag_unmatched` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagUnmatchedPlugin;

impl NativePlugin for FlagUnmatchedPlugin {
    fn name(&self) -> &'static str {
        "flag_unmatched"
    }

    fn process(&self, input: PluginInput) -> PluginOutput {
        match ZeroSumConfig::from_config_str(input.config.as_deref()) {
            Ok(config) => PluginOutput {
                directives: flag_unmatched(input.directives, &config),
                errors: Vec::new(),
            },
            Err(e) => {
                PluginOutput::passthrough_with_error(input.directives, config_error(self.name(), &e))
            }
        }
    }
}

// ============================================================================
// Account renaming
// ============================================================================

/// Plugin that renames accounts by regular expression.
///
/// Configured with a mapping of pattern to replacement, e.g.
/// `{'Expenses:Taxes': 'Income:Taxes'}`. Every pattern is applied in order
/// to every account-bearing field. Replacements use `\1` or `\g<name>` group
/// references; `$` is literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameAccountsPlugin;

/// Ordered regex renames decoded from a plugin configuration.
#[derive(Debug, Clone)]
pub struct AccountRenames {
    rules: Vec<(Regex, String)>,
}

impl AccountRenames {
    /// Decode renames from a configuration string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is malformed, a replacement is
    /// not a string, or a pattern does not compile.
    pub fn from_config_str(config: Option<&str>) -> Result<Self, ConfigError> {
        let value = parse_config(config)?;
        let entries = value.as_map().unwrap_or_default();

        let rules = entries
            .iter()
            .map(|(pattern, replacement)| {
                let ConfigValue::Str(replacement) = replacement else {
                    return Err(ConfigError::invalid(pattern.as_str(), "a replacement string"));
                };
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Ok((regex, regex_replacement(replacement)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Apply every rule to `account`, returning whether anything changed.
    pub fn apply(&self, account: &mut String) -> bool {
        let mut renamed = false;
        for (pattern, replacement) in &self.rules {
            if pattern.is_match(account) {
                *account = pattern.replace_all(account, replacement.as_str()).into_owned();
                renamed = true;
            }
        }
        renamed
    }
}

/// Rewrite a backslash-style replacement into `regex` syntax.
///
/// `\1` and `\g<name>` become `${1}` and `${name}`, `\\` becomes a single
/// backslash and `$` is escaped. Anything else is copied as is.
fn regex_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut rest = replacement;
    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '$' => out.push_str("$$"),
            '\\' => {
                let digits = rest
                    .bytes()
                    .take(2)
                    .take_while(u8::is_ascii_digit)
                    .count();
                if digits > 0 {
                    out.push_str(&format!("${{{}}}", &rest[..digits]));
                    rest = &rest[digits..];
                } else if let Some(name) = rest
                    .strip_prefix("g<")
                    .and_then(|r| r.split_once('>'))
                    .map(|(name, _)| name)
                    .filter(|name| !name.is_empty())
                {
                    out.push_str(&format!("${{{name}}}"));
                    rest = &rest[name.len() + 3..];
                } else if let Some(after) = rest.strip_prefix('\\') {
                    out.push('\\');
                    rest = after;
                } else {
                    out.push('\\');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

impl NativePlugin for RenameAccountsPlugin {
    fn name(&self) -> &'static str {
        "rename_accounts"
    }

    fn process(&self, input: PluginInput) -> PluginOutput {
        let renames = match AccountRenames::from_config_str(input.config.as_deref()) {
            Ok(renames) => renames,
            Err(e) => {
                return PluginOutput::passthrough_with_error(
                    input.directives,
                    config_error(self.name(), &e),
                )
            }
        };

        let mut rename_count = 0usize;
        let directives: Vec<_> = input
            .directives
            .into_iter()
            .map(|mut directive| {
                match &mut directive {
                    Directive::Transaction(txn) => {
                        for posting in &mut txn.postings {
                            if renames.apply(&mut posting.account) {
                                rename_count += 1;
                            }
                        }
                    }
                    Directive::Pad(pad) => {
                        renames.apply(&mut pad.account);
                        renames.apply(&mut pad.source_account);
                    }
                    Directive::Open(open) => {
                        renames.apply(&mut open.account);
                    }
                    Directive::Close(close) => {
                        renames.apply(&mut close.account);
                    }
                    Directive::Balance(balance) => {
                        renames.apply(&mut balance.account);
                    }
                    Directive::Note(note) => {
                        renames.apply(&mut note.account);
                    }
                }
                directive
            })
            .collect();

        debug!(rename_count, "postings renamed");

        PluginOutput {
            directives,
            errors: Vec::new(),
        }
    }
}

// ============================================================================
// Account tree closing
// ============================================================================

/// Plugin that closes all descendant accounts when a parent account closes.
///
/// When an account like `Assets:Bank` is closed, this plugin also generates
/// close directives for all opened sub-accounts like `Assets:Bank:Checking`,
/// placed just before the parent's close. The parent close itself is only
/// kept if the parent was opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCloseTreePlugin;

impl AutoCloseTreePlugin {
    /// `filename` recorded on the closes this plugin inserts.
    pub const META_DESC: &'static str = "<autoclose_tree>";
}

impl NativePlugin for AutoCloseTreePlugin {
    fn name(&self) -> &'static str {
        "autoclose_tree"
    }

    fn process(&self, input: PluginInput) -> PluginOutput {
        let mut opened: Vec<&str> = Vec::new();
        let mut open_keys: HashSet<(&str, NaiveDate)> = HashSet::new();
        let mut close_keys: HashSet<(&str, NaiveDate)> = HashSet::new();
        let mut closed: HashSet<String> = HashSet::new();
        for directive in &input.directives {
            match directive {
                Directive::Open(open) => {
                    opened.push(open.account.as_str());
                    open_keys.insert((open.account.as_str(), open.date));
                }
                Directive::Close(close) => {
                    closed.insert(close.account.clone());
                    close_keys.insert((close.account.as_str(), close.date));
                }
                _ => {}
            }
        }

        let mut new_directives: Vec<Directive> = Vec::with_capacity(input.directives.len());
        let mut close_count = 0usize;
        for directive in &input.directives {
            let Directive::Close(close) = directive else {
                new_directives.push(directive.clone());
                continue;
            };

            let prefix = format!("{}:", close.account);
            for account in &opened {
                if account.starts_with(&prefix) && closed.insert((*account).to_string()) {
                    let mut child = Close::new(close.date, *account);
                    child.meta.insert(
                        "filename".to_string(),
                        MetaValue::String(Self::META_DESC.to_string()),
                    );
                    child
                        .meta
                        .insert("lineno".to_string(), MetaValue::Number(Decimal::ZERO));
                    new_directives.push(Directive::Close(child));
                    close_count += 1;
                }
            }

            if opened.contains(&close.account.as_str()) {
                new_directives.push(directive.clone());
            }
        }

        // An open and a close of the same account on the same day cancel out.
        new_directives.retain(|directive| match directive {
            Directive::Open(open) => !close_keys.contains(&(open.account.as_str(), open.date)),
            Directive::Close(close) => !open_keys.contains(&(close.account.as_str(), close.date)),
            _ => true,
        });

        debug!(close_count, "close entries added");

        PluginOutput {
            directives: new_directives,
            errors: Vec::new(),
        }
    }
}
