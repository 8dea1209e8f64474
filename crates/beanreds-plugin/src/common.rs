//! Helpers shared by several plugins.

use beanreds_core::{Directive, MetaValue, NaiveDate, Open};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashSet};

/// Create `Open` directives for the accounts in `new_accounts` that are not
/// already opened or closed somewhere in `entries`.
///
/// The opens are emitted in account-name order, dated at the earliest date
/// found in `entries`, and carry `filename = meta_desc` / `lineno = 0`
/// metadata so they can be traced back to the plugin that made them. An empty
/// `entries` list yields no opens.
pub fn create_open_directives<'a, I>(
    new_accounts: I,
    entries: &[Directive],
    meta_desc: &str,
) -> Vec<Directive>
where
    I: IntoIterator<Item = &'a String>,
{
    let Some(earliest_date) = earliest_date(entries) else {
        return Vec::new();
    };

    let known: HashSet<&str> = entries
        .iter()
        .filter_map(|entry| match entry {
            Directive::Open(open) => Some(open.account.as_str()),
            Directive::Close(close) => Some(close.account.as_str()),
            _ => None,
        })
        .collect();

    let wanted: BTreeSet<&String> = new_accounts.into_iter().collect();

    wanted
        .into_iter()
        .filter(|account| !known.contains(account.as_str()))
        .map(|account| {
            let mut open = Open::new(earliest_date, account.clone());
            open.meta
                .insert("filename".to_string(), MetaValue::String(meta_desc.to_string()));
            open.meta
                .insert("lineno".to_string(), MetaValue::Number(Decimal::ZERO));
            Directive::Open(open)
        })
        .collect()
}

/// Earliest date among `entries`.
pub fn earliest_date(entries: &[Directive]) -> Option<NaiveDate> {
    entries.iter().map(Directive::date).min()
}

/// Source location recorded in a directive's metadata, if any.
pub fn source_location(entry: &Directive) -> Option<(String, u32)> {
    let meta = entry.meta();
    let file = meta.get("filename")?.as_str()?.to_string();
    let line = match meta.get("lineno")? {
        MetaValue::Number(n) => n.to_u32()?,
        _ => return None,
    };
    Some((file, line))
}
