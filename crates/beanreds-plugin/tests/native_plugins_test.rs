//! Integration tests for the account renaming and tree closing plugins.

use beanreds_core::{
    Amount, Balance, Close, Directive, NaiveDate, Note, Open, Pad, Posting, Transaction,
};
use beanreds_plugin::native::{
    AutoCloseTreePlugin, NativePlugin, NativePluginRegistry, RenameAccountsPlugin,
};
use beanreds_plugin::types::*;
use rust_decimal_macros::dec;

// ============================================================================
// Helper Functions
// ============================================================================

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn make_open(d: &str, account: &str) -> Directive {
    Directive::Open(Open::new(date(d), account))
}

fn make_close(d: &str, account: &str) -> Directive {
    Directive::Close(Close::new(date(d), account))
}

fn make_transfer(d: &str, from: &str, to: &str) -> Directive {
    Directive::Transaction(
        Transaction::new(date(d), "")
            .with_posting(Posting::new(from, Amount::new(dec!(-1000), "USD")))
            .with_posting(Posting::new(to, Amount::new(dec!(1000), "USD"))),
    )
}

/// Open and close directives as `(kind, date, account)`, sorted.
fn summarize(directives: &[Directive]) -> Vec<(&'static str, String, String)> {
    let mut rows: Vec<_> = directives
        .iter()
        .filter_map(|d| match d {
            Directive::Open(o) => Some(("open", o.date.to_string(), o.account.clone())),
            Directive::Close(c) => Some(("close", c.date.to_string(), c.account.clone())),
            _ => None,
        })
        .collect();
    rows.sort();
    rows
}

fn rows(expected: &[(&'static str, &str, &str)]) -> Vec<(&'static str, String, String)> {
    let mut rows: Vec<_> = expected
        .iter()
        .map(|(k, d, a)| (*k, (*d).to_string(), (*a).to_string()))
        .collect();
    rows.sort();
    rows
}

fn close_tree(directives: Vec<Directive>) -> PluginOutput {
    AutoCloseTreePlugin.process(PluginInput::new(directives))
}

fn rename(directives: Vec<Directive>, config: &str) -> PluginOutput {
    RenameAccountsPlugin.process(PluginInput::new(directives).with_config(config))
}

// ============================================================================
// autoclose_tree
// ============================================================================

#[test]
fn test_close_tree_empty_entries() {
    let output = close_tree(vec![]);
    assert!(output.directives.is_empty());
    assert!(output.errors.is_empty());
}

#[test]
fn test_close_tree_basic() {
    let output = close_tree(vec![
        make_open("2014-01-01", "Assets:XBank"),
        make_open("2014-01-01", "Assets:XBank:AAPL"),
        make_close("2015-01-01", "Assets:XBank"),
    ]);

    assert_eq!(
        summarize(&output.directives),
        rows(&[
            ("open", "2014-01-01", "Assets:XBank"),
            ("open", "2014-01-01", "Assets:XBank:AAPL"),
            ("close", "2015-01-01", "Assets:XBank"),
            ("close", "2015-01-01", "Assets:XBank:AAPL"),
        ])
    );
}

#[test]
fn test_close_tree_leaves_others_untouched() {
    let output = close_tree(vec![
        make_open("2014-01-01", "Assets:YBank"),
        make_open("2014-01-01", "Assets:YBank:AAPL"),
        make_open("2014-01-01", "Assets:XBank"),
        make_open("2014-01-01", "Assets:XBank:AAPL"),
        make_open("2014-01-01", "Assets:XBank:AAPL:Fuji"),
        make_open("2014-01-01", "Assets:XBank:ORNG"),
        make_close("2015-01-01", "Assets:XBank"),
    ]);

    let closes: Vec<_> = summarize(&output.directives)
        .into_iter()
        .filter(|(kind, _, _)| *kind == "close")
        .map(|(_, _, account)| account)
        .collect();
    assert_eq!(
        closes,
        vec![
            "Assets:XBank",
            "Assets:XBank:AAPL",
            "Assets:XBank:AAPL:Fuji",
            "Assets:XBank:ORNG",
        ]
    );
}

#[test]
fn test_close_tree_keeps_earlier_child_close() {
    let output = close_tree(vec![
        make_open("2014-01-01", "Assets:XBank"),
        make_open("2014-01-01", "Assets:XBank:AAPL"),
        make_open("2014-01-01", "Assets:XBank:AAPL:Fuji"),
        make_close("2015-01-01", "Assets:XBank:AAPL"),
        make_close("2016-01-01", "Assets:XBank"),
    ]);

    assert_eq!(
        summarize(&output.directives),
        rows(&[
            ("open", "2014-01-01", "Assets:XBank"),
            ("open", "2014-01-01", "Assets:XBank:AAPL"),
            ("open", "2014-01-01", "Assets:XBank:AAPL:Fuji"),
            ("close", "2015-01-01", "Assets:XBank:AAPL"),
            ("close", "2015-01-01", "Assets:XBank:AAPL:Fuji"),
            ("close", "2016-01-01", "Assets:XBank"),
        ])
    );
}

#[test]
fn test_close_tree_requires_component_boundary() {
    let output = close_tree(vec![
        make_open("2017-11-10", "Liabilities:Credit-Cards:Citi"),
        make_open("2017-11-10", "Liabilities:Credit-Cards:Citi-CustomCash"),
        make_open("2017-11-10", "Liabilities:Credit-Cards:Citi:Addon"),
        make_close("2018-11-10", "Liabilities:Credit-Cards:Citi"),
    ]);

    let closed: Vec<_> = summarize(&output.directives)
        .into_iter()
        .filter(|(kind, _, _)| *kind == "close")
        .map(|(_, _, account)| account)
        .collect();
    assert_eq!(
        closed,
        vec!["Liabilities:Credit-Cards:Citi", "Liabilities:Credit-Cards:Citi:Addon"]
    );
}

#[test]
fn test_close_tree_unopened_parent() {
    let output = close_tree(vec![
        make_open("2017-11-10", "Assets:Brokerage:AAPL"),
        make_open("2017-11-10", "Assets:Brokerage:ORNG"),
        make_close("2018-11-10", "Assets:Brokerage"),
    ]);

    assert_eq!(
        summarize(&output.directives),
        rows(&[
            ("open", "2017-11-10", "Assets:Brokerage:AAPL"),
            ("open", "2017-11-10", "Assets:Brokerage:ORNG"),
            ("close", "2018-11-10", "Assets:Brokerage:AAPL"),
            ("close", "2018-11-10", "Assets:Brokerage:ORNG"),
        ])
    );
}

#[test]
fn test_close_tree_drops_same_day_parent_open() {
    let output = close_tree(vec![
        make_open("2019-01-01", "Expenses:Auto:Fit:Insurance"),
        make_open("2019-01-01", "Expenses:Auto:Fit:Gas"),
        make_transfer("2019-01-01", "Expenses:Auto:Fit:Insurance", "Expenses:Auto:Fit:Gas"),
        make_open("2021-06-17", "Expenses:Auto:Fit"),
        make_close("2021-06-17", "Expenses:Auto:Fit"),
    ]);

    assert_eq!(
        summarize(&output.directives),
        rows(&[
            ("open", "2019-01-01", "Expenses:Auto:Fit:Insurance"),
            ("open", "2019-01-01", "Expenses:Auto:Fit:Gas"),
            ("close", "2021-06-17", "Expenses:Auto:Fit:Insurance"),
            ("close", "2021-06-17", "Expenses:Auto:Fit:Gas"),
        ])
    );
    assert_eq!(output.directives.len(), 5);
}

#[test]
fn test_close_tree_children_precede_parent() {
    let output = close_tree(vec![
        make_open("2014-01-01", "Assets:XBank"),
        make_open("2014-01-01", "Assets:XBank:AAPL"),
        make_open("2014-01-01", "Assets:XBank:ORNG"),
        make_close("2015-01-01", "Assets:XBank"),
        make_open("2015-02-01", "Assets:Cash"),
    ]);

    let closes: Vec<&str> = output
        .directives
        .iter()
        .filter_map(|d| match d {
            Directive::Close(c) => Some(c.account.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        closes,
        vec!["Assets:XBank:AAPL", "Assets:XBank:ORNG", "Assets:XBank"]
    );
    assert!(matches!(
        output.directives.last(),
        Some(Directive::Open(o)) if o.account == "Assets:Cash"
    ));
}

#[test]
fn test_close_tree_marks_inserted_closes() {
    let output = close_tree(vec![
        make_open("2014-01-01", "Assets:XBank"),
        make_open("2014-01-01", "Assets:XBank:AAPL"),
        make_close("2015-01-01", "Assets:XBank"),
    ]);

    let inserted = output
        .directives
        .iter()
        .find(|d| matches!(d, Directive::Close(c) if c.account == "Assets:XBank:AAPL"))
        .unwrap();
    assert_eq!(
        inserted.meta().get("filename").and_then(|v| v.as_str()),
        Some(AutoCloseTreePlugin::META_DESC)
    );
}

// ============================================================================
// rename_accounts
// ============================================================================

#[test]
fn test_rename_empty_config() {
    let entries = vec![
        make_open("2014-01-01", "Assets:Account1"),
        make_transfer("2014-01-15", "Income:Misc", "Assets:Account1"),
    ];

    let output = rename(entries.clone(), "{}");
    assert_eq!(output.directives, entries);
    assert!(output.errors.is_empty());
}

#[test]
fn test_rename_single_account() {
    let output = rename(
        vec![
            make_open("2014-01-01", "Assets:Account2"),
            make_open("2014-01-01", "Expenses:Taxes"),
            make_transfer("2014-01-16", "Assets:Account2", "Expenses:Taxes"),
        ],
        "{'Expenses:Taxes' : 'Income:Taxes'}",
    );

    assert_eq!(
        output.directives,
        vec![
            make_open("2014-01-01", "Assets:Account2"),
            make_open("2014-01-01", "Income:Taxes"),
            make_transfer("2014-01-16", "Assets:Account2", "Income:Taxes"),
        ]
    );
}

#[test]
fn test_rename_all_directives() {
    let d = date("2014-01-15");
    let output = rename(
        vec![
            make_open("2014-01-01", "Assets:Account1"),
            Directive::Pad(Pad::new(
                date("2014-01-14"),
                "Assets:Account1",
                "Equity:Opening-Balances",
            )),
            Directive::Balance(Balance::new(
                d,
                "Assets:Account1",
                Amount::new(dec!(1000), "USD"),
            )),
            make_transfer("2014-01-16", "Assets:Account1", "Assets:Account2"),
            Directive::Note(Note::new(date("2014-01-18"), "Assets:Account1", "Test note")),
            make_close("2014-12-31", "Assets:Account1"),
        ],
        "{
            'Assets:Account1': 'Assets:Cash',
            'Assets:Account2': 'Assets:AAPL',
            'Equity:Opening-Balances': 'Equity:OpeningBalances',
        }",
    );

    let mentioned: Vec<String> = output
        .directives
        .iter()
        .flat_map(|d| match d {
            Directive::Open(o) => vec![o.account.clone()],
            Directive::Close(c) => vec![c.account.clone()],
            Directive::Balance(b) => vec![b.account.clone()],
            Directive::Note(n) => vec![n.account.clone()],
            Directive::Pad(p) => vec![p.account.clone(), p.source_account.clone()],
            Directive::Transaction(t) => t.postings.iter().map(|p| p.account.clone()).collect(),
        })
        .collect();

    assert!(mentioned.iter().all(|a| !a.contains("Account")), "{mentioned:?}");
    assert!(mentioned.contains(&"Equity:OpeningBalances".to_string()));
    assert!(mentioned.contains(&"Assets:AAPL".to_string()));
}

#[test]
fn test_rename_with_capture_groups() {
    let output = rename(
        vec![make_transfer("2014-01-16", "Assets:Old:Checking", "Expenses:Food")],
        r"{'^Assets:Old:(\w+)$': 'Assets:New:\1'}",
    );

    let txn = output.directives[0].as_transaction().unwrap();
    assert_eq!(txn.postings[0].account, "Assets:New:Checking");
    assert_eq!(txn.postings[1].account, "Expenses:Food");
}

#[test]
fn test_rename_with_named_group() {
    let output = rename(
        vec![make_open("2014-01-01", "Assets:Old:Savings")],
        r"{'^Assets:Old:(?P<kind>\w+)$': 'Assets:\g<kind>:Old'}",
    );

    assert_eq!(output.directives, vec![make_open("2014-01-01", "Assets:Savings:Old")]);
}

#[test]
fn test_rename_invalid_pattern_passes_through() {
    let entries = vec![make_open("2014-01-01", "Assets:Account1")];

    let output = rename(entries.clone(), "{'Assets:(': 'X'}");

    assert_eq!(output.directives, entries);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].severity, PluginErrorSeverity::Error);
    assert!(output.errors[0].message.contains("Assets:("));
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_runs_plugins_by_module_path() {
    let registry = NativePluginRegistry::new();
    let plugin = registry
        .find("beancount_reds_plugins.rename_accounts.rename_accounts")
        .unwrap();

    let output = plugin.process(
        PluginInput::new(vec![make_open("2014-01-01", "Expenses:Taxes")])
            .with_config("{'Expenses': 'Income'}"),
    );

    assert_eq!(output.directives, vec![make_open("2014-01-01", "Income:Taxes")]);
}
