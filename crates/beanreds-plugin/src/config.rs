//! Plugin configuration literals.
//!
//! Plugins are configured with a single string holding a nested literal in
//! the style the ledger files have always used:
//!
//! ```text
//! {
//!   'zerosum_accounts': {
//!     'Assets:Zero-Sum-Accounts:Transfers': ('Assets:ZSA-Matched:Transfers', 30),
//!   },
//!   'tolerance': 0.0098,
//!   'flag_unmatched': True,
//! }
//! ```
//!
//! Mappings, lists, tuples, quoted strings, numbers and the keywords
//! `True`/`False`/`None` (or `true`/`false`/`null`) are accepted. Numbers
//! take the usual literal forms (`0.0098`, `.5`, `1_000`, `1e-2`) and are
//! parsed exactly into [`Decimal`]. Uses chumsky for parser combinators.

use chumsky::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ConfigError;

type ParserInput<'a> = &'a str;
type ParserExtra<'a> = extra::Err<Rich<'a, char>>;

/// A decoded configuration literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// `{key: value, ...}` in source order.
    Map(Vec<(String, ConfigValue)>),
    /// `[...]` or `(...)`.
    List(Vec<ConfigValue>),
    /// Quoted string.
    Str(String),
    /// Decimal number.
    Number(Decimal),
    /// `True` / `False`.
    Bool(bool),
    /// `None`.
    None,
}

impl ConfigValue {
    /// Name of the value kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Map(_) => "mapping",
            Self::List(_) => "sequence",
            Self::Str(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::None => "None",
        }
    }

    /// Get the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the numeric payload.
    #[must_use]
    pub const fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the elements of a list or tuple.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the entries of a mapping.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(String, Self)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key in a mapping. A repeated key resolves to its last
    /// occurrence.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_map()?
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Read a boolean option, falling back to `default` when absent.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.get(key).map_or(Ok(default), |v| {
            v.as_bool().ok_or_else(|| ConfigError::invalid(key, "True or False"))
        })
    }

    /// Read a string option, falling back to `default` when absent.
    pub fn string_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        self.get(key).map_or_else(
            || Ok(default.to_string()),
            |v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| ConfigError::invalid(key, "a string"))
            },
        )
    }

    /// Read a numeric option, falling back to `default` when absent.
    pub fn decimal_or(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        self.get(key).map_or(Ok(default), |v| {
            v.as_decimal()
                .ok_or_else(|| ConfigError::invalid(key, "a number"))
        })
    }

    /// Read a `(str, str)` pair, falling back to `default` when absent.
    pub fn string_pair_or(
        &self,
        key: &str,
        default: (&str, &str),
    ) -> Result<(String, String), ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok((default.0.to_string(), default.1.to_string()));
        };
        match value.as_list() {
            Some([Self::Str(a), Self::Str(b)]) => Ok((a.clone(), b.clone())),
            _ => Err(ConfigError::invalid(key, "a pair of strings")),
        }
    }

    /// Interpret this value as a whole number of days.
    #[must_use]
    pub fn as_days(&self) -> Option<i64> {
        let n = self.as_decimal()?;
        if n.fract().is_zero() {
            n.to_i64()
        } else {
            None
        }
    }
}

/// Parse a configuration literal.
///
/// # Errors
///
/// Returns [`ConfigError::Syntax`] with the byte offset of the first problem.
pub fn parse_literal(source: &str) -> Result<ConfigValue, ConfigError> {
    let (result, errs) = ws()
        .ignore_then(value())
        .then_ignore(ws())
        .then_ignore(end())
        .parse(source)
        .into_output_errors();

    // A bracketed group that fails to parse is skipped and reported, so the
    // earliest error is the one inside the innermost bad group.
    let first = errs.iter().min_by_key(|e| e.span().start);
    match (result, first) {
        (Some(value), None) => Ok(value),
        (_, Some(e)) => Err(ConfigError::Syntax {
            position: e.span().start,
            message: if e.found().is_none() {
                "unexpected end of input".to_string()
            } else {
                e.to_string()
            },
        }),
        (None, None) => Err(ConfigError::Syntax {
            position: source.len(),
            message: "unexpected end of input".to_string(),
        }),
    }
}

/// Parse a plugin's configuration, which must be a mapping.
///
/// A missing or blank configuration is an empty mapping.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the literal is malformed or not a mapping.
pub fn parse_config(config: Option<&str>) -> Result<ConfigValue, ConfigError> {
    let source = config.unwrap_or_default();
    if source.trim().is_empty() {
        return Ok(ConfigValue::Map(Vec::new()));
    }
    let value = parse_literal(source)?;
    if value.as_map().is_none() {
        return Err(ConfigError::NotAMapping {
            found: value.kind(),
        });
    }
    Ok(value)
}

/// Whitespace and `#` comments.
fn ws<'a>() -> impl Parser<'a, ParserInput<'a>, (), ParserExtra<'a>> + Clone {
    let comment = just('#').then(none_of("\n").repeated()).ignored();
    one_of(" \t\r\n")
        .ignored()
        .or(comment)
        .repeated()
        .ignored()
}

fn value<'a>() -> impl Parser<'a, ParserInput<'a>, ConfigValue, ParserExtra<'a>> + Clone {
    recursive(|value| {
        let comma = ws().then(just(',')).then(ws());

        let list = value
            .clone()
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('[').then(ws()), ws().then(just(']')));

        let tuple = value
            .clone()
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('(').then(ws()), ws().then(just(')')));

        let entry = string_literal()
            .then_ignore(ws().then(just(':')).then(ws()))
            .then(value);

        let map = entry
            .separated_by(comma)
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('{').then(ws()), ws().then(just('}')));

        choice((
            map.map(ConfigValue::Map)
                .recover_with(via_parser(skip_group('{').to(ConfigValue::None))),
            list.map(ConfigValue::List)
                .recover_with(via_parser(skip_group('[').to(ConfigValue::None))),
            tuple
                .map(ConfigValue::List)
                .recover_with(via_parser(skip_group('(').to(ConfigValue::None))),
            string_literal().map(ConfigValue::Str),
            keyword(),
            decimal().map(ConfigValue::Number),
        ))
    })
}

/// Skip a group opened by `open` up to its closing bracket or the end of
/// input. Nested groups and quoted strings are skipped whole; the closing
/// bracket need not match the opening one.
fn skip_group<'a>(open: char) -> impl Parser<'a, ParserInput<'a>, (), ParserExtra<'a>> + Clone {
    let body = recursive(|body| {
        choice((
            string_literal().ignored(),
            one_of("{[(").ignore_then(body),
            none_of("{}[]()").ignored(),
        ))
        .repeated()
        .then(one_of("}])").ignored().or(end()))
        .ignored()
    });
    just(open).ignore_then(body)
}

fn keyword<'a>() -> impl Parser<'a, ParserInput<'a>, ConfigValue, ParserExtra<'a>> + Clone {
    choice((
        text::keyword("True").to(ConfigValue::Bool(true)),
        text::keyword("true").to(ConfigValue::Bool(true)),
        text::keyword("False").to(ConfigValue::Bool(false)),
        text::keyword("false").to(ConfigValue::Bool(false)),
        text::keyword("None").to(ConfigValue::None),
        text::keyword("null").to(ConfigValue::None),
    ))
}

/// Single- or double-quoted string with backslash escapes.
///
/// Unknown escapes such as `\w` keep their backslash so regular expressions
/// survive unchanged.
fn string_literal<'a>() -> impl Parser<'a, ParserInput<'a>, String, ParserExtra<'a>> + Clone {
    let escape = just('\\').ignore_then(any()).map(|c: char| match c {
        'n' => "\n".to_string(),
        't' => "\t".to_string(),
        '\\' | '\'' | '"' => c.to_string(),
        other => format!("\\{other}"),
    });

    let single = just('\'')
        .ignore_then(
            none_of("'\\")
                .map(String::from)
                .or(escape.clone())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(just('\''));

    let double = just('"')
        .ignore_then(
            none_of("\"\\")
                .map(String::from)
                .or(escape)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(just('"'));

    single.or(double).map(|parts| parts.concat())
}

/// Python-style number: `12`, `-0.5`, `.5`, `1.`, `1_000`, `1e-2`.
fn decimal<'a>() -> impl Parser<'a, ParserInput<'a>, Decimal, ParserExtra<'a>> + Clone {
    let int = one_of("0123456789").then(one_of("0123456789_").repeated());
    let mantissa = choice((
        int.clone()
            .then(just('.').then(int.clone().or_not()).or_not())
            .ignored(),
        just('.').then(int.clone()).ignored(),
    ));
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(int);

    one_of("+-")
        .or_not()
        .then(mantissa)
        .then(exponent.or_not())
        .to_slice()
        .try_map(|text: &str, span| {
            number_from_literal(text).ok_or_else(|| Rich::custom(span, "invalid number"))
        })
}

/// Convert the text of a numeric literal to an exact decimal.
///
/// Underscores must sit between two digits.
fn number_from_literal(text: &str) -> Option<Decimal> {
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'_' {
            let before = i.checked_sub(1).and_then(|j| bytes.get(j));
            let after = bytes.get(i + 1);
            if !before.is_some_and(u8::is_ascii_digit) || !after.is_some_and(u8::is_ascii_digit) {
                return None;
            }
        }
    }

    let text = text.replace('_', "");
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text.as_str())),
    };
    let (mantissa, exponent) = match unsigned.split_once(|c: char| c == 'e' || c == 'E') {
        Some((m, e)) => (m, Some(e.parse::<i32>().ok()?)),
        None => (unsigned, None),
    };

    let mut mantissa = mantissa.to_string();
    if mantissa.starts_with('.') {
        mantissa.insert(0, '0');
    }
    if mantissa.ends_with('.') {
        mantissa.push('0');
    }

    let number = match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{mantissa}e{exp}")).ok()?,
        None => Decimal::from_str(&mantissa).ok()?,
    };
    Some(if negative { -number } else { number })
}
