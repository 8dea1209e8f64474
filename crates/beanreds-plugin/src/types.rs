//! Plugin interface types.
//!
//! A plugin receives the whole directive list by value and hands back the
//! list it wants the pipeline to continue with, plus any errors it found.

use beanreds_core::Directive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input passed to a plugin.
#[derive(Debug, Clone, Default)]
pub struct PluginInput {
    /// All directives to process.
    pub directives: Vec<Directive>,
    /// Ledger options.
    pub options: PluginOptions,
    /// Plugin-specific configuration string.
    pub config: Option<String>,
}

impl PluginInput {
    /// Create an input with default options and no configuration.
    pub fn new(directives: Vec<Directive>) -> Self {
        Self {
            directives,
            ..Self::default()
        }
    }

    /// Attach a configuration string.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }
}

/// Ledger options visible to plugins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginOptions {
    /// Operating currencies, in declaration order.
    pub operating_currencies: Vec<String>,
    /// Ledger title.
    pub title: Option<String>,
}

/// Output from a plugin.
#[derive(Debug, Clone, Default)]
pub struct PluginOutput {
    /// Directives after processing.
    pub directives: Vec<Directive>,
    /// Errors generated by the plugin.
    pub errors: Vec<PluginError>,
}

impl PluginOutput {
    /// Pass directives through untouched, reporting a single error.
    pub fn passthrough_with_error(directives: Vec<Directive>, error: PluginError) -> Self {
        Self {
            directives,
            errors: vec![error],
        }
    }
}

/// Severity of a plugin error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginErrorSeverity {
    /// Reported to the user, processing continues.
    Warning,
    /// The plugin could not do its job.
    Error,
}

/// An error record collected by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginError {
    /// Error message.
    pub message: String,
    /// Source file, if known.
    pub source_file: Option<String>,
    /// Line number, if known.
    pub line_number: Option<u32>,
    /// Error severity.
    pub severity: PluginErrorSeverity,
}

impl PluginError {
    /// Create an error-severity record.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_file: None,
            line_number: None,
            severity: PluginErrorSeverity::Error,
        }
    }

    /// Create a warning-severity record.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_file: None,
            line_number: None,
            severity: PluginErrorSeverity::Warning,
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source_file = Some(file.into());
        self.line_number = Some(line);
        self
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(file), Some(line)) = (&self.source_file, self.line_number) {
            write!(f, "{file}:{line}: ")?;
        }
        write!(f, "{}", self.message)
    }
}
