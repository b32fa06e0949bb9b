//! Ledger post-processing stages. Each plugin takes the full list of
//! directives plus a whitespace-separated option string and returns the
//! processed directives with any diagnostics.

pub mod clear;
pub mod config;
pub mod deposit_in_transit;

use reckon_core::{Diagnostic, Directive, SortOrder};

pub use clear::clear_transactions;
pub use config::ConfigError;
pub use deposit_in_transit::deposit_in_transit;

/// What a plugin knows about the run it is part of.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// Name of the ledger file, used as the source of configuration errors.
    pub filename: String,
    /// Command line of the running process.
    pub argv: Vec<String>,
    pub sort_order: SortOrder,
}

impl PluginContext {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            argv: std::env::args().collect(),
            sort_order: SortOrder::default(),
        }
    }
}

pub type PluginOutput = (Vec<Directive>, Vec<Diagnostic>);
