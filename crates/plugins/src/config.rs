//! Option strings for plugins.
//!
//! A plugin declares its options as a `clap` parser. The option string is
//! split on whitespace and parsed against it; any rejection becomes a
//! [`ConfigError`] naming the offending token and carrying the usage text.

use std::fmt;

use clap::error::{ContextKind, ContextValue};
use clap::{CommandFactory, Parser};
use reckon_core::{Diagnostic, Meta};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}\n\n{usage}")]
pub struct ConfigError {
    /// The option or value that was rejected, when known.
    pub token: Option<String>,
    pub message: String,
    pub usage: String,
}

impl ConfigError {
    /// An error about `token` for the plugin whose options are `T`.
    pub fn invalid<T: CommandFactory>(token: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError {
            token: Some(token.into()),
            message: message.into(),
            usage: usage::<T>(),
        }
    }

    fn from_clap<T: CommandFactory>(err: &clap::Error) -> Self {
        let token = [ContextKind::InvalidValue, ContextKind::InvalidArg]
            .into_iter()
            .find_map(|kind| match err.get(kind) {
                Some(ContextValue::String(s)) => Some(s.clone()),
                _ => None,
            });
        let rendered = err.to_string();
        let message = rendered
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string();
        ConfigError {
            token,
            message,
            usage: usage::<T>(),
        }
    }

    /// Report against the plugin directive of `filename`.
    pub fn to_diagnostic(&self, filename: &str) -> Diagnostic {
        Diagnostic::error(Meta::new(filename, 0), self.to_string())
    }
}

fn usage<T: CommandFactory>() -> String {
    T::command().render_help().to_string()
}

/// Parse a plugin option string into `T`.
pub fn parse_options<T: Parser>(config: &str) -> Result<T, ConfigError> {
    let name = T::command().get_name().to_string();
    let args = std::iter::once(name.as_str()).chain(config.split_whitespace());
    T::try_parse_from(args).map_err(|err| ConfigError::from_clap::<T>(&err))
}

/// A clearing account and the main account whose transfers it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPair {
    pub clearing: String,
    pub main: String,
}

impl fmt::Display for AccountPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.clearing, self.main)
    }
}

pub fn parse_account_pair(s: &str) -> Result<AccountPair, String> {
    match s.split(',').collect::<Vec<_>>().as_slice() {
        [clearing, main] if !clearing.is_empty() && !main.is_empty() => Ok(AccountPair {
            clearing: clearing.to_string(),
            main: main.to_string(),
        }),
        _ => Err(format!(
            "invalid account pair: '{s}'; expecting clearing and main account names separated by a comma (no spaces)"
        )),
    }
}

pub fn parse_regex(s: &str) -> Result<Regex, String> {
    Regex::new(s).map_err(|_| format!("invalid regular expression: '{s}'"))
}
