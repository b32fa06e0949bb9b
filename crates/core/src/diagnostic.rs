use serde::{Deserialize, Serialize};
use std::fmt;

use super::entry::Meta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal problem found while processing, tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub source: Meta,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(source: Meta, message: impl Into<String>) -> Self {
        Diagnostic {
            source,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(source: Meta, message: impl Into<String>) -> Self {
        Diagnostic {
            source,
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}
