// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transfer filter rules.
//!
//! A rule is `+ PATTERN` (include) or `- PATTERN` (exclude). Rules are
//! evaluated in order; the first match wins and an unmatched path is
//! included. Pattern syntax itself is validated by the engine seam; this
//! module only owns the rule shape.

use crate::error::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("filter rule must start with '+ ' or '- ': {0:?}")]
    BadPrefix(String),
    #[error("filter rule has an empty pattern")]
    EmptyPattern,
}

impl Classify for FilterParseError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// A parsed include/exclude rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterRule {
    Include(String),
    Exclude(String),
}

impl FilterRule {
    /// Parse `"+ PATTERN"` / `"- PATTERN"`. Surrounding whitespace on the
    /// pattern is trimmed; the single space after the sign is required.
    pub fn parse(raw: &str) -> Result<Self, FilterParseError> {
        let rule = if let Some(rest) = raw.strip_prefix("+ ") {
            FilterRule::Include(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("- ") {
            FilterRule::Exclude(rest.trim().to_string())
        } else {
            return Err(FilterParseError::BadPrefix(raw.to_string()));
        };
        if rule.pattern().is_empty() {
            return Err(FilterParseError::EmptyPattern);
        }
        Ok(rule)
    }

    /// Parse a whole rule list, failing on the first bad entry.
    pub fn parse_all(raw: &[String]) -> Result<Vec<Self>, FilterParseError> {
        raw.iter().map(|r| Self::parse(r)).collect()
    }

    pub fn pattern(&self) -> &str {
        match self {
            FilterRule::Include(p) | FilterRule::Exclude(p) => p,
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, FilterRule::Include(_))
    }
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterRule::Include(p) => write!(f, "+ {}", p),
            FilterRule::Exclude(p) => write!(f, "- {}", p),
        }
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
