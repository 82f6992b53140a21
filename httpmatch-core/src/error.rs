// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the matcher core. `ConfigError` is fatal to server start, `MatchError` is
//! soft and only takes a single route out of contention, `ContractError` indicates a wiring bug
//! (a missing `Replacer` or `VarsStore`) rather than anything a client or config author did.

use std::fmt;

/// Raised while provisioning or validating a matcher from configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A matcher kind name in the configuration has no registered implementation.
    UnknownMatcherKind(String),
    /// A field's pattern failed to compile as a regular expression.
    InvalidRegex {
        /// Name of the matcher field the pattern came from.
        field: String,
        /// Underlying compilation error.
        source: regex::Error,
    },
    /// A host pattern failed IDNA ToASCII conversion.
    InvalidIdna {
        /// The offending host pattern.
        pattern: String,
    },
    /// A regex match field declared named captures but no `Name` to publish them under.
    MissingCaptureName {
        /// The field whose pattern defines capture groups.
        field: String,
    },
    /// The configuration document itself failed to deserialize.
    Deserialize(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMatcherKind(kind) => write!(f, "unknown matcher kind `{kind}`"),
            Self::InvalidRegex { field, source } => {
                write!(f, "invalid regular expression in `{field}`: {source}")
            }
            Self::InvalidIdna { pattern } => {
                write!(f, "host pattern `{pattern}` is not valid IDNA")
            }
            Self::MissingCaptureName { field } => {
                write!(f, "`{field}` has capture groups but no Name to publish them under")
            }
            Self::Deserialize(message) => write!(f, "invalid matcher configuration: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialize(err.to_string())
    }
}

/// Raised while evaluating a matcher against a live request.
///
/// The router treats a `MatchError` as "this route does not match", logs it at `warn!`, and
/// continues to the next route; a single misconfigured or misbehaving matcher must not take down
/// request processing.
#[derive(Debug)]
pub enum MatchError {
    /// A placeholder in a matcher's pattern could not be resolved in strict mode.
    UnresolvedPlaceholder(String),
    /// The regex engine reported an internal error while matching.
    Regex(regex::Error),
    /// The request's deadline expired or its connection was cancelled mid-match.
    Cancelled,
    /// A matcher expected a `Replacer` or `VarsStore` that was not present in the request.
    Contract(ContractError),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedPlaceholder(key) => write!(f, "unresolved placeholder `{{{key}}}`"),
            Self::Regex(err) => write!(f, "regex evaluation failed: {err}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Contract(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Regex(err) => Some(err),
            Self::Contract(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContractError> for MatchError {
    fn from(err: ContractError) -> Self {
        Self::Contract(err)
    }
}

/// Raised when a matcher looks for the `Replacer` or `VarsStore` it is guaranteed to find in the
/// request extensions and does not. This is always a wiring bug: the caller forgot to install the
/// per-request context before running matchers.
///
/// Debug builds are expected to panic on this; [`crate::context::install`] must run first. A
/// production server converts it to a `500 Internal Server Error` instead of crashing the whole
/// process, mirroring `httpmatch_utils::standard_response::error_response`.
#[derive(Debug, Clone, Copy)]
pub struct ContractError(pub &'static str);

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected `{}` in request extensions, found none", self.0)
    }
}

impl std::error::Error for ContractError {}
