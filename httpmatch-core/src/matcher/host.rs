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

//! `MatchHost`: matches the request's `Host` header (falling back to the URI authority) against
//! a list of exact, wildcard, or placeholder-bearing host patterns.

use super::Matcher;
use crate::error::{ConfigError, MatchError};
use crate::idna;
use httpmatch_utils::{host_without_port, RequestContext};
use log::trace;

/// A single host pattern, classified after provisioning.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Wildcard(Vec<String>),
    Placeholder(String),
}

/// Matches the request host against a list of patterns.
///
/// Exact patterns are IDNA-normalized, lowercased, and kept sorted for binary search. Wildcard
/// patterns use `*` to match exactly one dot-separated label. Patterns containing `{...}` are
/// expanded against the request's `Replacer` at match time and compared as exact or wildcard
/// depending on whether the expansion still contains `*`.
#[derive(Debug, Clone)]
pub struct MatchHost {
    raw_patterns: Vec<String>,
    exact: Vec<String>,
    wildcard: Vec<Vec<String>>,
    placeholder: Vec<String>,
}

impl MatchHost {
    /// Creates a matcher from unprocessed host patterns. Call [`Matcher::provision`] before use.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            raw_patterns: patterns.into_iter().map(Into::into).collect(),
            exact: Vec::new(),
            wildcard: Vec::new(),
            placeholder: Vec::new(),
        }
    }

    fn match_labels(host_labels: &[&str], pattern_labels: &[String]) -> bool {
        if host_labels.len() != pattern_labels.len() {
            return false;
        }
        host_labels
            .iter()
            .zip(pattern_labels.iter())
            .all(|(host_label, pattern_label)| pattern_label == "*" || host_label == pattern_label)
    }
}

impl Matcher for MatchHost {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for pattern in &self.raw_patterns {
            if pattern.contains('{') {
                self.placeholder.push(pattern.clone());
                continue;
            }

            let normalized = idna::to_ascii_lowercase(pattern)?;
            if normalized.contains('*') {
                self.wildcard
                    .push(normalized.split('.').map(str::to_owned).collect());
            } else {
                self.exact.push(normalized);
            }
        }
        self.exact.sort();
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        let Some(host) = ctx.host() else {
            return Ok(false);
        };
        let host = host_without_port(&host).to_owned();
        let normalized = idna::to_ascii_lowercase(&host).unwrap_or_else(|_| host.to_lowercase());

        if !self.exact.is_empty() && self.exact.binary_search(&normalized).is_ok() {
            return Ok(true);
        }

        let host_labels: Vec<&str> = normalized.split('.').collect();
        if self
            .wildcard
            .iter()
            .any(|pattern| Self::match_labels(&host_labels, pattern))
        {
            return Ok(true);
        }

        if self.placeholder.is_empty() {
            return Ok(false);
        }

        let replacer = crate::context::replacer(ctx)?;
        for pattern in &self.placeholder {
            let Ok(expanded) = replacer.replace_or_err(pattern) else {
                trace!("host pattern {pattern} left unresolved placeholders, skipping");
                continue;
            };
            let expanded = expanded.to_ascii_lowercase();
            if expanded.contains('*') {
                let pattern_labels: Vec<String> =
                    expanded.split('.').map(str::to_owned).collect();
                if Self::match_labels(&host_labels, &pattern_labels) {
                    return Ok(true);
                }
            } else if expanded == normalized {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
