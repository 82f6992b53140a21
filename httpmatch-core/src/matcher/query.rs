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

//! `MatchQuery`: AND-across-keys matching of URL query parameters, mirroring `MatchHeader` with
//! one addition -- an empty value pattern matches a parameter present with an empty or missing
//! value.

use super::Matcher;
use crate::error::{ConfigError, MatchError};
use httpmatch_utils::RequestContext;

/// A query key and its (possibly absent) list of acceptable value patterns.
#[derive(Debug, Clone)]
pub struct QueryRule {
    /// Query parameter name, possibly a `{placeholder}`.
    pub key: String,
    /// Value patterns to OR within this key. `None` means the key must merely be present
    /// (logically equivalent to `values = ["*"]`).
    pub values: Option<Vec<String>>,
}

/// Matches the request's URL query string against a set of per-key rules.
///
/// An empty `MatchQuery` (no rules at all) matches a request whose query string is itself empty,
/// and only then. With one or more rules, matching is AND across keys, OR within a key's value
/// patterns; `""` matches a parameter present with an empty or missing value (`?k=` or `?k`),
/// and `"*"` matches any value provided the key is present.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    rules: Vec<QueryRule>,
}

impl MatchQuery {
    /// Creates a matcher from unprocessed rules. Call [`Matcher::provision`] before use.
    pub fn new(rules: impl IntoIterator<Item = QueryRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }
}

/// Parses an `application/x-www-form-urlencoded`-style query string into ordered pairs,
/// preserving keys with no `=` (bare `?k`) as a `None` value.
fn parse_query(raw: &str) -> Vec<(String, Option<String>)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), Some(decode_component(value))),
            None => (decode_component(pair), None),
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let replaced = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&replaced)
        .decode_utf8_lossy()
        .into_owned()
}

impl Matcher for MatchQuery {
    fn provision(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        let query = ctx.uri().query().unwrap_or("");
        if self.rules.is_empty() {
            return Ok(query.is_empty());
        }

        let parsed = parse_query(query);
        let replacer = crate::context::replacer(ctx)?;

        for rule in &self.rules {
            let key = if rule.key.contains('{') {
                replacer.replace_all(&rule.key, "")
            } else {
                rule.key.clone()
            };

            let values: Vec<Option<&str>> = parsed
                .iter()
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v.as_deref())
                .collect();
            let present = !values.is_empty();

            match &rule.values {
                None => {
                    if !present {
                        return Ok(false);
                    }
                }
                Some(patterns) => {
                    if !present {
                        return Ok(false);
                    }
                    let matched = values.iter().any(|value| {
                        let value_str = value.unwrap_or("");
                        patterns.iter().any(|pattern| {
                            let expanded = replacer.replace_all(pattern, "");
                            match expanded.as_str() {
                                "" => value_str.is_empty(),
                                "*" => true,
                                literal => literal == value_str,
                            }
                        })
                    });
                    if !matched {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }
}
