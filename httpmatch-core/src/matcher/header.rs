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

//! `MatchHeader`: AND-across-keys, OR-within-key matching of request headers.

use super::Matcher;
use crate::error::{ConfigError, MatchError};
use httpmatch_utils::{host_without_port, RequestContext};

/// A header key and its (possibly absent) list of acceptable value patterns.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    /// Canonical header name, or `Host` to read the request's host field instead.
    pub key: String,
    /// Value patterns to OR within this key. `None` means the header must be *absent*.
    pub values: Option<Vec<String>>,
}

/// Matches request headers against a set of per-key rules.
///
/// Per key: the key matches iff the request carries that header with at least one value
/// matching any listed pattern (OR within a key), or -- if `values` is `None` -- iff the header
/// is absent entirely. Across keys: AND, short-circuiting on the first non-match. Patterns
/// support a leading `*`, trailing `*`, both, or neither; placeholders are expanded first.
#[derive(Debug, Clone)]
pub struct MatchHeader {
    rules: Vec<HeaderRule>,
}

impl MatchHeader {
    /// Creates a matcher from unprocessed rules. Call [`Matcher::provision`] before use.
    pub fn new(rules: impl IntoIterator<Item = HeaderRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    fn value_matches(pattern: &str, candidate: &str) -> bool {
        match (pattern.starts_with('*'), pattern.ends_with('*')) {
            (true, true) if pattern.len() >= 2 => {
                candidate.contains(&pattern[1..pattern.len() - 1])
            }
            (true, _) => candidate.ends_with(&pattern[1..]),
            (_, true) => candidate.starts_with(&pattern[..pattern.len() - 1]),
            (false, false) => candidate == pattern,
        }
    }
}

impl Matcher for MatchHeader {
    fn provision(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        if self.rules.is_empty() {
            return Ok(true);
        }

        let replacer = crate::context::replacer(ctx)?;
        for rule in &self.rules {
            let key = if rule.key.contains('{') {
                replacer.replace_all(&rule.key, "")
            } else {
                rule.key.clone()
            };

            let candidates: Vec<String> = if key.eq_ignore_ascii_case("host") {
                ctx.host()
                    .map(|h| vec![host_without_port(&h).to_owned()])
                    .unwrap_or_default()
            } else {
                let Ok(name) = http::header::HeaderName::from_bytes(key.as_bytes()) else {
                    return Ok(false);
                };
                ctx.header_values(&name)
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_owned)
                    .collect()
            };

            match &rule.values {
                None => {
                    if !candidates.is_empty() {
                        return Ok(false);
                    }
                }
                Some(patterns) => {
                    let matched = candidates.iter().any(|candidate| {
                        patterns.iter().any(|pattern| {
                            let expanded = replacer.replace_all(pattern, "");
                            Self::value_matches(&expanded, candidate)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use httpmatch_utils::create_test_session;
    use pingora::http::RequestHeader;
    use test_log::test;

    #[test(tokio::test)]
    async fn absent_header_required() {
        let mut matcher = MatchHeader::new([HeaderRule {
            key: "Must-Not-Exist".to_owned(),
            values: None,
        }]);
        matcher.provision().unwrap();

        let header = RequestHeader::build("GET", b"/", None).unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);

        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn present_header_fails_absence_rule() {
        let mut matcher = MatchHeader::new([HeaderRule {
            key: "X-Debug".to_owned(),
            values: None,
        }]);
        matcher.provision().unwrap();

        let mut header = RequestHeader::build("GET", b"/", None).unwrap();
        header.insert_header("X-Debug", "1").unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);

        assert!(!matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn wildcard_value_pattern() {
        let mut matcher = MatchHeader::new([HeaderRule {
            key: "Accept".to_owned(),
            values: Some(vec!["*/json".to_owned()]),
        }]);
        matcher.provision().unwrap();

        let mut header = RequestHeader::build("GET", b"/", None).unwrap();
        header.insert_header("Accept", "application/json").unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);

        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn and_across_keys() {
        let mut matcher = MatchHeader::new([
            HeaderRule {
                key: "Accept".to_owned(),
                values: Some(vec!["*/json".to_owned()]),
            },
            HeaderRule {
                key: "X-Api-Version".to_owned(),
                values: Some(vec!["2".to_owned()]),
            },
        ]);
        matcher.provision().unwrap();

        let mut header = RequestHeader::build("GET", b"/", None).unwrap();
        header.insert_header("Accept", "application/json").unwrap();
        header.insert_header("X-Api-Version", "1").unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);

        assert!(!matcher.matches(&ctx).unwrap());
    }
}
