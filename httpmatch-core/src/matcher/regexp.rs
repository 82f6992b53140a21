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

//! `MatchPathRE`, `MatchHeaderRE`, and `MatchVarsRE`: regex matching against the raw path,
//! header values, or vars-store entries, publishing capture groups into the request's
//! `Replacer` under `http.regexp.<Name>.*` on success.

use super::Matcher;
use crate::context;
use crate::error::{ConfigError, MatchError};
use httpmatch_utils::RequestContext;
use regex::Regex;

/// One `(Pattern, Name)` pair: a compiled regex plus the namespace captures publish under.
#[derive(Debug, Clone)]
pub struct MatchRegexp {
    pattern: String,
    /// Name captures are published under as `http.regexp.<name>.<group>`. May be empty if no
    /// downstream matcher references this pattern's captures.
    pub name: String,
    compiled: Option<Regex>,
}

impl MatchRegexp {
    /// Creates an uncompiled regex matcher. Call [`MatchRegexp::compile`] before use.
    pub fn new(pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: name.into(),
            compiled: None,
        }
    }

    /// Compiles the pattern, returning a field-scoped `ConfigError` on failure.
    pub fn compile(&mut self, field: &str) -> Result<(), ConfigError> {
        let regex = Regex::new(&self.pattern).map_err(|source| ConfigError::InvalidRegex {
            field: field.to_owned(),
            source,
        })?;
        if regex.captures_len() > 1 && self.name.is_empty() {
            return Err(ConfigError::MissingCaptureName {
                field: field.to_owned(),
            });
        }
        self.compiled = Some(regex);
        Ok(())
    }

    fn regex(&self) -> &Regex {
        self.compiled
            .as_ref()
            .expect("MatchRegexp::compile must run before matching")
    }

    /// Attempts a match, publishing captures into `captures` under this pattern's `Name` on
    /// success. Returns whether the match succeeded.
    fn matches_and_publish(
        &self,
        haystack: &str,
        captures_table: &crate::replacer::SharedCaptures,
    ) -> bool {
        let Some(caps) = self.regex().captures(haystack) else {
            return false;
        };
        if !self.name.is_empty() {
            publish_captures(captures_table, &self.name, &caps, self.regex());
        }
        true
    }
}

/// Writes every positional and named capture group from a successful match into the shared
/// capture table, keyed `<name>.<group>`. Republishing the same `Name` overwrites previous
/// entries -- last writer wins.
pub fn publish_captures(
    captures_table: &crate::replacer::SharedCaptures,
    name: &str,
    caps: &regex::Captures<'_>,
    regex: &Regex,
) {
    let mut table = captures_table.lock().unwrap();
    for i in 1..caps.len() {
        if let Some(m) = caps.get(i) {
            table.insert(format!("{name}.{i}"), m.as_str().to_owned());
        }
    }
    for group_name in regex.capture_names().flatten() {
        if let Some(m) = caps.name(group_name) {
            table.insert(format!("{name}.{group_name}"), m.as_str().to_owned());
        }
    }
}

/// Which field a `MatchVarsRE` entry reads from.
#[derive(Debug, Clone)]
pub enum Field {
    /// A literal vars-store key.
    Var(String),
    /// A `{placeholder}` resolved against the `Replacer` to a vars-store *key*, which is then
    /// looked up in the `VarsStore`.
    NamePlaceholder(String),
    /// A `{http.vars.*}` placeholder whose *expansion* is used directly as the value to match,
    /// without a further `VarsStore` lookup.
    ValuePlaceholder(String),
}

/// `MatchPathRE`: AND of `(Pattern, Name)` pairs matched against the raw (undecoded) request
/// path. An empty matcher matches unconditionally.
#[derive(Debug, Clone, Default)]
pub struct MatchPathRE {
    entries: Vec<MatchRegexp>,
}

impl MatchPathRE {
    /// Creates a matcher from a list of `(pattern, name)` entries.
    pub fn new(entries: impl IntoIterator<Item = MatchRegexp>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl Matcher for MatchPathRE {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for entry in &mut self.entries {
            entry.compile("path_regexp")?;
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        if self.entries.is_empty() {
            return Ok(true);
        }
        let captures_table = context::captures(ctx)?.clone();
        let path = ctx.uri().path();
        for entry in &self.entries {
            if !entry.matches_and_publish(path, &captures_table) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `(field, MatchRegexp)` matcher over header values or the request host.
#[derive(Debug, Clone)]
pub struct MatchHeaderRE {
    entries: Vec<(String, MatchRegexp)>,
}

impl MatchHeaderRE {
    /// Creates a matcher from `(header name, regexp)` entries. `field == "host"` (case
    /// insensitive) reads from the request host instead of the header bag.
    pub fn new(entries: impl IntoIterator<Item = (String, MatchRegexp)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl Matcher for MatchHeaderRE {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for (field, entry) in &mut self.entries {
            entry.compile(field)?;
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        if self.entries.is_empty() {
            return Ok(true);
        }
        let captures_table = context::captures(ctx)?.clone();
        for (field, entry) in &self.entries {
            let matched = if field.eq_ignore_ascii_case("host") {
                let host = ctx
                    .host()
                    .map(|h| httpmatch_utils::host_without_port(&h).to_owned())
                    .unwrap_or_default();
                entry.matches_and_publish(&host, &captures_table)
            } else {
                let name = http::header::HeaderName::from_bytes(field.as_bytes())
                    .map_err(|_| MatchError::UnresolvedPlaceholder(field.clone()))?;
                ctx.header_values(&name)
                    .filter_map(|v| v.to_str().ok())
                    .any(|value| entry.matches_and_publish(value, &captures_table))
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `(field, MatchRegexp)` matcher over `VarsStore` entries. `field` may be a literal var name or
/// a `{placeholder}` resolved against the `Replacer` first.
#[derive(Debug, Clone)]
pub struct MatchVarsRE {
    entries: Vec<(Field, MatchRegexp)>,
}

impl MatchVarsRE {
    /// Creates a matcher from `(field, regexp)` entries.
    pub fn new(entries: impl IntoIterator<Item = (Field, MatchRegexp)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl Matcher for MatchVarsRE {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for (field, entry) in &mut self.entries {
            let name = match field {
                Field::Var(name) | Field::NamePlaceholder(name) | Field::ValuePlaceholder(name) => {
                    name.clone()
                }
            };
            entry.compile(&name)?;
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        if self.entries.is_empty() {
            return Ok(true);
        }
        let vars = context::vars(ctx)?.clone();
        let captures_table = context::captures(ctx)?.clone();
        let replacer = context::replacer(ctx)?;

        for (field, entry) in &self.entries {
            let value = match field {
                Field::Var(key) => vars.lock().unwrap().get_string(key).unwrap_or_default(),
                Field::NamePlaceholder(pattern) => {
                    let key = replacer.replace_all(pattern, "");
                    vars.lock().unwrap().get_string(&key).unwrap_or_default()
                }
                Field::ValuePlaceholder(pattern) => replacer.replace_all(pattern, ""),
            };
            if !entry.matches_and_publish(&value, &captures_table) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::vars::VarsStore;
    use httpmatch_utils::create_test_session;
    use pingora::http::RequestHeader;
    use test_log::test;

    async fn session_with_path(path: &str) -> RequestContext {
        let header = RequestHeader::build("GET", path.as_bytes(), None).unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);
        ctx
    }

    #[test(tokio::test)]
    async fn path_regexp_publishes_named_capture() {
        let mut matcher = MatchPathRE::new([MatchRegexp::new(
            "^/foo/(?P<x>.*)/baz$",
            "n",
        )]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/foo/bar/baz").await;
        assert!(matcher.matches(&ctx).unwrap());

        let replacer = context::replacer(&ctx).unwrap();
        assert_eq!(replacer.get("http.regexp.n.x").as_deref(), Some("bar"));
    }

    #[test(tokio::test)]
    async fn empty_path_regexp_matches_unconditionally() {
        let matcher = MatchPathRE::default();
        let ctx = session_with_path("/anything").await;
        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn header_regexp_matches_host_field() {
        let mut matcher =
            MatchHeaderRE::new([("host".to_owned(), MatchRegexp::new("^.*\\.example\\.com$", ""))]);
        matcher.provision().unwrap();

        let header = RequestHeader::build("GET", b"/", None).unwrap();
        let mut header = header;
        header
            .insert_header(http::header::HOST, "api.example.com")
            .unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        context::install(&mut ctx);

        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn vars_regexp_reads_from_vars_store() {
        let mut matcher = MatchVarsRE::new([(
            Field::Var("plan".to_owned()),
            MatchRegexp::new("^pro.*$", ""),
        )]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/").await;
        context::vars(&ctx)
            .unwrap()
            .lock()
            .unwrap()
            .set("plan", "professional");

        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn value_placeholder_matches_expansion_directly() {
        let mut matcher = MatchVarsRE::new([(
            Field::ValuePlaceholder("{http.vars.plan}".to_owned()),
            MatchRegexp::new("^pro.*$", ""),
        )]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/").await;
        context::vars(&ctx)
            .unwrap()
            .lock()
            .unwrap()
            .set("plan", "professional");

        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn name_placeholder_resolves_to_a_key_before_lookup() {
        let mut matcher = MatchVarsRE::new([(
            Field::NamePlaceholder("{env.TEST_MATCHVARSRE_KEY}".to_owned()),
            MatchRegexp::new("^pro.*$", ""),
        )]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/").await;
        context::vars(&ctx)
            .unwrap()
            .lock()
            .unwrap()
            .set("plan", "professional");
        std::env::set_var("TEST_MATCHVARSRE_KEY", "plan");

        assert!(matcher.matches(&ctx).unwrap());
        std::env::remove_var("TEST_MATCHVARSRE_KEY");
    }

    #[test]
    fn capture_without_name_is_a_config_error() {
        let mut matcher = MatchRegexp::new("(?P<x>.*)", "");
        assert!(matcher.compile("field").is_err());
    }

    #[test]
    fn repeated_name_is_last_writer_wins() {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        let table: crate::replacer::SharedCaptures = Arc::new(Mutex::new(HashMap::new()));
        let mut first = MatchRegexp::new("(?P<x>first)", "n");
        first.compile("f").unwrap();
        let mut second = MatchRegexp::new("(?P<x>second)", "n");
        second.compile("f").unwrap();

        first.matches_and_publish("first", &table);
        second.matches_and_publish("second", &table);

        assert_eq!(table.lock().unwrap().get("n.x").map(String::as_str), Some("second"));
    }
}
