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

//! `MatchPath`: literal/wildcard matching of the request path, in either raw (percent-encoded,
//! as received) or normalized (percent-decoded, dot-segments resolved) space.

use super::Matcher;
use crate::error::{ConfigError, MatchError};
use httpmatch_utils::RequestContext;

#[derive(Debug, Clone)]
struct CompiledPattern {
    /// Whether this pattern contains the `%*` raw-space wildcard marker and therefore compares
    /// against the raw, undecoded path instead of the normalized one.
    raw_space: bool,
    /// Pattern text, lowercased outside of `{...}` placeholders. Still contains literal `%*`
    /// markers and unexpanded placeholders; those are resolved at match time.
    text: String,
}

/// Matches the request path against a list of literal/wildcard patterns.
///
/// Each pattern is compared either against the raw path (if it contains the `%*` marker) or the
/// normalized path (otherwise). `*` is a glob wildcard matching any run of characters, including
/// none; `**` behaves identically to `*`. Comparisons are ASCII case-insensitive.
#[derive(Debug, Clone)]
pub struct MatchPath {
    raw_patterns: Vec<String>,
    compiled: Vec<CompiledPattern>,
    /// When set, also attempts each pattern against the path with trailing `.` and ` ` stripped
    /// -- a policy toggle, not a compile-time switch, matching filesystems that ignore them.
    pub strip_trailing_dot_space: bool,
}

impl MatchPath {
    /// Creates a matcher from unprocessed path patterns. Call [`Matcher::provision`] before use.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            raw_patterns: patterns.into_iter().map(Into::into).collect(),
            compiled: Vec::new(),
            strip_trailing_dot_space: false,
        }
    }

    /// Builder method enabling the trailing dot/space stripping policy.
    pub fn with_dot_space_stripping(mut self, enabled: bool) -> Self {
        self.strip_trailing_dot_space = enabled;
        self
    }

    fn matches_one(&self, pattern: &CompiledPattern, ctx: &RequestContext) -> Result<bool, MatchError> {
        let expanded = if pattern.text.contains('{') {
            let replacer = crate::context::replacer(ctx)?;
            replacer.replace_all(&pattern.text, "")
        } else {
            pattern.text.clone()
        };
        let glob = strip_raw_markers(&expanded);

        let raw_path = ctx.uri().path().to_ascii_lowercase();
        let normalized_path = normalize_path(ctx.uri().path()).to_ascii_lowercase();
        let target = if pattern.raw_space { &raw_path } else { &normalized_path };

        if glob_match(&glob, target) {
            return Ok(true);
        }
        if self.strip_trailing_dot_space {
            let stripped = trim_trailing_dot_space(target);
            if glob_match(&glob, stripped) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Matcher for MatchPath {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for pattern in &self.raw_patterns {
            self.compiled.push(CompiledPattern {
                raw_space: pattern.contains("%*"),
                text: lowercase_preserving_placeholders(pattern),
            });
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        for pattern in &self.compiled {
            if self.matches_one(pattern, ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Decodes percent-escapes (including `%2F`) and resolves `.`/`..` segments, preserving a
/// doubled leading or internal slash as an empty path segment.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned();
    resolve_dot_segments(&decoded)
}

fn resolve_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => continue,
            ".." => {
                if matches!(out.last(), Some(s) if !s.is_empty()) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

fn trim_trailing_dot_space(path: &str) -> &str {
    path.trim_end_matches(['.', ' '])
}

/// Removes the `%` from every `%*` raw-space wildcard marker, leaving a plain glob pattern with
/// `*` wildcards and everything else as literal text.
fn strip_raw_markers(pattern: &str) -> String {
    pattern.replace("%*", "*")
}

/// Lowercases every character outside of `{...}` placeholders, so placeholder keys keep their
/// original case.
fn lowercase_preserving_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_placeholder = false;
    for ch in input.chars() {
        match ch {
            '{' => {
                in_placeholder = true;
                out.push(ch);
            }
            '}' => {
                in_placeholder = false;
                out.push(ch);
            }
            _ if in_placeholder => out.push(ch),
            _ => out.extend(ch.to_lowercase()),
        }
    }
    out
}

/// Matches `text` against a glob `pattern` where `*` matches any run of characters (including
/// none). Anchored at both ends unless a leading/trailing `*` opens that end up.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }
    if text.len() < first.len() + last.len() {
        return false;
    }

    let middle = &text[first.len()..text.len() - last.len()];
    let mut search_from = 0;
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match middle[search_from..].find(part) {
            Some(found) => search_from += found + part.len(),
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
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

    #[test]
    fn glob_handles_all_positions() {
        assert!(glob_match("/foo", "/foo"));
        assert!(!glob_match("/foo", "/foobar"));
        assert!(glob_match("/foo*", "/foobar"));
        assert!(glob_match("*bar", "/foobar"));
        assert!(glob_match("*oob*", "/foobar"));
        assert!(glob_match("/f*r", "/foobar"));
        assert!(!glob_match("/f*r", "/f"));
        assert!(glob_match("**", "/anything"));
        assert_eq!(glob_match("**", "anything"), glob_match("*", "anything"));
    }

    #[test(tokio::test)]
    async fn normalized_space_decodes_percent_2f() {
        let mut matcher = MatchPath::new(["/foo//*"]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/foo/%2Fbar").await;
        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn normalized_space_does_not_match_literal_percent_sequence() {
        let mut matcher = MatchPath::new(["/foo/%2F*"]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/foo//bar").await;
        assert!(!matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn raw_space_marker_matches_encoded_slash() {
        let mut matcher = MatchPath::new(["/bands/%*/%*"]);
        matcher.provision().unwrap();

        let ctx = session_with_path("/bands/AC%2FDC/T.N.T").await;
        assert!(matcher.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn dot_space_stripping_is_a_policy_toggle() {
        let mut matcher = MatchPath::new(["/foo"]).with_dot_space_stripping(true);
        matcher.provision().unwrap();

        let ctx = session_with_path("/foo.").await;
        assert!(matcher.matches(&ctx).unwrap());

        let mut strict = MatchPath::new(["/foo"]);
        strict.provision().unwrap();
        let ctx = session_with_path("/foo.").await;
        assert!(!strict.matches(&ctx).unwrap());
    }
}
