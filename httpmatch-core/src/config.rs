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

//! Serde-deserializable configuration schema for matcher trees. A single matcher is tagged by
//! its `matcher` field; a `MatcherSetConf` is an AND-list of tagged entries, and a
//! `MatcherSetListConf` is an OR-list of those. Patterns that accept either a single string or a
//! list use `httpmatch_utils::OneOrMany`.

use httpmatch_utils::OneOrMany;
use serde::Deserialize;
use std::collections::HashMap;

/// One matcher entry: its kind name plus whatever fields that kind expects, held unparsed until
/// the [`crate::registry::MatcherRegistry`] dispatches on `matcher`.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    /// The registered matcher-kind name, e.g. `host`, `path`, `not`.
    pub matcher: String,
    /// Whatever other fields this matcher kind's schema expects.
    #[serde(flatten)]
    pub params: serde_yaml::Value,
}

/// An AND-list of matcher entries, evaluated in declaration order.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(transparent)]
pub struct MatcherSetConf(pub Vec<MatcherConfig>);

/// An OR-list of `MatcherSetConf`s, evaluated in declaration order.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(transparent)]
pub struct MatcherSetListConf(pub Vec<MatcherSetConf>);

/// Schema for the `host` matcher kind.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConf {
    /// Host patterns, OR'd together.
    pub host: OneOrMany<String>,
}

/// Schema for the `path` matcher kind.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConf {
    /// Path patterns, OR'd together.
    pub path: OneOrMany<String>,
    /// Whether to also try each pattern with trailing `.`/` ` stripped from the request path.
    #[serde(default)]
    pub strip_trailing_dot_space: bool,
}

/// One `(pattern, name)` entry shared by the `path_regexp`, `header_regexp`, and `vars_regexp`
/// matcher kinds.
#[derive(Debug, Clone, Deserialize)]
pub struct RegexEntryConf {
    /// The regular expression source.
    pub pattern: String,
    /// Namespace captures publish under (`http.regexp.<name>.*`). May be omitted if the pattern
    /// has no capture groups a downstream matcher needs.
    #[serde(default)]
    pub name: String,
}

/// Schema for the `path_regexp` matcher kind.
#[derive(Debug, Clone, Deserialize)]
pub struct PathRegexpConf {
    /// Regex entries, AND'd together against the raw request path.
    pub path_regexp: OneOrMany<RegexEntryConf>,
}

/// Schema for the `header` matcher kind: header name -> value patterns, or `null` to require the
/// header's absence.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderConf {
    /// Per-header rules, AND'd together.
    pub header: HashMap<String, Option<OneOrMany<String>>>,
}

/// Schema for the `header_regexp` matcher kind: header name (or `host`) -> regex entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRegexpConf {
    /// Per-field regex entries, AND'd together.
    pub header_regexp: HashMap<String, RegexEntryConf>,
}

/// Schema for the `query` matcher kind: query key -> value patterns, or `null` to require the
/// key's presence.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConf {
    /// Per-key rules, AND'd together.
    pub query: HashMap<String, Option<OneOrMany<String>>>,
}

/// Schema for the `vars_regexp` matcher kind: vars-store key (or `{placeholder}`) -> regex entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VarsRegexpConf {
    /// Per-field regex entries, AND'd together.
    pub vars_regexp: HashMap<String, RegexEntryConf>,
}

/// Schema for the `not` matcher kind: negates a nested `MatcherSetListConf`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotConf {
    /// The matcher set list to negate.
    pub any: MatcherSetListConf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_set_list_parses_nested_structure() {
        let yaml = r#"
- - matcher: host
    host: example.com
  - matcher: path
    path: [/foo, /bar]
- - matcher: not
    any:
      - - matcher: path
          path: /admin
"#;
        let parsed: MatcherSetListConf = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.0.len(), 2);
        assert_eq!(parsed.0[0].0.len(), 2);
        assert_eq!(parsed.0[0].0[0].matcher, "host");
        assert_eq!(parsed.0[1].0[0].matcher, "not");
    }

    #[test]
    fn header_conf_allows_null_for_absence() {
        let yaml = "header:\n  Must-Not-Exist: null\n  Accept: \"*/json\"\n";
        let conf: HeaderConf = serde_yaml::from_str(yaml).unwrap();
        assert!(conf.header.get("Must-Not-Exist").unwrap().is_none());
        assert!(conf.header.get("Accept").unwrap().is_some());
    }
}
