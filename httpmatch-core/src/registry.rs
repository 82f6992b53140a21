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

//! `MatcherRegistry`: dispatches a configuration's `matcher` kind name to a builder function that
//! turns its remaining fields into a boxed `Matcher`, then drives `provision`/`validate` over the
//! resulting tree in declaration order.

use crate::config::{
    HeaderConf, HeaderRegexpConf, HostConf, MatcherConfig, MatcherSetConf, MatcherSetListConf,
    NotConf, PathConf, PathRegexpConf, QueryConf, RegexEntryConf, VarsRegexpConf,
};
use crate::error::ConfigError;
use crate::matcher::composite::{MatchNot, MatcherSet, MatcherSetList};
use crate::matcher::header::{HeaderRule, MatchHeader};
use crate::matcher::host::MatchHost;
use crate::matcher::path::MatchPath;
use crate::matcher::query::{MatchQuery, QueryRule};
use crate::matcher::regexp::{Field, MatchHeaderRE, MatchPathRE, MatchRegexp, MatchVarsRE};
use crate::matcher::Matcher;
use log::debug;
use std::collections::HashMap;

type Builder = fn(serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError>;

/// Maps matcher-kind names to builder functions, used to turn a `MatcherSetListConf` document
/// into a runnable `MatcherSetList`.
///
/// Built-in kinds are `host`, `path`, `path_regexp`, `header`, `header_regexp`, `query`,
/// `vars_regexp`, and `not`. An unregistered kind name is a `ConfigError`, never a panic --
/// configuration authored against a future or misspelled kind must fail to start the server
/// cleanly rather than crash it.
pub struct MatcherRegistry {
    builders: HashMap<String, Builder>,
}

impl MatcherRegistry {
    /// Creates an empty registry with no matcher kinds registered.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Creates a registry with every built-in matcher kind registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("host", build_host);
        registry.register("path", build_path);
        registry.register("path_regexp", build_path_regexp);
        registry.register("header", build_header);
        registry.register("header_regexp", build_header_regexp);
        registry.register("query", build_query);
        registry.register("vars_regexp", build_vars_regexp);
        registry
    }

    /// Registers a builder function under a matcher-kind name, overwriting any prior registration
    /// for that name.
    pub fn register(&mut self, kind: impl Into<String>, builder: Builder) {
        self.builders.insert(kind.into(), builder);
    }

    /// Builds a single matcher entry, provisioning and validating it before returning.
    ///
    /// `not` is handled here rather than through the builder table, since it recurses back into
    /// [`MatcherRegistry::build_list`] rather than producing a leaf from `params` alone.
    pub fn build(&self, conf: MatcherConfig) -> Result<Box<dyn Matcher>, ConfigError> {
        let mut matcher: Box<dyn Matcher> = if conf.matcher == "not" {
            let not_conf: NotConf = serde_yaml::from_value(conf.params)?;
            Box::new(MatchNot::new(self.build_list(not_conf.any)?))
        } else {
            let builder = self
                .builders
                .get(&conf.matcher)
                .ok_or_else(|| ConfigError::UnknownMatcherKind(conf.matcher.clone()))?;
            builder(conf.params)?
        };
        matcher.provision()?;
        matcher.validate()?;
        Ok(matcher)
    }

    /// Builds an AND-list of matchers in declaration order.
    pub fn build_set(&self, conf: MatcherSetConf) -> Result<MatcherSet, ConfigError> {
        let matchers = conf
            .0
            .into_iter()
            .map(|entry| self.build(entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MatcherSet::new(matchers))
    }

    /// Builds an OR-list of AND-lists in declaration order.
    pub fn build_list(&self, conf: MatcherSetListConf) -> Result<MatcherSetList, ConfigError> {
        let set_count = conf.0.len();
        let sets = conf
            .0
            .into_iter()
            .map(|entry| self.build_set(entry))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("built a matcher set list with {set_count} alternative(s)");
        Ok(MatcherSetList::new(sets))
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TryFrom<MatcherSetListConf> for MatcherSetList {
    type Error = ConfigError;

    fn try_from(conf: MatcherSetListConf) -> Result<Self, Self::Error> {
        MatcherRegistry::with_builtins().build_list(conf)
    }
}

fn build_host(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: HostConf = serde_yaml::from_value(value)?;
    Ok(Box::new(MatchHost::new(conf.host.into_inner())))
}

fn build_path(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: PathConf = serde_yaml::from_value(value)?;
    let matcher =
        MatchPath::new(conf.path.into_inner()).with_dot_space_stripping(conf.strip_trailing_dot_space);
    Ok(Box::new(matcher))
}

fn to_regexp(entry: RegexEntryConf) -> MatchRegexp {
    MatchRegexp::new(entry.pattern, entry.name)
}

fn build_path_regexp(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: PathRegexpConf = serde_yaml::from_value(value)?;
    let entries = conf.path_regexp.into_inner().into_iter().map(to_regexp);
    Ok(Box::new(MatchPathRE::new(entries)))
}

fn build_header(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: HeaderConf = serde_yaml::from_value(value)?;
    let rules = conf.header.into_iter().map(|(key, values)| HeaderRule {
        key,
        values: values.map(|v| v.into_inner()),
    });
    Ok(Box::new(MatchHeader::new(rules)))
}

fn build_header_regexp(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: HeaderRegexpConf = serde_yaml::from_value(value)?;
    let entries = conf
        .header_regexp
        .into_iter()
        .map(|(field, entry)| (field, to_regexp(entry)));
    Ok(Box::new(MatchHeaderRE::new(entries)))
}

fn build_query(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: QueryConf = serde_yaml::from_value(value)?;
    let rules = conf.query.into_iter().map(|(key, values)| QueryRule {
        key,
        values: values.map(|v| v.into_inner()),
    });
    Ok(Box::new(MatchQuery::new(rules)))
}

fn build_vars_regexp(value: serde_yaml::Value) -> Result<Box<dyn Matcher>, ConfigError> {
    let conf: VarsRegexpConf = serde_yaml::from_value(value)?;
    let entries = conf
        .vars_regexp
        .into_iter()
        .map(|(field, entry)| (classify_vars_field(field), to_regexp(entry)));
    Ok(Box::new(MatchVarsRE::new(entries)))
}

/// Classifies a `vars_regexp` field string into the three forms §4.3 describes: a literal
/// vars-store key, a `{placeholder}` that resolves to a key, or a sole `{http.vars.*}`
/// placeholder whose expansion is used directly as the value.
fn classify_vars_field(field: String) -> Field {
    if !field.contains('{') {
        return Field::Var(field);
    }
    if let Some(inner) = field.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if inner.starts_with("http.vars.") {
            return Field::ValuePlaceholder(field);
        }
    }
    Field::NamePlaceholder(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_matcher_kind_is_a_config_error() {
        let conf: MatcherSetListConf = serde_yaml::from_str(
            r#"
- - matcher: does_not_exist
"#,
        )
        .unwrap();
        let err = MatcherRegistry::with_builtins().build_list(conf).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMatcherKind(ref kind) if kind == "does_not_exist"));
    }

    #[test]
    fn builds_host_and_path_and_evaluates_and_semantics() {
        let conf: MatcherSetListConf = serde_yaml::from_str(
            r#"
- - matcher: host
    host: example.com
  - matcher: path
    path: ["/foo", "/bar"]
"#,
        )
        .unwrap();
        let list = MatcherRegistry::with_builtins().build_list(conf).unwrap();
        assert_eq!(format!("{list:?}").contains("MatcherSetList"), true);
    }

    #[test]
    fn builds_not_around_nested_list() {
        let conf: MatcherSetListConf = serde_yaml::from_str(
            r#"
- - matcher: not
    any:
      - - matcher: path
          path: /admin
"#,
        )
        .unwrap();
        let built = MatcherRegistry::with_builtins().build_list(conf);
        assert!(built.is_ok());
    }

    #[test]
    fn try_from_delegates_to_builtin_registry() {
        let conf: MatcherSetListConf = serde_yaml::from_str(
            r#"
- - matcher: path
    path: /ok
"#,
        )
        .unwrap();
        let list: Result<MatcherSetList, ConfigError> = MatcherSetList::try_from(conf);
        assert!(list.is_ok());
    }

    #[test]
    fn missing_capture_name_propagates_from_nested_regexp() {
        let conf: MatcherSetListConf = serde_yaml::from_str(
            r#"
- - matcher: path_regexp
    path_regexp:
      pattern: "^/(?P<x>.*)$"
"#,
        )
        .unwrap();
        let err = MatcherRegistry::with_builtins().build_list(conf).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCaptureName { .. }));
    }
}
