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

//! A boolean matcher algebra for HTTP requests, with `{namespace.key}` placeholder expansion.
//!
//! A route is a [`MatcherSetListConf`] (OR of AND-lists) of tagged matcher configuration entries,
//! built into a runnable [`MatcherSetList`] by [`MatcherRegistry`]. Each request gets a fresh
//! [`Replacer`] and [`VarsStore`] installed into its [`httpmatch_utils::RequestContext`] via
//! [`context::install`] before any matcher runs.

pub mod config;
pub mod context;
pub mod error;
pub mod idna;
pub mod matcher;
pub mod registry;
pub mod replacer;
pub mod vars;

pub use config::{
    HeaderConf, HeaderRegexpConf, HostConf, MatcherConfig, MatcherSetConf, MatcherSetListConf,
    NotConf, PathConf, PathRegexpConf, QueryConf, RegexEntryConf, VarsRegexpConf,
};
pub use error::{ConfigError, ContractError, MatchError};
pub use matcher::composite::{MatchNot, MatcherSet, MatcherSetList};
pub use matcher::header::{HeaderRule, MatchHeader};
pub use matcher::host::MatchHost;
pub use matcher::path::MatchPath;
pub use matcher::query::{MatchQuery, QueryRule};
pub use matcher::regexp::{Field, MatchHeaderRE, MatchPathRE, MatchRegexp, MatchVarsRE};
pub use matcher::Matcher;
pub use registry::MatcherRegistry;
pub use replacer::{Provider, Replacer, SharedCaptures, SharedVars};
pub use vars::{VarValue, VarsStore};
