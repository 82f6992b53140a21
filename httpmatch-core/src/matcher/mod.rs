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

//! The matcher type system: a single trait implemented by every leaf and composite matcher, plus
//! one module per matcher kind.

pub mod composite;
pub mod header;
pub mod host;
pub mod path;
pub mod query;
pub mod regexp;

use crate::error::{ConfigError, MatchError};
use httpmatch_utils::RequestContext;
use std::fmt;

/// Predicate over an HTTP request, evaluated as part of a route's `MatcherSet`/`MatcherSetList`.
///
/// `matches` is deliberately synchronous: no matcher may block or await, even though the
/// surrounding Pingora request-filter phase is async. This is enforced at the type level rather
/// than by convention.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Compiles patterns and resolves config-time-constant placeholders. Called once after
    /// construction, before `validate`.
    fn provision(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Sanity-checks post-provision invariants. Called once, after `provision`.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Evaluates the matcher against `ctx`. Runs on every matching request.
    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError>;

    /// Releases any resources held by the matcher. Called at server shutdown; default no-op.
    fn cleanup(&mut self) {}
}
