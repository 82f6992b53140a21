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

//! Boolean composition of matchers: `MatcherSet` (AND), `MatcherSetList` (OR), and `MatchNot`
//! (negation of a wrapped `MatcherSetList`).

use super::Matcher;
use crate::error::{ConfigError, MatchError};
use httpmatch_utils::RequestContext;

/// Conjunction of matchers: matches iff every leaf matches, evaluated in declaration order and
/// short-circuiting at the first non-match. Regex captures published by an earlier leaf are
/// visible to later leaves via the request's `Replacer` -- declaration order is semantically
/// significant.
#[derive(Debug)]
pub struct MatcherSet {
    matchers: Vec<Box<dyn Matcher>>,
}

impl MatcherSet {
    /// Creates a set from already-provisioned matchers.
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for MatcherSet {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for matcher in &mut self.matchers {
            matcher.provision()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for matcher in &self.matchers {
            matcher.validate()?;
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        for matcher in &self.matchers {
            if !matcher.matches(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn cleanup(&mut self) {
        for matcher in &mut self.matchers {
            matcher.cleanup();
        }
    }
}

/// Disjunction of `MatcherSet`s: matches iff any set matches, evaluated in declaration order,
/// returning true at the first match.
#[derive(Debug)]
pub struct MatcherSetList {
    sets: Vec<MatcherSet>,
}

impl MatcherSetList {
    /// Creates a list from already-provisioned sets.
    pub fn new(sets: Vec<MatcherSet>) -> Self {
        Self { sets }
    }
}

impl Matcher for MatcherSetList {
    fn provision(&mut self) -> Result<(), ConfigError> {
        for set in &mut self.sets {
            set.provision()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for set in &self.sets {
            set.validate()?;
        }
        Ok(())
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        for set in &self.sets {
            if set.matches(ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn cleanup(&mut self) {
        for set in &mut self.sets {
            set.cleanup();
        }
    }
}

/// Negation of a wrapped `MatcherSetList`. Evaluates the inner list and returns the logical
/// negation of its result; side effects (regex capture publication) from the inner evaluation
/// are left in place even though the overall result is inverted.
#[derive(Debug)]
pub struct MatchNot {
    inner: MatcherSetList,
}

impl MatchNot {
    /// Wraps a `MatcherSetList` for negation.
    pub fn new(inner: MatcherSetList) -> Self {
        Self { inner }
    }
}

impl Matcher for MatchNot {
    fn provision(&mut self) -> Result<(), ConfigError> {
        self.inner.provision()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.inner.validate()
    }

    fn matches(&self, ctx: &RequestContext) -> Result<bool, MatchError> {
        Ok(!self.inner.matches(ctx)?)
    }

    fn cleanup(&mut self) {
        self.inner.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::path::MatchPath;
    use httpmatch_utils::create_test_session;
    use pingora::http::RequestHeader;
    use test_log::test;

    async fn session_with_path(path: &str) -> RequestContext {
        let header = RequestHeader::build("GET", path.as_bytes(), None).unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        crate::context::install(&mut ctx);
        ctx
    }

    fn path_matcher(pattern: &str) -> Box<dyn Matcher> {
        let mut matcher = MatchPath::new([pattern]);
        matcher.provision().unwrap();
        Box::new(matcher)
    }

    #[test(tokio::test)]
    async fn and_short_circuits_on_first_false() {
        let set = MatcherSet::new(vec![path_matcher("/foo"), path_matcher("/bar")]);
        let ctx = session_with_path("/foo").await;
        assert!(!set.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn and_true_when_all_match() {
        let set = MatcherSet::new(vec![path_matcher("/foo"), path_matcher("/foo")]);
        let ctx = session_with_path("/foo").await;
        assert!(set.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn or_true_when_any_set_matches() {
        let list = MatcherSetList::new(vec![
            MatcherSet::new(vec![path_matcher("/foo")]),
            MatcherSet::new(vec![path_matcher("/bar")]),
        ]);
        let ctx = session_with_path("/bar").await;
        assert!(list.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn not_negates_inner_list() {
        let inner = MatcherSetList::new(vec![MatcherSet::new(vec![path_matcher("/foo")])]);
        let not = MatchNot::new(inner);
        let ctx = session_with_path("/bar").await;
        assert!(not.matches(&ctx).unwrap());
    }

    #[test(tokio::test)]
    async fn double_negation_matches_inner() {
        let inner = || MatcherSetList::new(vec![MatcherSet::new(vec![path_matcher("/foo")])]);
        let not = MatchNot::new(inner());
        let double_not_set = MatcherSet::new(vec![Box::new(not)]);
        let double_not_list = MatcherSetList::new(vec![double_not_set]);
        let outer_not = MatchNot::new(double_not_list);

        let ctx = session_with_path("/foo").await;
        assert!(outer_not.matches(&ctx).unwrap());
    }
}
