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

//! The per-request `VarsStore`: an untyped key-value scratchpad written by upstream handlers and
//! read by `MatchVarsRE` and the `Replacer`'s `http.vars.*` namespace.

use std::collections::HashMap;
use std::fmt;

/// A value a handler can stash in the [`VarsStore`] under an arbitrary key.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// A string value.
    Str(String),
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
}

impl VarValue {
    /// Renders the value the way the `Replacer` and `MatchVarsRE` see it: every variant
    /// stringifies, never errors.
    pub fn as_display_string(&self) -> String {
        match self {
            Self::Str(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_display_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for VarValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for VarValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Per-request key -> value scratchpad. Created empty when the request context is installed,
/// written to by upstream handlers (outside the scope of this crate), read by `MatchVarsRE` and
/// exposed to the `Replacer` under the `http.vars.<key>` namespace.
#[derive(Debug, Default, Clone)]
pub struct VarsStore {
    values: HashMap<String, VarValue>,
}

impl VarsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value under `key`, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<VarValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Reads the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.values.get(key)
    }

    /// Reads the value stored under `key`, stringified.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(VarValue::as_display_string)
    }

    /// Returns whether any value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut vars = VarsStore::new();
        vars.set("user.id", 42i64);
        vars.set("user.name", "alice");
        vars.set("user.admin", true);

        assert_eq!(vars.get_string("user.id").as_deref(), Some("42"));
        assert_eq!(vars.get_string("user.name").as_deref(), Some("alice"));
        assert_eq!(vars.get_string("user.admin").as_deref(), Some("true"));
        assert!(vars.get("missing").is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut vars = VarsStore::new();
        vars.set("k", "first");
        vars.set("k", "second");
        assert_eq!(vars.get_string("k").as_deref(), Some("second"));
    }
}
