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

//! The `{namespace.key}` placeholder expansion facility. A `Replacer` is a per-request instance
//! holding a stack of value providers plus a writable override map; `crate::context::install`
//! assembles the default provider stack (env, request, vars, regex, system) documented in the
//! configuration schema.

use crate::error::MatchError;
use crate::vars::VarsStore;
use httpmatch_utils::RequestContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Maximum number of times an expanded value is re-scanned for further `{...}` occurrences.
const MAX_EXPANSION_DEPTH: usize = 8;

/// A source of placeholder values consulted by a [`Replacer`] when a key is not present in its
/// override map.
pub trait Provider: Send + Sync + fmt::Debug {
    /// Looks up `key`, returning `None` if this provider does not recognize it.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// `env.<NAME>` -> the process environment variable `NAME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl Provider for EnvProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        let name = key.strip_prefix("env.")?;
        std::env::var(name).ok()
    }
}

/// `system.hostname`, `system.time`, `system.time_unix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProvider;

impl Provider for SystemProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "system.hostname" => std::env::var("HOSTNAME").ok().or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_owned())
            }),
            "system.time" => Some(httpdate::fmt_http_date(std::time::SystemTime::now())),
            "system.time_unix" => {
                let secs = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                Some(secs.to_string())
            }
            _ => None,
        }
    }
}

/// An immutable snapshot of the fields of one request exposed under `http.request.*`. Taken once
/// when the request context is installed; request headers and the URI do not change over the
/// course of matching.
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    method: String,
    scheme: String,
    host: String,
    hostport: String,
    port: String,
    uri: String,
    uri_path: String,
    uri_query: String,
    remote: String,
    remote_host: String,
    remote_port: String,
    headers: HashMap<String, Vec<String>>,
    cookies: HashMap<String, String>,
}

impl RequestSnapshot {
    /// Captures the fields of `ctx` that `http.request.*` placeholders resolve against.
    pub fn capture(ctx: &RequestContext) -> Self {
        let req = ctx.req_header();
        let uri = ctx.uri().clone();
        let hostport = ctx.host().map(|h| h.into_owned()).unwrap_or_default();
        let host = httpmatch_utils::host_without_port(&hostport).to_owned();
        let port = hostport
            .strip_prefix(&host)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or("")
            .to_owned();
        let scheme = uri.scheme_str().unwrap_or("http").to_owned();

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in req.headers.iter() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_default()
                    .push(value.to_owned());
            }
        }

        let mut cookies = HashMap::new();
        for value in req.headers.get_all(http::header::COOKIE).iter() {
            if let Ok(value) = value.to_str() {
                for pair in value.split(';') {
                    if let Some((k, v)) = pair.trim().split_once('=') {
                        cookies.insert(k.trim().to_owned(), v.trim().to_owned());
                    }
                }
            }
        }

        let (remote_host, remote_port) = match ctx.remote_addr() {
            Some(pingora::protocols::l4::socket::SocketAddr::Inet(addr)) => {
                (addr.ip().to_string(), addr.port().to_string())
            }
            Some(pingora::protocols::l4::socket::SocketAddr::Unix(addr)) => {
                (format!("{addr:?}"), String::new())
            }
            None => (String::new(), String::new()),
        };
        let remote = if remote_port.is_empty() {
            remote_host.clone()
        } else {
            format!("{remote_host}:{remote_port}")
        };

        Self {
            method: req.method.as_str().to_owned(),
            scheme,
            host,
            hostport,
            port,
            uri: uri.to_string(),
            uri_path: uri.path().to_owned(),
            uri_query: uri.query().unwrap_or("").to_owned(),
            remote,
            remote_host,
            remote_port,
            headers,
            cookies,
        }
    }
}

/// `http.request.*` provider, backed by a [`RequestSnapshot`].
#[derive(Debug, Clone)]
pub struct RequestProvider {
    snapshot: RequestSnapshot,
}

impl RequestProvider {
    /// Wraps a snapshot for placeholder lookup.
    pub fn new(snapshot: RequestSnapshot) -> Self {
        Self { snapshot }
    }
}

impl Provider for RequestProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        let s = &self.snapshot;
        if let Some(name) = key.strip_prefix("http.request.header.") {
            return s
                .headers
                .get(&name.to_ascii_lowercase())
                .and_then(|values| values.first())
                .cloned();
        }
        if let Some(name) = key.strip_prefix("http.request.cookie.") {
            return s.cookies.get(name).cloned();
        }
        match key {
            "http.request.method" => Some(s.method.clone()),
            "http.request.scheme" => Some(s.scheme.clone()),
            "http.request.host" => Some(s.host.clone()),
            "http.request.hostport" => Some(s.hostport.clone()),
            "http.request.port" => Some(s.port.clone()),
            "http.request.uri" => Some(s.uri.clone()),
            "http.request.uri.path" => Some(s.uri_path.clone()),
            "http.request.uri.query" => Some(s.uri_query.clone()),
            "http.request.remote" => Some(s.remote.clone()),
            "http.request.remote.host" => Some(s.remote_host.clone()),
            "http.request.remote.port" => Some(s.remote_port.clone()),
            _ => None,
        }
    }
}

/// A shared, mutable handle to the request's [`VarsStore`], written by upstream handlers over
/// the course of matching and read back under `http.vars.*`.
pub type SharedVars = Arc<Mutex<VarsStore>>;

/// `http.vars.*` provider.
#[derive(Debug, Clone)]
pub struct VarsProvider {
    vars: SharedVars,
}

impl VarsProvider {
    /// Wraps a shared `VarsStore` handle for placeholder lookup.
    pub fn new(vars: SharedVars) -> Self {
        Self { vars }
    }
}

impl Provider for VarsProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        let name = key.strip_prefix("http.vars.")?;
        self.vars.lock().unwrap().get_string(name)
    }
}

/// A shared, mutable table of the most recently published regex capture groups, keyed
/// `<Name>.<group>`, written by [`crate::matcher::regexp::publish_captures`] and read back under
/// `http.regexp.*`.
pub type SharedCaptures = Arc<Mutex<HashMap<String, String>>>;

/// `http.regexp.<Name>.*` provider.
#[derive(Debug, Clone)]
pub struct RegexProvider {
    captures: SharedCaptures,
}

impl RegexProvider {
    /// Wraps a shared capture table for placeholder lookup.
    pub fn new(captures: SharedCaptures) -> Self {
        Self { captures }
    }
}

impl Provider for RegexProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        let name = key.strip_prefix("http.regexp.")?;
        self.captures.lock().unwrap().get(name).cloned()
    }
}

/// Per-request placeholder expansion facility. Holds a LIFO stack of [`Provider`]s plus a
/// writable override map; overrides win over every provider, and providers are consulted in the
/// reverse of the order they were pushed (the last-pushed provider is checked first).
#[derive(Debug, Default)]
pub struct Replacer {
    providers: Vec<Box<dyn Provider>>,
    overrides: HashMap<String, String>,
}

impl Replacer {
    /// Creates an empty instance with no providers and no overrides. Real per-request instances
    /// are assembled by `crate::context::install`, which pushes the documented default provider
    /// stack (env, request, vars, regex, system) in that order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an override for `key`, taking precedence over every provider.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Pushes a provider onto the lookup stack.
    pub fn push_provider<P: Provider + 'static>(&mut self, provider: P) {
        self.providers.push(Box::new(provider));
    }

    /// Looks up a single `{key}` placeholder's value: overrides first, then providers in LIFO
    /// order.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        self.providers
            .iter()
            .rev()
            .find_map(|provider| provider.lookup(key))
    }

    /// Expands every `{key}` placeholder in `input`, substituting `empty` for any key that does
    /// not resolve. Never errors.
    pub fn replace_all(&self, input: &str, empty: &str) -> String {
        self.replace_with_depth(input, Some(empty), MAX_EXPANSION_DEPTH)
            .unwrap_or_else(|_| input.to_owned())
    }

    /// Expands every `{key}` placeholder in `input`, returning an error if any key does not
    /// resolve.
    pub fn replace_or_err(&self, input: &str) -> Result<String, MatchError> {
        self.replace_with_depth(input, None, MAX_EXPANSION_DEPTH)
    }

    fn replace_with_depth(
        &self,
        input: &str,
        empty: Option<&str>,
        depth: usize,
    ) -> Result<String, MatchError> {
        let expanded = self.expand_once(input, empty)?;
        if depth == 0 || !contains_unescaped_brace(&expanded) {
            return Ok(expanded);
        }
        self.replace_with_depth(&expanded, empty, depth - 1)
    }

    fn expand_once(&self, input: &str, empty: Option<&str>) -> Result<String, MatchError> {
        let bytes = input.as_bytes();
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\\' && bytes.get(i + 1) == Some(&b'{') {
                out.push('{');
                i += 2;
                continue;
            }
            if b == b'\\' && bytes.get(i + 1) == Some(&b'}') {
                out.push('}');
                i += 2;
                continue;
            }
            if b == b'{' {
                if let Some(rel_end) = input[i + 1..].find('}') {
                    let key = &input[i + 1..i + 1 + rel_end];
                    match self.get(key) {
                        Some(value) => out.push_str(&value),
                        None => match empty {
                            Some(default) => out.push_str(default),
                            None => {
                                return Err(MatchError::UnresolvedPlaceholder(key.to_owned()))
                            }
                        },
                    }
                    i = i + 1 + rel_end + 1;
                    continue;
                }
            }
            let ch_len = utf8_char_len(b);
            out.push_str(&input[i..i + ch_len]);
            i += ch_len;
        }
        Ok(out)
    }
}

fn contains_unescaped_brace(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'{') {
            i += 2;
            continue;
        }
        if bytes[i] == b'{' {
            return true;
        }
        i += 1;
    }
    false
}

fn utf8_char_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_provider() {
        let mut replacer = Replacer::new();
        replacer.push_provider(EnvProvider);
        replacer.set("env.HOME", "/override");
        assert_eq!(replacer.get("env.HOME").as_deref(), Some("/override"));
    }

    #[test]
    fn replace_all_substitutes_default_for_unresolved() {
        let replacer = Replacer::new();
        let result = replacer.replace_all("hello {missing}!", "-");
        assert_eq!(result, "hello -!");
    }

    #[test]
    fn replace_or_err_fails_on_unresolved() {
        let replacer = Replacer::new();
        assert!(replacer.replace_or_err("{missing}").is_err());
    }

    #[test]
    fn escaped_brace_is_literal() {
        let replacer = Replacer::new();
        assert_eq!(replacer.replace_all(r"\{not a key\}", "-"), "{not a key}");
    }

    #[test]
    fn vars_provider_reads_live_store() {
        let vars: SharedVars = Arc::new(Mutex::new(VarsStore::new()));
        let mut replacer = Replacer::new();
        replacer.push_provider(VarsProvider::new(vars.clone()));

        assert_eq!(replacer.get("http.vars.user"), None);
        vars.lock().unwrap().set("user", "alice");
        assert_eq!(replacer.get("http.vars.user").as_deref(), Some("alice"));
    }

    #[test]
    fn regex_provider_reads_live_captures() {
        let captures: SharedCaptures = Arc::new(Mutex::new(HashMap::new()));
        let mut replacer = Replacer::new();
        replacer.push_provider(RegexProvider::new(captures.clone()));

        captures
            .lock()
            .unwrap()
            .insert("n.x".to_owned(), "bar".to_owned());
        assert_eq!(replacer.get("http.regexp.n.x").as_deref(), Some("bar"));
    }

    #[test]
    fn lifo_order_prefers_last_pushed_provider() {
        #[derive(Debug)]
        struct Fixed(&'static str);
        impl Provider for Fixed {
            fn lookup(&self, key: &str) -> Option<String> {
                (key == "k").then(|| self.0.to_owned())
            }
        }

        let mut replacer = Replacer::new();
        replacer.push_provider(Fixed("first"));
        replacer.push_provider(Fixed("second"));
        assert_eq!(replacer.get("k").as_deref(), Some("second"));
    }

    #[test]
    fn recursion_guard_bounds_rescans() {
        let mut replacer = Replacer::new();
        replacer.set("a", "{a}");
        // Would loop forever without the depth guard; must terminate.
        let result = replacer.replace_all("{a}", "-");
        assert_eq!(result, "{a}");
    }
}
