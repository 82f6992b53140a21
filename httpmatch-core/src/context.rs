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

//! Wires a fresh [`Replacer`] and [`VarsStore`] into a request's extensions before any matcher
//! runs, and hands matchers a typed way to get them back out. A matcher that reaches into the
//! extensions and finds neither has a wiring bug, not a bad request: see [`ContractError`].

use crate::error::ContractError;
use crate::replacer::{
    EnvProvider, RegexProvider, Replacer, RequestProvider, RequestSnapshot, SharedCaptures,
    SharedVars, SystemProvider, VarsProvider,
};
use crate::vars::VarsStore;
use httpmatch_utils::RequestContext;
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Installs a fresh [`Replacer`] (with the default provider stack) and an empty [`VarsStore`]
/// into `ctx`'s extensions. Must run once per request before any matcher is evaluated.
pub fn install(ctx: &mut RequestContext) {
    let snapshot = RequestSnapshot::capture(ctx);
    let vars: SharedVars = Arc::new(Mutex::new(VarsStore::new()));
    let captures: SharedCaptures = Arc::new(Mutex::new(HashMap::new()));

    let mut replacer = Replacer::new();
    replacer.push_provider(EnvProvider);
    replacer.push_provider(SystemProvider);
    replacer.push_provider(RequestProvider::new(snapshot));
    replacer.push_provider(VarsProvider::new(vars.clone()));
    replacer.push_provider(RegexProvider::new(captures.clone()));

    ctx.extensions_mut().insert(replacer);
    ctx.extensions_mut().insert(vars);
    ctx.extensions_mut().insert(captures);
    trace!("installed Replacer and VarsStore for {:?}", ctx.uri());
}

/// Borrows the request's `Replacer`.
pub fn replacer(ctx: &RequestContext) -> Result<&Replacer, ContractError> {
    ctx.extensions()
        .get::<Replacer>()
        .ok_or(ContractError("Replacer"))
}

/// Mutably borrows the request's `Replacer`.
pub fn replacer_mut(ctx: &mut RequestContext) -> Result<&mut Replacer, ContractError> {
    ctx.extensions_mut()
        .get_mut::<Replacer>()
        .ok_or(ContractError("Replacer"))
}

/// Borrows the request's shared `VarsStore` handle.
pub fn vars(ctx: &RequestContext) -> Result<&SharedVars, ContractError> {
    ctx.extensions()
        .get::<SharedVars>()
        .ok_or(ContractError("VarsStore"))
}

/// Borrows the request's shared regex capture table.
pub fn captures(ctx: &RequestContext) -> Result<&SharedCaptures, ContractError> {
    ctx.extensions()
        .get::<SharedCaptures>()
        .ok_or(ContractError("regex captures"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmatch_utils::create_test_session;
    use pingora::http::RequestHeader;
    use test_log::test;

    #[test(tokio::test)]
    async fn install_makes_replacer_and_vars_available() {
        let header = RequestHeader::build("GET", b"/", None).unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);

        install(&mut ctx);

        assert!(replacer(&ctx).is_ok());
        assert!(vars(&ctx).is_ok());
        assert!(captures(&ctx).is_ok());
    }

    #[test(tokio::test)]
    async fn missing_install_is_a_contract_error() {
        let header = RequestHeader::build("GET", b"/", None).unwrap();
        let session = create_test_session(header).await;
        let ctx = RequestContext::new(session);

        assert!(replacer(&ctx).is_err());
    }

    #[test(tokio::test)]
    async fn request_provider_exposes_method_and_host() {
        let mut header = RequestHeader::build("GET", b"/foo?x=1", None).unwrap();
        header
            .insert_header(http::header::HOST, "example.com")
            .unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);
        install(&mut ctx);

        let replacer = replacer(&ctx).unwrap();
        assert_eq!(
            replacer.get("http.request.method").as_deref(),
            Some("GET")
        );
        assert_eq!(
            replacer.get("http.request.host").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            replacer.get("http.request.uri.path").as_deref(),
            Some("/foo")
        );
    }
}
