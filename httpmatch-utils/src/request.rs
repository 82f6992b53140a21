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

//! Exposes the request abstraction that matchers are evaluated against, together with a few
//! re-exports from `pingora-core`, so that matcher crates no longer need it as a direct
//! dependency.

use http::{header, Extensions, HeaderName, HeaderValue, Method, Uri};
pub use pingora::http::RequestHeader;
pub use pingora::protocols::l4::socket::SocketAddr;
pub use pingora::proxy::Session;
pub use pingora::{Error, ErrorType};
use std::borrow::Cow;
use std::io::{Cursor, Seek, SeekFrom, Write};

/// Wraps a Pingora session together with the request-scoped extension map that carries the
/// matching core's `Replacer` and `VarsStore` instances a route's matchers are evaluated against.
///
/// Unlike [`Session`] itself, which Pingora hands to each request-filter phase, a `RequestContext`
/// is what `httpmatch-core`'s `Matcher::matches` actually receives.
#[derive(Debug)]
pub struct RequestContext {
    session: Session,
    extensions: Extensions,
}

impl RequestContext {
    /// Wraps a session for matcher evaluation.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            extensions: Extensions::new(),
        }
    }

    /// Returns the wrapped session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the wrapped session mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the request-scoped extension map, used to carry the `Replacer` and `VarsStore`.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the request-scoped extension map mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the request header.
    pub fn req_header(&self) -> &RequestHeader {
        self.session.req_header()
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.req_header().method
    }

    /// Returns the request URI as received (or as rewritten by an earlier handler).
    pub fn uri(&self) -> &Uri {
        &self.req_header().uri
    }

    /// Attempts to determine the request host, preferring the `Host` header over the URI
    /// authority. The port, if any, is not stripped; callers needing a bare host name should
    /// use [`host_without_port`].
    pub fn host(&self) -> Option<Cow<'_, str>> {
        fn host_from_header(ctx: &RequestContext) -> Option<Cow<'_, str>> {
            let host = ctx.req_header().headers.get(header::HOST)?;
            host.to_str().ok().map(Cow::Borrowed)
        }

        fn host_from_uri(ctx: &RequestContext) -> Option<Cow<'_, str>> {
            let uri = ctx.uri();
            let host = uri.host()?;
            if let Some(port) = uri.port() {
                let mut host = host.to_owned();
                host.push(':');
                host.push_str(port.as_str());
                Some(Cow::Owned(host))
            } else {
                Some(Cow::Borrowed(host))
            }
        }

        host_from_header(self).or_else(|| host_from_uri(self))
    }

    /// Returns all values of a given header, in declaration order.
    pub fn header_values(&self, name: &HeaderName) -> impl Iterator<Item = &HeaderValue> {
        self.req_header().headers.get_all(name).iter()
    }

    /// Returns the client (peer) address of the connection, if known.
    pub fn remote_addr(&self) -> Option<&SocketAddr> {
        self.session.client_addr()
    }
}

/// Strips a trailing `:port` from a host string, as used for `Host` header and URI authority
/// comparisons throughout the matcher set.
pub fn host_without_port(host: &str) -> &str {
    if let Some(bracket) = host.rfind(']') {
        &host[..=bracket]
    } else {
        host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
    }
}

/// Creates a new Pingora session for tests with the given request header and an empty body.
pub async fn create_test_session(header: RequestHeader) -> Session {
    create_test_session_with_body(header, "").await
}

/// Creates a new Pingora session for tests with the given request header and request body.
pub async fn create_test_session_with_body(
    mut header: RequestHeader,
    body: impl AsRef<[u8]>,
) -> Session {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let _ = cursor.write(b"POST / HTTP/1.1\r\n");
    let _ = cursor.write(b"Connection: close\r\n");
    let _ = cursor.write(b"\r\n");
    let _ = cursor.write(body.as_ref());
    let _ = cursor.seek(SeekFrom::Start(0));

    let _ = header.insert_header(header::CONTENT_LENGTH, body.as_ref().len());

    let mut session = Session::new_h1(Box::new(cursor));
    assert!(session.read_request().await.unwrap());
    *session.req_header_mut() = header;

    session
}
