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

//! Standard error response used when a contract a matcher relies on (a missing `Replacer` or
//! `VarsStore` in the request extensions) is violated in production rather than panicking.

use http::{header, method::Method, status::StatusCode};
use maud::{html, DOCTYPE};
use pingora::http::ResponseHeader;
use pingora::Error;

use crate::request::RequestContext;

/// Produces the text of a standard response page for the given status code.
pub fn response_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    html! {
        (DOCTYPE)
        html {
            head {
                title {
                    (status_str) " " (reason)
                }
            }

            body {
                center {
                    h1 {
                        (status_str) " " (reason)
                    }
                }
            }
        }
    }
    .into()
}

/// Responds with a standard error page for the given status code.
///
/// This is what a production build falls back to when a `ContractError` is raised: a matcher
/// could not find the `Replacer` or `VarsStore` it expected in the request extensions, which
/// indicates a wiring bug rather than anything the client did wrong.
pub async fn error_response(ctx: &mut RequestContext, status: StatusCode) -> Result<(), Box<Error>> {
    let text = response_text(status);

    let mut header = ResponseHeader::build(status, Some(3))?;
    header.append_header(header::CONTENT_LENGTH, text.len().to_string())?;
    header.append_header(header::CONTENT_TYPE, "text/html; charset=utf-8")?;

    let send_body = *ctx.method() != Method::HEAD;
    let session = ctx.session_mut();
    session
        .write_response_header(Box::new(header), !send_body)
        .await?;

    if send_body {
        session.write_response_body(Some(text.into()), true).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::create_test_session;
    use pingora::http::RequestHeader;
    use test_log::test;

    #[test(tokio::test)]
    async fn writes_error_page() {
        let header = RequestHeader::build("GET", b"/", None).unwrap();
        let session = create_test_session(header).await;
        let mut ctx = RequestContext::new(session);

        error_response(&mut ctx, StatusCode::INTERNAL_SERVER_ERROR)
            .await
            .unwrap();
        assert!(ctx.session().response_written().is_some());
    }

    #[test]
    fn response_text_contains_status() {
        let text = response_text(StatusCode::NOT_FOUND);
        assert!(text.contains("404"));
        assert!(text.contains("Not Found"));
    }
}
