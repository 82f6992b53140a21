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

//! Small utilities shared by the `httpmatch-core` crate and by anything embedding it: the
//! request abstraction matchers are evaluated against, a single-or-many deserialization helper
//! for the configuration schema, and a standard error response for contract violations.

pub mod deserialize;
pub mod request;
pub mod standard_response;

pub use deserialize::OneOrMany;
pub use request::{
    create_test_session, create_test_session_with_body, host_without_port, RequestContext,
};
pub use standard_response::{error_response, response_text};
