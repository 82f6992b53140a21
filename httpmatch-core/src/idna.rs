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

//! Thin wrapper around the `idna` crate's ToASCII conversion, used by `MatchHost` to normalize
//! Unicode host patterns and incoming `Host` headers to their `xn--` form before comparison.

use crate::error::ConfigError;

/// Converts a host to its ASCII (`xn--`) form and lowercases it. Hosts that are already ASCII
/// pass through unchanged apart from lowercasing.
pub fn to_ascii_lowercase(host: &str) -> Result<String, ConfigError> {
    idna::domain_to_ascii(host).map_err(|_| ConfigError::InvalidIdna {
        pattern: host.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_host_passes_through() {
        assert_eq!(to_ascii_lowercase("Example.COM").unwrap(), "example.com");
    }

    #[test]
    fn unicode_host_converts_to_xn_form() {
        assert_eq!(
            to_ascii_lowercase("\u{e9}x\u{e0}mpl\u{ea}.com").unwrap(),
            "xn--xmpl-0na6cm.com"
        );
    }
}
