// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Per-operation destination lookup.

use std::borrow::Cow;
use std::collections::HashMap;

/// Endpoint configured on intercepted clients.
///
/// Every occurrence of this token in a pre-sign URL is replaced with the resolved destination.
pub const PLACEHOLDER_ENDPOINT: &str = "https://URL-PLACEHOLDER";

/// Mapping from operation name to destination URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMap {
    entries: HashMap<String, String>,
}

impl EndpointMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the destination of `operation`.
    pub fn with(mut self, operation: impl Into<String>, url: impl Into<String>) -> Self {
        self.entries.insert(operation.into(), url.into());
        self
    }

    /// Destination mapped for `operation`, if any.
    pub fn get(&self, operation: &str) -> Option<&str> {
        self.entries.get(operation).map(String::as_str)
    }

    /// Number of mapped operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no operation is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EndpointMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Outcome of [`EndpointResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// Send the call here.
    Url(&'a str),
    /// Keep the URL the client built.
    PassThrough,
}

/// Resolves an operation name to the URL its calls are sent to.
///
/// A per-operation entry wins over the default URL. With neither, the call passes through
/// untouched. Resolution never fails.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    map: Option<EndpointMap>,
    default_url: Option<String>,
}

impl EndpointResolver {
    /// Create a resolver from an optional map and an optional default.
    pub fn new(map: Option<EndpointMap>, default_url: Option<String>) -> Self {
        Self { map, default_url }
    }

    /// Resolve the destination of `operation`.
    pub fn resolve(&self, operation: &str) -> Resolved<'_> {
        if let Some(url) = self.map.as_ref().and_then(|m| m.get(operation)) {
            return Resolved::Url(url);
        }

        match &self.default_url {
            Some(url) => Resolved::Url(url),
            None => Resolved::PassThrough,
        }
    }

    /// Replace the placeholder token in `url` with the destination of `operation`.
    pub fn rewrite<'a>(&self, operation: &str, url: &'a str) -> Cow<'a, str> {
        match self.resolve(operation) {
            Resolved::Url(target) if url.contains(PLACEHOLDER_ENDPOINT) => {
                Cow::Owned(url.replace(PLACEHOLDER_ENDPOINT, target.trim_end_matches('/')))
            }
            _ => Cow::Borrowed(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn scenario() -> EndpointResolver {
        EndpointResolver::new(
            Some(EndpointMap::from_iter([(
                "InvokeModelWithResponseStream",
                "https://host-a",
            )])),
            Some("https://host-b".to_string()),
        )
    }

    #[test_case("InvokeModelWithResponseStream", Resolved::Url("https://host-a"); "mapped")]
    #[test_case("InvokeModel", Resolved::Url("https://host-b"); "default")]
    #[test_case("", Resolved::Url("https://host-b"); "empty name")]
    fn test_resolve_with_default(operation: &str, expected: Resolved<'static>) {
        assert_eq!(scenario().resolve(operation), expected);
    }

    #[test]
    fn test_resolve_without_default() {
        let resolver = EndpointResolver::new(
            Some(EndpointMap::new().with("PutObject", "http://127.0.0.1:9000")),
            None,
        );

        assert_eq!(
            resolver.resolve("PutObject"),
            Resolved::Url("http://127.0.0.1:9000")
        );
        assert_eq!(resolver.resolve("GetObject"), Resolved::PassThrough);
        assert_eq!(
            EndpointResolver::default().resolve("GetObject"),
            Resolved::PassThrough
        );
    }

    #[test]
    fn test_rewrite() {
        let resolver = scenario();

        assert_eq!(
            resolver.rewrite(
                "InvokeModelWithResponseStream",
                "https://URL-PLACEHOLDER/model/m/invoke-with-response-stream"
            ),
            "https://host-a/model/m/invoke-with-response-stream"
        );
        assert_eq!(
            resolver.rewrite("InvokeModel", "https://URL-PLACEHOLDER/model/m/invoke"),
            "https://host-b/model/m/invoke"
        );
        // Nothing to replace.
        assert!(matches!(
            resolver.rewrite("InvokeModel", "https://bedrock.amazonaws.com/model/m/invoke"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_rewrite_mapped_without_default() {
        let resolver =
            EndpointResolver::new(Some(EndpointMap::new().with("Op", "https://host-a/")), None);

        assert_eq!(
            resolver.rewrite("Op", "https://URL-PLACEHOLDER/path"),
            "https://host-a/path"
        );
        assert_eq!(
            resolver.rewrite("Other", "https://URL-PLACEHOLDER/path"),
            "https://URL-PLACEHOLDER/path"
        );
    }
}
