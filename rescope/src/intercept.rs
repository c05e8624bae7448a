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

//! Wiring a [`SignatureRebuilder`] into clients.

use std::sync::Arc;

use log::debug;

use crate::endpoint::{EndpointMap, EndpointResolver, PLACEHOLDER_ENDPOINT};
use crate::rebuild::SignatureRebuilder;
use crate::runtime::{Client, ClientConfig, Session};

/// What intercepted calls are re-signed as and where they go.
#[derive(Debug, Clone)]
pub struct InterceptConfig {
    scope: String,
    endpoints: Option<EndpointMap>,
    default_url: Option<String>,
}

impl InterceptConfig {
    /// Re-sign every call under `scope`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            endpoints: None,
            default_url: None,
        }
    }

    /// Send calls of `operation` to `url`.
    pub fn with_endpoint(mut self, operation: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints = Some(self.endpoints.unwrap_or_default().with(operation, url));
        self
    }

    /// Replace the whole operation map.
    pub fn with_endpoints(mut self, endpoints: EndpointMap) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Send calls of unmapped operations to `url`.
    pub fn with_default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = Some(url.into());
        self
    }

    /// The declared credential scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Resolver for this configuration.
    pub fn resolver(&self) -> EndpointResolver {
        EndpointResolver::new(self.endpoints.clone(), self.default_url.clone())
    }
}

/// Install interception on `client`.
///
/// The rebuilder is registered ahead of every other listener so it sees requests before
/// anything else touches them. The returned handle is the registered listener.
pub fn install(
    client: &mut Client,
    session: &Session,
    config: &InterceptConfig,
) -> Arc<SignatureRebuilder> {
    let rebuilder = Arc::new(SignatureRebuilder::new(
        config.scope(),
        config.resolver(),
        session.clone(),
    ));
    client.register_first(rebuilder.clone());
    debug!(
        "installed interception on {} client with scope {}",
        client.service(),
        config.scope()
    );

    rebuilder
}

/// A session whose clients are all intercepted.
///
/// ```no_run
/// use rescope::{InterceptConfig, InterceptedSession, Session};
///
/// # async fn run() -> rescope::Result<()> {
/// let session = Session::builder().region("us-east-1").build()?;
/// let intercepted = InterceptedSession::new(
///     session,
///     InterceptConfig::new("lambda").with_default_url("https://abc.lambda-url.us-east-1.on.aws"),
/// );
/// let client = intercepted.client("bedrock-runtime");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InterceptedSession {
    session: Session,
    config: InterceptConfig,
}

impl InterceptedSession {
    /// Wrap `session`.
    pub fn new(session: Session, config: InterceptConfig) -> Self {
        Self { session, config }
    }

    /// The wrapped session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The interception settings.
    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    /// Create a client for `service` pointed at the placeholder endpoint, with interception
    /// installed.
    pub fn client(&self, service: &str) -> Client {
        let mut client = self.session.client(
            service,
            ClientConfig::new().with_endpoint_url(PLACEHOLDER_ENDPOINT),
        );
        install(&mut client, &self.session, &self.config);
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Resolved;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_resolver() {
        let config = InterceptConfig::new("lambda")
            .with_endpoint("InvokeModelWithResponseStream", "https://host-a")
            .with_endpoint("PutObject", "https://host-c")
            .with_default_url("https://host-b");
        let resolver = config.resolver();

        assert_eq!(config.scope(), "lambda");
        assert_eq!(
            resolver.resolve("InvokeModelWithResponseStream"),
            Resolved::Url("https://host-a")
        );
        assert_eq!(resolver.resolve("PutObject"), Resolved::Url("https://host-c"));
        assert_eq!(resolver.resolve("InvokeModel"), Resolved::Url("https://host-b"));
    }

    #[test]
    fn test_intercepted_client_uses_placeholder() -> crate::Result<()> {
        let session = Session::builder().region("us-east-1").build()?;
        let client = InterceptedSession::new(session, InterceptConfig::new("lambda"))
            .client("bedrock-runtime");

        assert_eq!(client.endpoint(), PLACEHOLDER_ENDPOINT);
        assert_eq!(client.service(), "bedrock-runtime");
        Ok(())
    }
}
