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

use std::sync::Arc;

use http::HeaderValue;
use log::debug;
use rescope_aws_v4::{RequestSigner, X_AMZ_CONTENT_SHA_256};
use rescope_core::hash::hex_sha256;
use rescope_core::SignRequest;

use super::{CallContext, HttpRequest, Listener, Operation, PreparedRequest, Session};
use crate::dispatch::Response;
use crate::Result;

/// Runs [`Listener::finish`] when the call leaves scope.
struct CallGuard<'a> {
    listeners: &'a [Arc<dyn Listener>],
    call: &'a CallContext,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        for listener in self.listeners {
            listener.finish(self.call);
        }
    }
}

/// Per-client settings.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Base URL replacing `https://{service}.{region}.amazonaws.com`.
    pub endpoint_url: Option<String>,
}

impl ClientConfig {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the base URL.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

/// A client bound to one service.
///
/// It signs every request under its own service name. Listeners registered on it can
/// rewrite requests before signing or take over sending.
#[derive(Debug, Clone)]
pub struct Client {
    service: String,
    endpoint: String,
    session: Session,
    listeners: Vec<Arc<dyn Listener>>,
}

impl Client {
    pub(crate) fn new(session: Session, service: &str, config: ClientConfig) -> Self {
        let endpoint = config
            .endpoint_url
            .unwrap_or_else(|| format!("https://{service}.{}.amazonaws.com", session.region()));

        Self {
            service: service.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session,
            listeners: Vec::new(),
        }
    }

    /// Service name this client signs for.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Base URL requests are built against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The session this client was created from.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Register `listener` ahead of every listener already registered.
    pub fn register_first(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.insert(0, listener);
    }

    /// Register `listener` after every listener already registered.
    pub fn register(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.push(listener);
    }

    /// Run `op` and return the response.
    ///
    /// HTTP error statuses are returned as responses; use
    /// [`Response::error_for_status`] to turn them into errors.
    pub async fn call(&self, op: &Operation) -> Result<Response> {
        let call = CallContext::new(op.name(), op.stream_output());
        let mut req = HttpRequest {
            method: op.method().clone(),
            url: format!("{}{}", self.endpoint, op.path()),
            headers: op.headers().to_vec(),
            body: op.body().clone(),
        };
        debug!(
            "call {} {}: {} {}",
            call.id, call.operation, req.method, req.url
        );
        let _guard = CallGuard {
            listeners: &self.listeners,
            call: &call,
        };

        for listener in &self.listeners {
            listener.before_sign(&call, &mut req).await?;
        }

        let prepared = self.prepare(&req, call.stream_output).await?;

        for listener in &self.listeners {
            if let Some(resp) = listener.before_send(&call, &prepared).await? {
                debug!("call {} {}: response from listener", call.id, call.operation);
                return Ok(resp);
            }
        }

        self.session
            .dispatcher()
            .dispatch(prepared.into_request(), call.stream_output)
            .await
    }

    /// Encode for the wire and sign under this client's service.
    async fn prepare(&self, req: &HttpRequest, stream_output: bool) -> Result<PreparedRequest> {
        let (mut parts, body) = req.encode()?.into_parts();
        parts.headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::try_from(hex_sha256(&body))?,
        );

        let cred = self.session.credential().await?;
        RequestSigner::new(&self.service, self.session.region())
            .sign_request(self.session.context(), &mut parts, cred.as_ref(), None)
            .await?;

        Ok(PreparedRequest::new(
            http::Request::from_parts(parts, body),
            stream_output,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use pretty_assertions::assert_eq;
    use rescope_aws_v4::StaticCredentialProvider;
    use std::sync::Mutex;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::builder()
            .region("us-east-1")
            .credential_provider(StaticCredentialProvider::new("ak", "sk"))
            .build()
            .expect("session must build")
    }

    /// Records the order hooks fire in.
    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn before_sign(&self, _: &CallContext, _: &mut HttpRequest) -> Result<()> {
            self.log
                .lock()
                .expect("lock poisoned")
                .push(format!("sign:{}", self.name));
            Ok(())
        }

        async fn before_send(
            &self,
            _: &CallContext,
            _: &PreparedRequest,
        ) -> Result<Option<Response>> {
            self.log
                .lock()
                .expect("lock poisoned")
                .push(format!("send:{}", self.name));
            Ok(None)
        }

        fn finish(&self, _: &CallContext) {
            self.log
                .lock()
                .expect("lock poisoned")
                .push(format!("finish:{}", self.name));
        }
    }

    /// Answers every call itself.
    #[derive(Debug)]
    struct Canned;

    #[async_trait]
    impl Listener for Canned {
        async fn before_send(
            &self,
            _: &CallContext,
            req: &PreparedRequest,
        ) -> Result<Option<Response>> {
            let auth = req
                .request()
                .headers()
                .get(http::header::AUTHORIZATION)
                .ok_or_else(|| Error::unexpected("request must be signed"))?;
            Ok(Some(Response::new(
                StatusCode::OK,
                Default::default(),
                crate::dispatch::Body::Buffered(Bytes::copy_from_slice(auth.as_bytes())),
            )))
        }
    }

    #[test]
    fn test_default_endpoint() {
        let client = session().client("bedrock-runtime", ClientConfig::new());
        assert_eq!(
            client.endpoint(),
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );

        let client = session().client(
            "s3",
            ClientConfig::new().with_endpoint_url("http://127.0.0.1:9000/"),
        );
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_listener_order() -> Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut client = session().client("s3", ClientConfig::new());
        client.register(Arc::new(Recorder {
            name: "b",
            log: log.clone(),
        }));
        client.register_first(Arc::new(Recorder {
            name: "a",
            log: log.clone(),
        }));
        client.register(Arc::new(Canned));

        let resp = client
            .call(&Operation::new("GetObject", Method::GET, "/bucket/key"))
            .await?;
        let auth = resp.bytes().await?;
        assert!(String::from_utf8_lossy(&auth).contains("/us-east-1/s3/aws4_request"));

        assert_eq!(
            *log.lock().expect("lock poisoned"),
            vec!["sign:a", "sign:b", "send:a", "send:b", "finish:a", "finish:b"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_finish_runs_when_call_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut client = session().client("s3", ClientConfig::new());
        client.register(Arc::new(Recorder {
            name: "a",
            log: log.clone(),
        }));

        let op = Operation::new("PutObject", Method::PUT, "/bucket/key")
            .with_header("x-bad", Bytes::from_static(b"a\nb"));
        client.call(&op).await.expect_err("header must be rejected");

        assert_eq!(*log.lock().expect("lock poisoned"), vec!["sign:a", "finish:a"]);
    }

    #[tokio::test]
    async fn test_call_without_listeners_is_signed_and_sent() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/a%20b.json"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-content-sha256"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = session().client("s3", ClientConfig::new().with_endpoint_url(server.uri()));
        let resp = client
            .call(&Operation::new("PutObject", Method::PUT, "/bucket/a b.json").with_body("{}"))
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        Ok(())
    }
}
