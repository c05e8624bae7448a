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

//! Sending signed requests and handing back what the server said.

use std::fmt::{self, Debug};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use log::debug;

use crate::event_stream::EventStream;
use crate::{Error, Result};

/// Sends a signed request.
///
/// Implementations pass every HTTP status through as a [`Response`]. Only failures that
/// prevent getting a response at all are errors.
#[async_trait]
pub trait Dispatch: Debug + Send + Sync + 'static {
    /// Send `req`. With `stream` set the body is delivered chunk by chunk as it arrives.
    async fn dispatch(&self, req: http::Request<Bytes>, stream: bool) -> Result<Response>;
}

/// Dispatcher backed by [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestDispatcher {
    client: reqwest::Client,
}

impl ReqwestDispatcher {
    /// Create a dispatcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<reqwest::Client> for ReqwestDispatcher {
    fn from(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Dispatch for ReqwestDispatcher {
    async fn dispatch(&self, req: http::Request<Bytes>, stream: bool) -> Result<Response> {
        debug!("dispatching {} {}", req.method(), req.uri());

        let req = reqwest::Request::try_from(req).map_err(|e| {
            Error::request_invalid("request can't be converted for sending").with_source(e)
        })?;
        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::transport(format!("failed to send request: {e}")).with_source(e))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        debug!("received response with status {status}");

        let body = if stream {
            Body::Streamed(
                resp.bytes_stream()
                    .map_err(|e| {
                        Error::transport(format!("failed to read response stream: {e}"))
                            .with_source(e)
                    })
                    .boxed(),
            )
        } else {
            Body::Buffered(resp.bytes().await.map_err(|e| {
                Error::transport(format!("failed to read response body: {e}")).with_source(e)
            })?)
        };

        Ok(Response::new(status, headers, body))
    }
}

/// Response body, either already in memory or still arriving.
pub enum Body {
    /// The full payload.
    Buffered(Bytes),
    /// Chunks in arrival order. A failure mid-stream shows up as an error item.
    Streamed(BoxStream<'static, Result<Bytes>>),
}

impl Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffered(bs) => f.debug_tuple("Buffered").field(&bs.len()).finish(),
            Body::Streamed(_) => f.write_str("Streamed"),
        }
    }
}

impl Body {
    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes> {
        match self {
            Body::Buffered(bs) => Ok(bs),
            Body::Streamed(s) => {
                let buf = s
                    .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                        buf.extend_from_slice(&chunk);
                        Ok(buf)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }

    /// View the body as a stream of chunks. A buffered body yields one chunk.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        match self {
            Body::Buffered(bs) => stream::once(async move { Ok(bs) }).boxed(),
            Body::Streamed(s) => s,
        }
    }
}

/// What the caller of an intercepted operation observes.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Assemble a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-2xx response into [`crate::ErrorKind::UpstreamError`].
    ///
    /// The error message is the response body read as text.
    pub async fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let status = self.status;
        let body = self.body.bytes().await?;
        Err(Error::upstream(status, String::from_utf8_lossy(&body)))
    }

    /// Take the body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Decode the body as an AWS event stream.
    pub fn into_event_stream(self) -> EventStream {
        EventStream::new(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get(uri: &str) -> http::Request<Bytes> {
        let mut req = http::Request::new(Bytes::new());
        *req.uri_mut() = uri.parse().expect("uri must be valid");
        req
    }

    #[tokio::test]
    async fn test_dispatch_passes_error_status_through() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
            .mount(&server)
            .await;

        let resp = ReqwestDispatcher::new()
            .dispatch(get(&format!("{}/denied", server.uri())), false)
            .await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(!resp.is_success());

        let err = resp.error_for_status().await.expect_err("must be upstream error");
        assert_eq!(err.kind(), ErrorKind::UpstreamError);
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(err.message(), "access denied");
        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch_streamed_body() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
            .mount(&server)
            .await;

        let resp = ReqwestDispatcher::new()
            .dispatch(get(&format!("{}/stream", server.uri())), true)
            .await?;
        let body = resp.into_body();
        assert!(matches!(body, Body::Streamed(_)));
        assert_eq!(body.bytes().await?, Bytes::from_static(b"hello world"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch_connection_refused() {
        // Bind then drop a listener so the port is very likely closed.
        let uri = {
            let listener =
                std::net::TcpListener::bind("127.0.0.1:0").expect("bind must succeed");
            format!(
                "http://{}",
                listener.local_addr().expect("local addr must exist")
            )
        };

        let err = ReqwestDispatcher::new()
            .dispatch(get(&format!("{uri}/gone")), false)
            .await
            .expect_err("must fail to connect");
        assert_eq!(err.kind(), ErrorKind::TransportError);
    }

    #[tokio::test]
    async fn test_buffered_body_as_stream() -> Result<()> {
        let chunks = Body::Buffered(Bytes::from_static(b"abc"))
            .into_stream()
            .try_collect::<Vec<_>>()
            .await?;
        assert_eq!(chunks, vec![Bytes::from_static(b"abc")]);
        Ok(())
    }
}
