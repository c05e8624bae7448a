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

//! Requests captured between the pre-sign and pre-send hooks.

use std::collections::HashMap;
use std::fmt;
use std::str;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Uri};

use crate::runtime::encode_url;
use crate::{Error, Result};

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Correlates the two hooks of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
    /// Allocate a fresh id, unique within the process.
    pub fn next() -> Self {
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The request as it looked right before the client signed it.
///
/// Header names keep the case the client used. Values stay raw bytes until
/// [`PendingRequest::rebuild`] decodes them.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// HTTP method.
    pub method: Method,
    /// Destination after endpoint rewriting, not yet percent-encoded.
    pub url: String,
    /// Headers in the order the client set them.
    pub headers: Vec<(String, Bytes)>,
    /// Raw body.
    pub body: Bytes,
    /// Whether the response is consumed as a stream.
    pub stream_output: bool,
}

impl PendingRequest {
    /// Build a fresh request carrying the same method, URL and body.
    ///
    /// The path is percent-encoded per segment the same way the client encodes it for the
    /// wire. Header values and the body must decode as UTF-8 text.
    pub fn rebuild(&self) -> Result<Request<Bytes>> {
        let url = encode_url(&self.url)?;
        let uri: Uri = url.parse().map_err(|e| {
            Error::request_invalid(format!("captured url {} is invalid", self.url)).with_source(e)
        })?;

        let mut req = Request::new(self.body.clone());
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = uri;

        for (name, value) in &self.headers {
            let text = str::from_utf8(value).map_err(|e| {
                Error::encoding(format!("header {name} is not valid utf-8")).with_source(e)
            })?;
            req.headers_mut().append(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(text)?,
            );
        }

        str::from_utf8(&self.body)
            .map_err(|e| Error::encoding("captured body is not valid utf-8").with_source(e))?;

        Ok(req)
    }
}

/// Captured requests keyed by call.
///
/// Each slot is written once at pre-sign and taken once at pre-send, so concurrent calls
/// through the same client never see each other's capture.
#[derive(Debug, Default)]
pub struct CaptureSlots {
    slots: Mutex<HashMap<CallId, PendingRequest>>,
}

impl CaptureSlots {
    /// Create empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the capture of `id`, returning a previous capture of the same call.
    pub fn insert(&self, id: CallId, pending: PendingRequest) -> Option<PendingRequest> {
        self.slots.lock().expect("lock poisoned").insert(id, pending)
    }

    /// Remove and return the capture of `id`.
    pub fn take(&self, id: CallId) -> Option<PendingRequest> {
        self.slots.lock().expect("lock poisoned").remove(&id)
    }

    /// Number of captures waiting for their pre-send hook.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("lock poisoned").len()
    }

    /// Whether no capture is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    fn pending(headers: Vec<(&str, &'static [u8])>, body: &'static [u8]) -> PendingRequest {
        PendingRequest {
            method: Method::POST,
            url: "https://host-a/model/delay-upload::m/invoke-with-response-stream".to_string(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), Bytes::from_static(v)))
                .collect(),
            body: Bytes::from_static(body),
            stream_output: true,
        }
    }

    #[test]
    fn test_rebuild_decodes_header_bytes() -> Result<()> {
        let req = pending(vec![("X-Test", b"42")], b"{}").rebuild()?;

        assert_eq!(req.headers()["x-test"].to_str()?, "42");
        Ok(())
    }

    #[test]
    fn test_rebuild_keeps_method_url_body() -> Result<()> {
        let p = pending(
            vec![("Content-Type", b"application/json")],
            br#"{"max_tokens":100}"#,
        );
        let req = p.rebuild()?;

        assert_eq!(req.method(), Method::POST);
        assert_eq!(
            req.uri().to_string(),
            "https://host-a/model/delay-upload%3A%3Am/invoke-with-response-stream"
        );
        assert_eq!(req.body(), &p.body);
        Ok(())
    }

    #[test]
    fn test_rebuild_encodes_path_like_the_client() -> Result<()> {
        let mut p = pending(vec![], b"{}");
        p.method = Method::PUT;
        p.url = "http://127.0.0.1:9000/bucket/a b/\u{30c6}\u{30b9}\u{30c8}.json?x-id=PutObject"
            .to_string();

        let req = p.rebuild()?;
        assert_eq!(
            req.uri().to_string(),
            "http://127.0.0.1:9000/bucket/a%20b/%E3%83%86%E3%82%B9%E3%83%88.json?x-id=PutObject"
        );
        Ok(())
    }

    #[test]
    fn test_rebuild_rejects_non_text() {
        let err = pending(vec![("X-Test", b"\xff\xfe")], b"{}")
            .rebuild()
            .expect_err("header must be rejected");
        assert_eq!(err.kind(), ErrorKind::EncodingError);

        let err = pending(vec![], b"\xc3\x28")
            .rebuild()
            .expect_err("body must be rejected");
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn test_capture_slots_are_per_call() {
        let slots = CaptureSlots::new();
        let (a, b) = (CallId::next(), CallId::next());
        assert_ne!(a, b);

        slots.insert(a, pending(vec![], b"a"));
        slots.insert(b, pending(vec![], b"b"));
        assert_eq!(slots.len(), 2);

        assert_eq!(slots.take(b).map(|p| p.body), Some(Bytes::from_static(b"b")));
        assert_eq!(slots.take(a).map(|p| p.body), Some(Bytes::from_static(b"a")));
        assert!(slots.take(a).is_none());
        assert!(slots.is_empty());
    }
}
