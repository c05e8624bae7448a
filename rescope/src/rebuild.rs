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

//! Re-signing captured requests under a declared credential scope.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderValue;
use log::debug;
use rescope_aws_v4::{RequestSigner, X_AMZ_CONTENT_SHA_256};
use rescope_core::hash::hex_sha256;
use rescope_core::time::DateTime;
use rescope_core::SignRequest;

use crate::dispatch::{Dispatch, Response};
use crate::endpoint::EndpointResolver;
use crate::pending::{CaptureSlots, PendingRequest};
use crate::runtime::{CallContext, HttpRequest, Listener, PreparedRequest, Session};
use crate::{Error, Result};

/// Captures requests before the client signs them and re-signs them under `scope`
/// before they are sent.
///
/// The client's own signature is discarded. The scope written into the new signature is
/// always the declared one, whatever host the request goes to.
#[derive(Debug)]
pub struct SignatureRebuilder {
    scope: String,
    resolver: EndpointResolver,
    session: Session,
    dispatcher: Arc<dyn Dispatch>,
    slots: CaptureSlots,

    time: Option<DateTime>,
}

impl SignatureRebuilder {
    /// Create a rebuilder sending through the session's dispatcher.
    pub fn new(scope: impl Into<String>, resolver: EndpointResolver, session: Session) -> Self {
        Self {
            scope: scope.into(),
            resolver,
            dispatcher: session.dispatcher(),
            session,
            slots: CaptureSlots::new(),

            time: None,
        }
    }

    /// Send through `dispatcher` instead of the session's.
    pub fn with_dispatcher(mut self, dispatcher: impl Dispatch) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Pin the signing time.
    ///
    /// # Note
    ///
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// The credential scope requests are re-signed under.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Number of captured calls still waiting for their pre-send hook.
    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    /// Rewrite the placeholder endpoint and capture the request for `call`.
    pub fn on_pre_sign(&self, call: &CallContext, req: &mut HttpRequest) -> Result<()> {
        let url = self.resolver.rewrite(&call.operation, &req.url).into_owned();
        debug!(
            "call {} {}: captured for scope {} at {url}",
            call.id, call.operation, self.scope
        );
        req.url = url;

        let pending = PendingRequest {
            method: req.method.clone(),
            url: req.url.clone(),
            headers: req.headers.clone(),
            body: req.body.clone(),
            stream_output: call.stream_output,
        };
        if self.slots.insert(call.id, pending).is_some() {
            return Err(Error::unexpected(format!(
                "call {} was captured twice",
                call.id
            )));
        }
        Ok(())
    }

    /// Re-sign the request captured for `call` and send it.
    ///
    /// `prepared` is the client's own encoded request; only its streaming flag is used.
    pub async fn on_pre_send(
        &self,
        call: &CallContext,
        prepared: &PreparedRequest,
    ) -> Result<Response> {
        let pending = self.slots.take(call.id).ok_or_else(|| {
            Error::missing_captured_request(format!(
                "no request captured for call {} {}",
                call.id, call.operation
            ))
        })?;

        let req = self.resign(&pending).await?;
        debug!(
            "call {} {}: sending re-signed request to {}",
            call.id,
            call.operation,
            req.uri()
        );
        self.dispatcher
            .dispatch(req, prepared.stream_output())
            .await
    }

    /// Rebuild `pending` and sign it under the declared scope.
    ///
    /// Method and body are byte-identical to the capture and the URL differs only by
    /// path percent-encoding. Only the signing headers are added.
    pub async fn resign(&self, pending: &PendingRequest) -> Result<http::Request<Bytes>> {
        let (mut parts, body) = pending.rebuild()?.into_parts();
        parts.headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::try_from(hex_sha256(&body))?,
        );

        let cred = self
            .session
            .credential()
            .await?
            .ok_or_else(|| Error::credential_invalid("no credential to re-sign with"))?;

        let mut signer = RequestSigner::new(&self.scope, self.session.region());
        if let Some(time) = self.time {
            signer = signer.with_time(time);
        }

        // Signing normalizes the query; keep the encoded URL as rebuilt.
        let uri = parts.uri.clone();
        signer
            .sign_request(self.session.context(), &mut parts, Some(&cred), None)
            .await?;
        parts.uri = uri;

        Ok(http::Request::from_parts(parts, body))
    }
}

#[async_trait]
impl Listener for SignatureRebuilder {
    async fn before_sign(&self, call: &CallContext, req: &mut HttpRequest) -> Result<()> {
        self.on_pre_sign(call, req)
    }

    async fn before_send(
        &self,
        call: &CallContext,
        req: &PreparedRequest,
    ) -> Result<Option<Response>> {
        self.on_pre_send(call, req).await.map(Some)
    }

    fn finish(&self, call: &CallContext) {
        if self.slots.take(call.id).is_some() {
            debug!(
                "call {} {}: ended before pre-send, capture dropped",
                call.id, call.operation
            );
        }
    }
}
