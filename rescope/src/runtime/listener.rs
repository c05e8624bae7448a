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

use std::fmt::Debug;

use async_trait::async_trait;

use super::{HttpRequest, PreparedRequest};
use crate::dispatch::Response;
use crate::pending::CallId;
use crate::Result;

/// Per-call data handed to both hooks of the same call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Correlates `before_sign` with `before_send`.
    pub id: CallId,
    /// Operation name.
    pub operation: String,
    /// Whether the response is streamed.
    pub stream_output: bool,
}

impl CallContext {
    /// Start a new call with a fresh id.
    pub fn new(operation: impl Into<String>, stream_output: bool) -> Self {
        Self {
            id: CallId::next(),
            operation: operation.into(),
            stream_output,
        }
    }
}

/// Hooks a [`Client`](super::Client) runs around signing.
#[async_trait]
pub trait Listener: Debug + Send + Sync + 'static {
    /// Runs before the client signs. May rewrite the request.
    async fn before_sign(&self, _call: &CallContext, _req: &mut HttpRequest) -> Result<()> {
        Ok(())
    }

    /// Runs right before transmission. Returning a response ends the call with it.
    async fn before_send(
        &self,
        _call: &CallContext,
        _req: &PreparedRequest,
    ) -> Result<Option<Response>> {
        Ok(None)
    }

    /// Runs once the call is over, however it ended: a response, an error, or the call
    /// future being dropped.
    fn finish(&self, _call: &CallContext) {}
}
