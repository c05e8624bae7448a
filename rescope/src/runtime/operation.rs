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

use bytes::Bytes;
use http::Method;

/// One API operation, described the way a generated SDK would.
///
/// `path` is kept exactly as given; percent-encoding happens when the request is prepared
/// for the wire.
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    method: Method,
    path: String,
    headers: Vec<(String, Bytes)>,
    body: Bytes,
    stream_output: bool,
}

impl Operation {
    /// Create an operation with an empty body.
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            stream_output: false,
        }
    }

    /// Add a header. Repeated names are all sent.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Mark the response as streamed.
    pub fn with_stream_output(mut self, stream_output: bool) -> Self {
        self.stream_output = stream_output;
        self
    }

    /// Operation name, used for endpoint lookup.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Unencoded path, starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> &[(String, Bytes)] {
        &self.headers
    }

    /// Body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the response is streamed.
    pub fn stream_output(&self) -> bool {
        self.stream_output
    }
}
