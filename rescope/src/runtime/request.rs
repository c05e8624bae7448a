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
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::{Method, Request};
use percent_encoding::utf8_percent_encode;
use rescope_aws_v4::AWS_URI_ENCODE_SET;

use crate::{Error, Result};

/// A request right before signing. The URL is plain text and may still hold the
/// placeholder endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL, not percent-encoded.
    pub url: String,
    /// Headers with the names' case preserved.
    pub headers: Vec<(String, Bytes)>,
    /// Body.
    pub body: Bytes,
}

impl HttpRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Encode for the wire: percent-encode the path and set `content-length`.
    pub(crate) fn encode(&self) -> Result<Request<Bytes>> {
        let url = encode_url(&self.url)?;

        let mut req = Request::new(self.body.clone());
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = url.parse()?;

        let headers = req.headers_mut();
        for (name, value) in &self.headers {
            headers.append(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_bytes(value)?,
            );
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));

        Ok(req)
    }
}

/// Percent-encode each path segment, leaving scheme, authority and query alone.
pub(crate) fn encode_url(url: &str) -> Result<String> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| Error::request_invalid(format!("url {url} has no scheme")))?;
    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, "/"),
    };
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let mut encoded = format!(
        "{scheme}://{authority}{}",
        utf8_percent_encode(path, &AWS_URI_ENCODE_SET)
    );
    if let Some(query) = query {
        encoded.push('?');
        encoded.push_str(query);
    }
    Ok(encoded)
}

/// A signed, wire-encoded request.
///
/// Encoding altered the path and added framing headers, so this copy is only good for
/// sending as is.
#[derive(Debug)]
pub struct PreparedRequest {
    request: Request<Bytes>,
    stream_output: bool,
}

impl PreparedRequest {
    /// Wrap a request ready for transmission.
    pub fn new(request: Request<Bytes>, stream_output: bool) -> Self {
        Self {
            request,
            stream_output,
        }
    }

    /// The request as it would go on the wire.
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Whether the response is streamed.
    pub fn stream_output(&self) -> bool {
        self.stream_output
    }

    /// Take the request.
    pub fn into_request(self) -> Request<Bytes> {
        self.request
    }
}
