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

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// The error type for intercepted calls.
///
/// Every error aborts exactly one call. Nothing in this crate retries.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The pre-send hook fired for a call that was never captured at pre-sign.
    MissingCapturedRequest,
    /// Captured bytes or a streamed frame could not be decoded.
    EncodingError,
    /// The request never got an HTTP response: refused, reset, timed out.
    TransportError,
    /// The server answered with a non-2xx status and the caller asked to treat it as an error.
    UpstreamError,
    /// No usable credential to sign with.
    CredentialInvalid,
    /// The request can't be built or signed.
    RequestInvalid,
    /// Configuration is incomplete or inconsistent.
    ConfigInvalid,
    /// Everything else.
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::MissingCapturedRequest => "missing captured request",
            ErrorKind::EncodingError => "encoding error",
            ErrorKind::TransportError => "transport error",
            ErrorKind::UpstreamError => "upstream error",
            ErrorKind::CredentialInvalid => "invalid credential",
            ErrorKind::RequestInvalid => "invalid request",
            ErrorKind::ConfigInvalid => "invalid configuration",
            ErrorKind::Unexpected => "unexpected error",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human readable message, without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of an [`ErrorKind::UpstreamError`].
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// No capture exists for the call reaching pre-send.
    pub fn missing_captured_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingCapturedRequest, message)
    }

    /// Bytes that should have been text, or a malformed frame.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EncodingError, message)
    }

    /// Network level failure while dispatching.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportError, message)
    }

    /// Non-2xx response, carrying the status and the response body text.
    pub fn upstream(status: StatusCode, body: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorKind::UpstreamError, body);
        err.status = Some(status);
        err
    }

    /// No credential to sign with.
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// The request can't be built or signed.
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Configuration is incomplete.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Anything not covered by the other kinds.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, Error>;

impl From<rescope_core::Error> for Error {
    fn from(err: rescope_core::Error) -> Self {
        use rescope_core::ErrorKind as CoreKind;

        let kind = match err.kind() {
            CoreKind::CredentialInvalid | CoreKind::CredentialExpired => {
                ErrorKind::CredentialInvalid
            }
            CoreKind::RequestInvalid => ErrorKind::RequestInvalid,
            CoreKind::ConfigInvalid => ErrorKind::ConfigInvalid,
            CoreKind::Unexpected => ErrorKind::Unexpected,
        };
        Self::new(kind, err.to_string()).with_source(anyhow::Error::from(err))
    }
}

macro_rules! request_invalid_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
                }
            }
        )+
    };
}

request_invalid_from!(
    http::Error,
    http::header::InvalidHeaderName,
    http::header::InvalidHeaderValue,
    http::header::ToStrError,
    http::uri::InvalidUri,
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_core_error_mapping() {
        let err: Error = rescope_core::Error::credential_expired("token expired").into();
        assert_eq!(err.kind(), ErrorKind::CredentialInvalid);

        let err: Error = rescope_core::Error::config_invalid("bad profile").into();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_upstream_carries_status() {
        let err = Error::upstream(StatusCode::FORBIDDEN, "signature does not match");

        assert_eq!(err.kind(), ErrorKind::UpstreamError);
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(
            err.to_string(),
            "upstream error: signature does not match"
        );
    }
}
