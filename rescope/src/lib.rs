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

//! Redirect AWS API calls to other endpoints and re-sign them under another credential scope.
//!
//! A client built for one service (say `bedrock-runtime`) signs its requests for that
//! service. `rescope` captures each request before the client signs it, points it at the
//! endpoint configured for the operation, and re-signs it under a declared scope (say
//! `lambda`) right before it is sent. Call sites stay unchanged.
//!
//! ## Example
//!
//! ```no_run
//! use http::Method;
//! use rescope::runtime::Operation;
//! use rescope::{InterceptConfig, InterceptedSession, Session};
//! use rescope_core::{Context, OsEnv};
//!
//! # async fn run() -> rescope::Result<()> {
//! let session = Session::from_env(Context::new().with_env(OsEnv)).await?;
//! let intercepted = InterceptedSession::new(
//!     session,
//!     InterceptConfig::new("lambda")
//!         .with_default_url("https://abcdefg.lambda-url.us-east-1.on.aws"),
//! );
//!
//! let client = intercepted.client("bedrock-runtime");
//! let op = Operation::new("InvokeModel", Method::POST, "/model/m/invoke").with_body("{}");
//! let resp = client.call(&op).await?.error_for_status().await?;
//! println!("{:?}", resp.bytes().await?);
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod error;
pub use error::{Error, ErrorKind, Result};

pub mod dispatch;
pub mod endpoint;
pub mod event_stream;
pub mod pending;
pub mod rebuild;
pub mod runtime;

mod intercept;
pub use intercept::{install, InterceptConfig, InterceptedSession};

pub use dispatch::{Body, Dispatch, ReqwestDispatcher, Response};
pub use endpoint::{EndpointMap, EndpointResolver, Resolved, PLACEHOLDER_ENDPOINT};
pub use rebuild::SignatureRebuilder;
pub use runtime::{Client, ClientConfig, Operation, Session};
