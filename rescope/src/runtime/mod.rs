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

//! A small typed client runtime that drives the signing lifecycle.
//!
//! A [`Client`] call moves through these steps:
//!
//! 1. build an [`HttpRequest`] from the [`Operation`] against the client's endpoint
//! 2. run every [`Listener::before_sign`] in registration order
//! 3. percent-encode the path and sign with the client's own service scope
//! 4. run every [`Listener::before_send`]; the first to return a response ends the call
//! 5. otherwise hand the signed request to the session's dispatcher
//! 6. run every [`Listener::finish`], even if the call failed or was dropped

mod client;
pub use client::{Client, ClientConfig};

mod listener;
pub use listener::{CallContext, Listener};

mod operation;
pub use operation::Operation;

mod request;
pub use request::{HttpRequest, PreparedRequest};
pub(crate) use request::encode_url;

mod session;
pub use session::{Session, SessionBuilder};
