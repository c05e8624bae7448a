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

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};

use log::debug;
use rescope_aws_v4::{resolve_region, Credential, DefaultCredentialProvider};
use rescope_core::{Context, OsEnv, ProvideCredential, SigningCredential};
use rescope_file_read_tokio::TokioFileRead;

use super::{Client, ClientConfig};
use crate::dispatch::{Dispatch, ReqwestDispatcher};
use crate::{Error, Result};

/// Shared configuration for clients: where credentials come from, which region to sign
/// for and how requests are sent.
///
/// Cloning is cheap; clones share the credential cache.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    ctx: Context,
    region: String,
    provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    dispatcher: Arc<dyn Dispatch>,
    credential: Mutex<Option<Credential>>,
}

impl Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("region", &self.inner.region)
            .field("provider", &self.inner.provider)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

impl Session {
    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Build a session from the environment: region from `AWS_REGION`,
    /// `AWS_DEFAULT_REGION` or the profile, credentials from the default chain.
    pub async fn from_env(ctx: Context) -> Result<Self> {
        let region = resolve_region(&ctx)
            .await?
            .ok_or_else(|| Error::config_invalid("region is not configured"))?;

        Self::builder()
            .context(ctx)
            .region(region)
            .credential_provider(DefaultCredentialProvider::new())
            .build()
    }

    /// Region every client of this session signs for.
    pub fn region(&self) -> &str {
        &self.inner.region
    }

    /// Context the credential provider runs with.
    pub fn context(&self) -> &Context {
        &self.inner.ctx
    }

    /// Dispatcher used when no listener takes over a call.
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        self.inner.dispatcher.clone()
    }

    /// Current credential, reloaded from the provider when missing or about to expire.
    pub async fn credential(&self) -> Result<Option<Credential>> {
        let cred = self.inner.credential.lock().expect("lock poisoned").clone();
        if cred.is_valid() {
            return Ok(cred);
        }

        debug!("loading credential for session in {}", self.inner.region);
        let cred = self.inner.provider.provide_credential(&self.inner.ctx).await?;
        *self.inner.credential.lock().expect("lock poisoned") = cred.clone();
        Ok(cred)
    }

    /// Create a client for `service`.
    pub fn client(&self, service: &str, config: ClientConfig) -> Client {
        Client::new(self.clone(), service, config)
    }
}

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    ctx: Option<Context>,
    region: Option<String>,
    provider: Option<Arc<dyn ProvideCredential<Credential = Credential>>>,
    dispatcher: Option<Arc<dyn Dispatch>>,
}

impl SessionBuilder {
    /// Context for credential loading. Defaults to the process environment and `tokio::fs`.
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Region to sign for. Required.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Where credentials come from. Defaults to [`DefaultCredentialProvider`].
    pub fn credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// How requests are sent. Defaults to [`ReqwestDispatcher`].
    pub fn dispatcher(mut self, dispatcher: impl Dispatch) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<Session> {
        let region = self
            .region
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("session requires a region"))?;

        Ok(Session {
            inner: Arc::new(SessionInner {
                ctx: self
                    .ctx
                    .unwrap_or_else(|| Context::new().with_file_read(TokioFileRead).with_env(OsEnv)),
                region,
                provider: self
                    .provider
                    .unwrap_or_else(|| Arc::new(DefaultCredentialProvider::new())),
                dispatcher: self
                    .dispatcher
                    .unwrap_or_else(|| Arc::new(ReqwestDispatcher::new())),
                credential: Mutex::new(None),
            }),
        })
    }
}
