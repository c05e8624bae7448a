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

//! Settings shared by the demo binaries.

use anyhow::{anyhow, Result};
use log::debug;
use rescope_aws_v4::resolve_region;
use rescope_core::{Context, OsEnv};
use rescope_file_read_tokio::TokioFileRead;

/// Variable naming the endpoint intercepted calls go to.
pub const ENDPOINT_URL: &str = "ENDPOINT_URL";
/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Credential scope intercepted calls are re-signed under.
pub const RESIGN_SCOPE: &str = "lambda";

/// Load `.env` from the working directory if there is one.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => debug!("loaded environment from {}", path.display()),
        Err(err) => debug!("no .env loaded: {err}"),
    }
}

/// Context backed by the real filesystem and process environment.
pub fn context() -> Context {
    Context::new().with_file_read(TokioFileRead).with_env(OsEnv)
}

/// Settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl DemoConfig {
    /// Resolve the region and endpoint from `ctx`.
    pub async fn load(ctx: &Context) -> Result<Self> {
        let region = resolve_region(ctx)
            .await?
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint_url = ctx.env_var(ENDPOINT_URL).filter(|v| !v.is_empty());

        Ok(Self {
            region,
            endpoint_url,
        })
    }

    /// The intercept endpoint, which must be set.
    pub fn endpoint_url(&self) -> Result<&str> {
        self.endpoint_url
            .as_deref()
            .ok_or_else(|| anyhow!("{ENDPOINT_URL} must be set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rescope_core::StaticEnv;
    use std::collections::HashMap;

    fn ctx_with(envs: &[(&str, &str)]) -> Context {
        Context::new().with_file_read(TokioFileRead).with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[tokio::test]
    async fn test_load_defaults() {
        let config = DemoConfig::load(&ctx_with(&[])).await.unwrap();
        assert_eq!(
            config,
            DemoConfig {
                region: DEFAULT_REGION.to_string(),
                endpoint_url: None,
            }
        );
        assert!(config.endpoint_url().is_err());
    }

    #[tokio::test]
    async fn test_load_from_env() {
        let config = DemoConfig::load(&ctx_with(&[
            ("AWS_REGION", "ap-northeast-1"),
            (ENDPOINT_URL, "https://abc.lambda-url.ap-northeast-1.on.aws"),
        ]))
        .await
        .unwrap();
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(
            config.endpoint_url().unwrap(),
            "https://abc.lambda-url.ap-northeast-1.on.aws"
        );
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_unset() {
        let config = DemoConfig::load(&ctx_with(&[(ENDPOINT_URL, "")]))
            .await
            .unwrap();
        assert_eq!(config.endpoint_url, None);
    }
}
