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

use crate::constants::{AWS_CONFIG_FILE, AWS_DEFAULT_REGION, AWS_PROFILE, AWS_REGION};
use crate::provide_credential::{config_section_name, load_profile_section};
use rescope_core::{Context, Result};

/// Resolve the region to sign for.
///
/// Checks `AWS_REGION`, then `AWS_DEFAULT_REGION`, then the `region` key of the
/// active profile in the shared config file.
pub async fn resolve_region(ctx: &Context) -> Result<Option<String>> {
    for key in [AWS_REGION, AWS_DEFAULT_REGION] {
        if let Some(region) = ctx.env_var(key).filter(|v| !v.is_empty()) {
            return Ok(Some(region));
        }
    }

    let profile = ctx
        .env_var(AWS_PROFILE)
        .unwrap_or_else(|| "default".to_string());
    let path = ctx
        .env_var(AWS_CONFIG_FILE)
        .unwrap_or_else(|| "~/.aws/config".to_string());

    Ok(load_profile_section(ctx, &path, &config_section_name(&profile))
        .await?
        .and_then(|mut props| props.remove("region")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rescope_core::StaticEnv;
    use rescope_file_read_tokio::TokioFileRead;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

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
    async fn test_region_env_precedence() -> anyhow::Result<()> {
        let ctx = ctx_with(&[(AWS_REGION, "us-west-2"), (AWS_DEFAULT_REGION, "eu-west-1")]);
        assert_eq!(resolve_region(&ctx).await?.as_deref(), Some("us-west-2"));

        let ctx = ctx_with(&[(AWS_DEFAULT_REGION, "eu-west-1")]);
        assert_eq!(resolve_region(&ctx).await?.as_deref(), Some("eu-west-1"));

        Ok(())
    }

    #[tokio::test]
    async fn test_region_from_profile() -> anyhow::Result<()> {
        let mut config = NamedTempFile::new()?;
        writeln!(config, "[default]")?;
        writeln!(config, "region = ap-northeast-1")?;
        writeln!(config, "[profile dev]")?;
        writeln!(config, "region = sa-east-1")?;
        let path = config.path().to_string_lossy().to_string();

        let ctx = ctx_with(&[(AWS_CONFIG_FILE, &path)]);
        assert_eq!(
            resolve_region(&ctx).await?.as_deref(),
            Some("ap-northeast-1")
        );

        let ctx = ctx_with(&[(AWS_CONFIG_FILE, &path), (AWS_PROFILE, "dev")]);
        assert_eq!(resolve_region(&ctx).await?.as_deref(), Some("sa-east-1"));

        let ctx = ctx_with(&[(AWS_CONFIG_FILE, "/not/exist")]);
        assert_eq!(resolve_region(&ctx).await?, None);

        Ok(())
    }
}
