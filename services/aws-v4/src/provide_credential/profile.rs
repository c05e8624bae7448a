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

use crate::constants::{AWS_CONFIG_FILE, AWS_PROFILE, AWS_SHARED_CREDENTIALS_FILE};
use crate::Credential;
use async_trait::async_trait;
use ini::Ini;
use log::debug;
use rescope_core::{Context, Error, ProvideCredential, Result};
use std::collections::HashMap;

/// ProfileCredentialProvider loads AWS credentials from the shared files.
///
/// It reads from:
/// - `~/.aws/credentials` (or the path specified by `AWS_SHARED_CREDENTIALS_FILE`)
/// - `~/.aws/config` (or the path specified by `AWS_CONFIG_FILE`)
///
/// The profile to use is determined by:
/// 1. The `AWS_PROFILE` environment variable
/// 2. The profile specified via `with_profile()`
/// 3. Default to "default"
///
/// The credentials file wins when both files carry keys for the profile.
#[derive(Debug)]
pub struct ProfileCredentialProvider {
    profile: String,
    config_file: Option<String>,
    credentials_file: Option<String>,
}

impl Default for ProfileCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self {
            profile: "default".to_string(),
            config_file: None,
            credentials_file: None,
        }
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the path to the config file.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set the path to the credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = ctx
            .env_var(AWS_PROFILE)
            .unwrap_or_else(|| self.profile.clone());

        let credentials_file = self
            .credentials_file
            .clone()
            .or_else(|| ctx.env_var(AWS_SHARED_CREDENTIALS_FILE))
            .unwrap_or_else(|| "~/.aws/credentials".to_string());
        if let Some(props) = load_profile_section(ctx, &credentials_file, &profile).await? {
            if let Some(cred) = credential_from_props(&props) {
                return Ok(Some(cred));
            }
        }

        let config_file = self
            .config_file
            .clone()
            .or_else(|| ctx.env_var(AWS_CONFIG_FILE))
            .unwrap_or_else(|| "~/.aws/config".to_string());
        let section = config_section_name(&profile);
        Ok(load_profile_section(ctx, &config_file, &section)
            .await?
            .and_then(|props| credential_from_props(&props)))
    }
}

/// Config file sections are named `profile <name>` except for `default`.
pub(crate) fn config_section_name(profile: &str) -> String {
    match profile {
        "default" => "default".to_string(),
        x => format!("profile {x}"),
    }
}

/// Load one section of an ini file.
///
/// Unreadable files and missing sections yield `Ok(None)`; a file that exists but
/// can't be parsed is a config error.
pub(crate) async fn load_profile_section(
    ctx: &Context,
    path: &str,
    section: &str,
) -> Result<Option<HashMap<String, String>>> {
    let expanded_path = if path.starts_with("~/") {
        match ctx.expand_home_dir(path) {
            Some(expanded) => expanded,
            None => {
                debug!("failed to expand homedir for path: {path}");
                return Ok(None);
            }
        }
    } else {
        path.to_string()
    };

    let content = match ctx.file_read(&expanded_path).await {
        Ok(content) => content,
        Err(err) => {
            debug!("failed to read profile file {expanded_path}: {err:?}");
            return Ok(None);
        }
    };

    let conf = Ini::load_from_str(&String::from_utf8_lossy(&content)).map_err(|e| {
        Error::config_invalid(format!("failed to parse profile file {expanded_path}"))
            .with_source(anyhow::Error::new(e))
    })?;

    match conf.section(Some(section)) {
        Some(props) => Ok(Some(
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )),
        None => {
            debug!("section {section} not found in {expanded_path}");
            Ok(None)
        }
    }
}

fn credential_from_props(props: &HashMap<String, String>) -> Option<Credential> {
    let ak = props.get("aws_access_key_id")?;
    let sk = props.get("aws_secret_access_key")?;

    Some(Credential {
        access_key_id: ak.clone(),
        secret_access_key: sk.clone(),
        session_token: props.get("aws_session_token").cloned(),
        expires_in: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rescope_core::StaticEnv;
    use rescope_file_read_tokio::TokioFileRead;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    fn ctx_with(envs: Vec<(&str, String)>) -> Context {
        Context::new().with_file_read(TokioFileRead).with_env(StaticEnv {
            home_dir: None,
            envs: envs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        })
    }

    fn write_file(path: &Path, lines: &[&str]) -> anyhow::Result<()> {
        let mut f = File::create(path)?;
        for line in lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_profile_from_credentials_file() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let tmp_dir = tempdir()?;
        let file_path = tmp_dir.path().join("credentials");
        write_file(
            &file_path,
            &[
                "[default]",
                "aws_access_key_id = DEFAULTACCESSKEYID",
                "aws_secret_access_key = DEFAULTSECRETACCESSKEY",
                "aws_session_token = DEFAULTSESSIONTOKEN",
                "",
                "[profile1]",
                "aws_access_key_id = PROFILE1ACCESSKEYID",
                "aws_secret_access_key = PROFILE1SECRETACCESSKEY",
            ],
        )?;
        let path = file_path.to_string_lossy().to_string();

        let ctx = ctx_with(vec![
            (AWS_SHARED_CREDENTIALS_FILE, path.clone()),
            (AWS_CONFIG_FILE, "/not/exist".to_string()),
        ]);
        let cred = ProfileCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must exist");
        assert_eq!(cred.access_key_id, "DEFAULTACCESSKEYID");
        assert_eq!(cred.session_token.as_deref(), Some("DEFAULTSESSIONTOKEN"));

        let ctx = ctx_with(vec![
            (AWS_SHARED_CREDENTIALS_FILE, path),
            (AWS_CONFIG_FILE, "/not/exist".to_string()),
            (AWS_PROFILE, "profile1".to_string()),
        ]);
        let cred = ProfileCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must exist");
        assert_eq!(cred.access_key_id, "PROFILE1ACCESSKEYID");
        assert!(cred.session_token.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_profile_from_config_file() -> anyhow::Result<()> {
        let tmp_dir = tempdir()?;
        let file_path = tmp_dir.path().join("config");
        write_file(
            &file_path,
            &[
                "[profile dev]",
                "region = eu-west-1",
                "aws_access_key_id = DEVACCESSKEYID",
                "aws_secret_access_key = DEVSECRETACCESSKEY",
            ],
        )?;

        let ctx = ctx_with(vec![(AWS_SHARED_CREDENTIALS_FILE, "/not/exist".to_string())]);
        let cred = ProfileCredentialProvider::new()
            .with_profile("dev")
            .with_config_file(file_path.to_string_lossy())
            .provide_credential(&ctx)
            .await?
            .expect("credential must exist");
        assert_eq!(cred.access_key_id, "DEVACCESSKEYID");
        assert_eq!(cred.secret_access_key, "DEVSECRETACCESSKEY");

        Ok(())
    }

    #[tokio::test]
    async fn test_profile_missing_files() -> anyhow::Result<()> {
        let ctx = ctx_with(vec![
            (AWS_SHARED_CREDENTIALS_FILE, "/not/exist".to_string()),
            (AWS_CONFIG_FILE, "/not/exist/either".to_string()),
        ]);

        let cred = ProfileCredentialProvider::new()
            .provide_credential(&ctx)
            .await?;
        assert!(cred.is_none());

        Ok(())
    }

    #[test]
    fn test_config_section_name() {
        assert_eq!(config_section_name("default"), "default");
        assert_eq!(config_section_name("dev"), "profile dev");
    }
}
