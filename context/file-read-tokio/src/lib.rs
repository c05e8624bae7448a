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

//! Tokio-based file reading for rescope.
//!
//! `TokioFileRead` implements [`FileRead`] with `tokio::fs`, which is what profile based
//! credential providers use to read `~/.aws/credentials` and `~/.aws/config`.
//!
//! ```no_run
//! use rescope_core::{Context, OsEnv};
//! use rescope_file_read_tokio::TokioFileRead;
//!
//! let ctx = Context::new().with_file_read(TokioFileRead).with_env(OsEnv);
//! ```

use async_trait::async_trait;
use rescope_core::{Error, FileRead, Result};

/// Tokio-based implementation of the `FileRead` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileRead;

#[async_trait]
impl FileRead for TokioFileRead {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::unexpected(format!("failed to read file {path}")).with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescope_core::{Context, ErrorKind};
    use std::io::Write;

    #[tokio::test]
    async fn test_read_through_context() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "[default]")?;
        let path = file.path().to_string_lossy().to_string();

        let ctx = Context::new().with_file_read(TokioFileRead);
        assert_eq!(ctx.file_read_as_string(&path).await?, "[default]\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = TokioFileRead
            .file_read("/definitely/not/here")
            .await
            .expect_err("missing file must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }
}
