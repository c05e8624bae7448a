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

//! Just enough of `bedrock-runtime` to stream a chat completion.

use std::io::Write;

use anyhow::Result;
use futures::{Stream, StreamExt};
use http::Method;
use log::debug;
use rescope::event_stream::Message;
use rescope::runtime::Operation;
use serde::{Deserialize, Serialize};

use crate::timer::{Note, Timers};

/// Name of the streaming invocation operation.
pub const INVOKE_MODEL_WITH_RESPONSE_STREAM: &str = "InvokeModelWithResponseStream";
/// Model the demos talk to.
pub const MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";
/// Prompt the demos send.
pub const PROMPT: &str = "Hello, Claude.";
/// Prefix that tells the backend to wait for the uploaded prompt.
pub const DELAY_UPLOAD_PREFIX: &str = "delay-upload::";

/// Request body of an Anthropic messages call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeBody {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Object the backend reads the real prompt from.
    #[serde(
        rename = "objectKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub object_key: Option<String>,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl InvokeBody {
    /// A single user turn with the demo defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            anthropic_version: "bedrock-2023-05-31".to_string(),
            max_tokens: 100,
            system: "You are friendly AI".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            object_key: None,
        }
    }

    /// Point the backend at an uploaded prompt.
    pub fn with_object_key(mut self, key: impl Into<String>) -> Self {
        self.object_key = Some(key.into());
        self
    }
}

/// Build an `InvokeModelWithResponseStream` call.
pub fn invoke_model_with_response_stream(model_id: &str, body: &InvokeBody) -> Result<Operation> {
    let body = serde_json::to_vec(body)?;
    Ok(Operation::new(
        INVOKE_MODEL_WITH_RESPONSE_STREAM,
        Method::POST,
        format!("/model/{model_id}/invoke-with-response-stream"),
    )
    .with_header("content-type", "application/json")
    .with_header("x-amzn-bedrock-accept", "*/*")
    .with_body(body)
    .with_stream_output(true))
}

/// A decoded `chunk` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkEvent {
    ContentBlockStart {
        #[serde(default)]
        index: u32,
    },
    ContentBlockDelta {
        delta: Delta,
    },
    #[serde(other)]
    Other,
}

/// Incremental content inside a `content_block_delta`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Write the visible text of `events` to `out` as it arrives, and return it.
///
/// Records [`Note::StartReceiveData`] at the first content block and
/// [`Note::EndReceiveData`] once the stream ends.
pub async fn print_stream<S, W>(mut events: S, timers: &Timers, out: &mut W) -> Result<String>
where
    S: Stream<Item = rescope::Result<Message>> + Unpin,
    W: Write,
{
    let mut text = String::new();
    while let Some(msg) = events.next().await {
        let chunk = msg?.chunk()?;
        match serde_json::from_slice::<ChunkEvent>(&chunk)? {
            ChunkEvent::ContentBlockStart { index } => {
                debug!("content block {index} started");
                timers.record(Note::StartReceiveData);
            }
            ChunkEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text: t },
            } => {
                write!(out, "{t}")?;
                out.flush()?;
                text.push_str(&t);
            }
            _ => {}
        }
    }
    timers.record(Note::EndReceiveData);

    Ok(text)
}
