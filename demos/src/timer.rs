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

//! Wall-clock checkpoints shared between concurrent tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A named checkpoint in a demo run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    /// The invoking task started.
    StartMain,
    /// The invoking task finished.
    EndMain,
    /// The streaming call was issued.
    StartLambdaExecute,
    /// The streaming call returned its response head.
    EndLambdaExecute,
    /// The upload was issued.
    StartUpload,
    /// The upload completed.
    EndUpload,
    /// The first content block arrived.
    StartReceiveData,
    /// The event stream ended.
    EndReceiveData,
}

/// `Total` first, then the sub-spans indented under it.
const SPANS: [(&str, Note, Note); 8] = [
    ("Total", Note::StartMain, Note::EndMain),
    ("Session init", Note::StartMain, Note::StartLambdaExecute),
    (
        "Lambda execute to first data",
        Note::StartLambdaExecute,
        Note::StartReceiveData,
    ),
    (
        "Lambda execute to last data",
        Note::StartLambdaExecute,
        Note::EndReceiveData,
    ),
    (
        "Lambda execute",
        Note::StartLambdaExecute,
        Note::EndLambdaExecute,
    ),
    ("Upload", Note::StartUpload, Note::EndUpload),
    (
        "Upload to first data",
        Note::StartUpload,
        Note::StartReceiveData,
    ),
    (
        "Upload to last data",
        Note::StartUpload,
        Note::EndReceiveData,
    ),
];

const SUB_SPAN_INDENT: &str = "    ";

/// Checkpoints recorded by any number of tasks.
///
/// Only the first recording of a note counts.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    inner: Arc<Mutex<HashMap<Note, Instant>>>,
}

impl Timers {
    /// Create an empty set of checkpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `note` now. Returns false if it was already recorded.
    pub fn record(&self, note: Note) -> bool {
        self.record_at(note, Instant::now())
    }

    /// Record `note` at `at`. Returns false if it was already recorded.
    pub fn record_at(&self, note: Note, at: Instant) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.contains_key(&note) {
            return false;
        }
        inner.insert(note, at);
        true
    }

    /// When `note` was recorded.
    pub fn get(&self, note: Note) -> Option<Instant> {
        self.inner.lock().expect("lock poisoned").get(&note).copied()
    }

    /// Time between two checkpoints, if both were recorded.
    ///
    /// Saturates to zero when `to` precedes `from`.
    pub fn elapsed(&self, from: Note, to: Note) -> Option<Duration> {
        let inner = self.inner.lock().expect("lock poisoned");
        let (from, to) = (inner.get(&from)?, inner.get(&to)?);
        Some(to.saturating_duration_since(*from))
    }

    /// Report lines of the form `<label>: <secs> sec`.
    pub fn report(&self) -> Vec<String> {
        SPANS
            .iter()
            .enumerate()
            .filter_map(|(idx, (label, from, to))| {
                let indent = if idx == 0 { "" } else { SUB_SPAN_INDENT };
                self.elapsed(*from, *to)
                    .map(|d| format!("{indent}{label}: {:.2} sec", d.as_secs_f64()))
            })
            .collect()
    }
}
