// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Module tag set on every emitted line.
pub const MODULE_NAME: &str = "kinesis";

/// A single log line handed to the detection pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LineEvent {
    /// Raw log line, untouched.
    pub raw: String,
    /// Stream ARN, or stream name when no ARN was configured.
    pub src: String,
    /// Ingestion time.
    pub time: DateTime<Utc>,
    pub labels: Arc<HashMap<String, String>>,
    pub module: &'static str,
    pub process: bool,
    pub use_time_machine: bool,
}

impl LineEvent {
    #[must_use]
    pub fn new(
        raw: String,
        src: &str,
        labels: &Arc<HashMap<String, String>>,
        use_time_machine: bool,
    ) -> Self {
        Self {
            raw,
            src: src.to_string(),
            time: Utc::now(),
            labels: Arc::clone(labels),
            module: MODULE_NAME,
            process: true,
            use_time_machine,
        }
    }
}
