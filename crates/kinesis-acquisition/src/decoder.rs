// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns raw Kinesis records into log lines.
//!
//! A record is either a single log line, or, when the stream is fed by a
//! CloudWatch Logs subscription filter, a gzip'd JSON envelope carrying a
//! batch of log events:
//!
//! ```json
//! {
//!   "messageType": "DATA_MESSAGE",
//!   "owner": "123456789012",
//!   "logGroup": "/aws/lambda/auth",
//!   "logStream": "2024/01/01/[$LATEST]abcdef",
//!   "subscriptionFilters": ["to-kinesis"],
//!   "logEvents": [{"id": "1", "message": "...", "timestamp": 1704067200000}]
//! }
//! ```
//!
//! Everything happens on in-memory buffers.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::debug;

use crate::error::DecodeError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEnvelope {
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    #[serde(default)]
    pub log_events: Vec<SubscriptionLogEvent>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubscriptionLogEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Decompresses and parses a CloudWatch subscription envelope.
pub fn decode_envelope(data: &[u8]) -> Result<SubscriptionEnvelope, DecodeError> {
    let mut decompressed = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut decompressed)
        .map_err(DecodeError::Decompress)?;

    Ok(serde_json::from_slice(&decompressed)?)
}

/// Returns the log lines carried by one record, in order.
pub fn decode_record(data: &[u8], from_subscription: bool) -> Result<Vec<String>, DecodeError> {
    if !from_subscription {
        let line = String::from_utf8_lossy(data);
        if let Cow::Owned(_) = line {
            debug!("Record is not valid UTF-8, invalid bytes were replaced");
        }
        return Ok(vec![line.into_owned()]);
    }

    let envelope = decode_envelope(data)?;
    Ok(envelope
        .log_events
        .into_iter()
        .map(|event| event.message)
        .collect())
}
