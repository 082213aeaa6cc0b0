// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use flate2::{write::GzEncoder, Compression};
use kinesis_acquisition::{KinesisSource, LineEvent};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

use super::mocks::{factory, MockKinesisClient};

pub const STREAM_ARN: &str = "arn:aws:kinesis:us-east-1:123456789012:stream/s2";

/// Builds a configured source backed by `client`.
pub fn configured_source(client: &Arc<MockKinesisClient>, yaml: &str) -> KinesisSource {
    let mut source = KinesisSource::new(factory(Arc::clone(client)));
    source
        .configure(yaml.as_bytes())
        .expect("valid configuration");
    source
}

/// Receives exactly `count` events, failing if they do not all show up
/// within a minute of (virtual) time.
pub async fn receive(rx: &mut Receiver<LineEvent>, count: usize) -> Vec<LineEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let event = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("event within timeout")
            .expect("sink still open");
        events.push(event);
    }
    events
}

/// Gzip'd CloudWatch subscription payload carrying `messages`.
pub fn subscription_envelope(messages: &[&str]) -> Vec<u8> {
    let log_events: Vec<serde_json::Value> = messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            serde_json::json!({
                "id": i.to_string(),
                "timestamp": 1_700_000_000_000_i64 + i as i64,
                "message": message,
            })
        })
        .collect();
    let payload = serde_json::json!({
        "messageType": "DATA_MESSAGE",
        "owner": "123456789012",
        "logGroup": "/aws/lambda/app",
        "logStream": "2024/01/01/[$LATEST]abcdef",
        "subscriptionFilters": ["to-kinesis"],
        "logEvents": log_events,
    });

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload.to_string().as_bytes())
        .expect("gzip write");
    encoder.finish().expect("gzip finish")
}
