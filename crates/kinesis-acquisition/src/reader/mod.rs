// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-shard readers.
//!
//! One reader runs per shard, under the group of the current supervision
//! cycle. Two protocols exist:
//!
//! - [`polling::PollingReader`]: `GetRecords` against a shard iterator, one
//!   call per read interval.
//! - [`subscription::SubscriptionReader`]: `SubscribeToShard` through an
//!   enhanced fan-out consumer, records are pushed by the provider.
//!
//! Both exit cleanly when the shard is closed (the resharding signal) or when
//! their group is cancelled, and return an error for anything fatal. Both
//! hand records to the shared [`RecordEmitter`].

pub mod polling;
pub mod subscription;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::client::Record;
use crate::config::KinesisConfig;
use crate::decoder::decode_record;
use crate::error::AcquisitionError;
use crate::event::LineEvent;
use crate::metrics::AcquisitionMetrics;

/// Result of handing a batch to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The group was cancelled while the sink was applying backpressure.
    Cancelled,
}

/// Decodes records and pushes the resulting lines to the sink.
///
/// Cloned into every reader; all clones share the sink and the counters.
#[derive(Clone)]
pub struct RecordEmitter {
    sink: Sender<LineEvent>,
    metrics: AcquisitionMetrics,
    stream_name: String,
    source: String,
    labels: Arc<HashMap<String, String>>,
    acquis_type: String,
    from_subscription: bool,
    use_time_machine: bool,
}

impl RecordEmitter {
    #[must_use]
    pub fn new(config: &KinesisConfig, sink: Sender<LineEvent>, metrics: AcquisitionMetrics) -> Self {
        Self {
            sink,
            metrics,
            stream_name: config.stream.stream_name().to_string(),
            source: config.stream.source_label().to_string(),
            labels: Arc::new(config.labels.clone()),
            acquis_type: config.labels.get("type").cloned().unwrap_or_default(),
            from_subscription: config.from_subscription,
            use_time_machine: config.use_time_machine,
        }
    }

    /// Pushes the lines of `records` in order.
    ///
    /// A record that cannot be decoded is logged and skipped. Waiting on a
    /// full sink races `token`, so a cancelled reader never stays stuck on
    /// backpressure.
    pub async fn emit(
        &self,
        shard_id: &str,
        records: Vec<Record>,
        token: &CancellationToken,
    ) -> Result<Delivery, AcquisitionError> {
        for record in records {
            self.metrics
                .record_read(&self.stream_name, shard_id, &self.acquis_type);

            let lines = match decode_record(&record.data, self.from_subscription) {
                Ok(lines) => lines,
                Err(err) => {
                    error!("Cannot decode data: {err}");
                    continue;
                }
            };

            for line in lines {
                trace!("got record {line}");
                let event = LineEvent::new(line, &self.source, &self.labels, self.use_time_machine);

                tokio::select! {
                    biased;
                    () = token.cancelled() => return Ok(Delivery::Cancelled),
                    sent = self.sink.send(event) => {
                        sent.map_err(|_| AcquisitionError::SinkClosed)?;
                    }
                }
            }
        }

        Ok(Delivery::Delivered)
    }
}
