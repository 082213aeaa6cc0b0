// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shard supervision.
//!
//! A supervision cycle lists the shards of the stream, starts one reader per
//! shard in a fresh [`ReaderGroup`], then waits for whichever comes first:
//!
//! - the session token is cancelled: the group is cancelled and drained,
//!   the cycle ends with [`CycleOutcome::Cancelled`];
//! - every reader returned cleanly: the stream was resharded (or every shard
//!   closed), the cycle ends with [`CycleOutcome::Resharded`] and the next
//!   cycle lists the shards again;
//! - a reader failed: its siblings are cancelled and drained, the error is
//!   returned and no further cycle runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::KinesisClient;
use crate::config::Timings;
use crate::error::AcquisitionError;
use crate::group::ReaderGroup;
use crate::reader::polling::PollingReader;
use crate::reader::subscription::SubscriptionReader;
use crate::reader::RecordEmitter;

/// How shard readers obtain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadProtocol {
    /// `GetShardIterator` + `GetRecords`.
    Polling,
    /// `SubscribeToShard` through a registered consumer.
    Subscription { consumer_arn: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Resharded,
    Cancelled,
}

enum Woken {
    Cancelled,
    Dying(Result<(), AcquisitionError>),
}

pub struct ShardSupervisor {
    client: Arc<dyn KinesisClient>,
    stream_name: String,
    protocol: ReadProtocol,
    timings: Timings,
    emitter: RecordEmitter,
}

impl ShardSupervisor {
    pub fn new(
        client: Arc<dyn KinesisClient>,
        stream_name: impl Into<String>,
        protocol: ReadProtocol,
        timings: Timings,
        emitter: RecordEmitter,
    ) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
            protocol,
            timings,
            emitter,
        }
    }

    /// Runs supervision cycles until `cancel` fires or a reader fails.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), AcquisitionError> {
        loop {
            match self.run_cycle(cancel).await? {
                CycleOutcome::Resharded => {
                    info!("All shards have been closed, probably a resharding event, restarting acquisition");
                }
                CycleOutcome::Cancelled => return Ok(()),
            }
        }
    }

    /// Runs a single supervision cycle.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, AcquisitionError> {
        let listed = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(CycleOutcome::Cancelled),
            res = self.client.list_shards(&self.stream_name) => res,
        };
        let shards = listed.map_err(AcquisitionError::ListShards)?;

        if shards.is_empty() {
            // Nothing to read: wait one interval before listing again
            // rather than spinning on the API.
            warn!("No shard found in stream {}", self.stream_name);
            return Ok(tokio::select! {
                biased;
                () = cancel.cancelled() => CycleOutcome::Cancelled,
                () = tokio::time::sleep(self.timings.read_interval) => CycleOutcome::Resharded,
            });
        }

        debug!("Starting {} shard readers", shards.len());
        let mut group = ReaderGroup::new(self.stream_name.clone(), cancel);
        for shard_id in shards {
            let span = info_span!("shard_reader", shard_id = %shard_id);
            match &self.protocol {
                ReadProtocol::Polling => {
                    let reader = PollingReader {
                        client: Arc::clone(&self.client),
                        stream_name: self.stream_name.clone(),
                        shard_id,
                        read_interval: self.timings.read_interval,
                        emitter: self.emitter.clone(),
                        token: group.token(),
                    };
                    group.spawn(reader.run().instrument(span));
                }
                ReadProtocol::Subscription { consumer_arn } => {
                    let reader = SubscriptionReader {
                        client: Arc::clone(&self.client),
                        consumer_arn: consumer_arn.clone(),
                        shard_id,
                        subscribe_grace: self.timings.subscribe_grace,
                        emitter: self.emitter.clone(),
                        token: group.token(),
                    };
                    group.spawn(reader.run().instrument(span));
                }
            }
        }

        let woken = tokio::select! {
            biased;
            () = cancel.cancelled() => Woken::Cancelled,
            res = group.dying() => Woken::Dying(res),
        };

        match woken {
            Woken::Cancelled => {
                info!("Kinesis source is dying");
                group.cancel();
                // the group is being torn down on purpose, reader errors no longer matter
                if let Err(err) = group.wait().await {
                    debug!("Shard reader error during shutdown: {err}");
                }
                Ok(CycleOutcome::Cancelled)
            }
            Woken::Dying(Ok(())) => {
                debug!("All reader tasks have exited, resharding event or periodic resubscribe");
                Ok(CycleOutcome::Resharded)
            }
            Woken::Dying(Err(err)) => {
                error!("Unexpected error from shard reader: {err}");
                if let Err(other) = group.wait().await {
                    debug!("Shard reader error while draining the group: {other}");
                }
                Err(err)
            }
        }
    }
}
