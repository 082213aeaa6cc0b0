// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{KinesisClient, StartingPosition};
use crate::error::AcquisitionError;
use crate::reader::{Delivery, RecordEmitter};

/// Pull reader for one shard.
///
/// Acquires a `LATEST` iterator, then issues one `GetRecords` per read
/// interval. Throttling and expired iterators are retried on the next tick,
/// any other read error is fatal. A missing next iterator means the shard
/// was closed: the reader returns `Ok(())`.
pub struct PollingReader {
    pub client: Arc<dyn KinesisClient>,
    pub stream_name: String,
    pub shard_id: String,
    pub read_interval: Duration,
    pub emitter: RecordEmitter,
    pub token: CancellationToken,
}

impl PollingReader {
    pub async fn run(self) -> Result<(), AcquisitionError> {
        debug!("Starting to read shard");

        let acquired = tokio::select! {
            biased;
            () = self.token.cancelled() => return Ok(()),
            res = self.client.get_shard_iterator(
                &self.stream_name,
                &self.shard_id,
                StartingPosition::Latest,
            ) => res,
        };
        let mut iterator = acquired.map_err(|err| {
            error!("Cannot get shard iterator: {err}");
            AcquisitionError::ShardIterator(err)
        })?;

        // Kinesis allows 5 GetRecords calls per second and per shard, shared
        // by every application reading it.
        let mut ticker = interval_at(Instant::now() + self.read_interval, self.read_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    info!("shard reader group is dying, exiting");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let read = tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    info!("shard reader group is dying, exiting");
                    return Ok(());
                }
                res = self.client.get_records(&iterator) => res,
            };

            let output = match read {
                Ok(output) => output,
                // TODO: back off exponentially on throughput exceeded rather
                // than waiting for the next tick
                Err(err) if err.is_retryable() => {
                    warn!("{err}");
                    continue;
                }
                Err(err) => {
                    error!("Cannot get records");
                    return Err(AcquisitionError::GetRecords(err));
                }
            };

            if self
                .emitter
                .emit(&self.shard_id, output.records, &self.token)
                .await?
                == Delivery::Cancelled
            {
                info!("shard reader group is dying, exiting");
                return Ok(());
            }

            match output.next_shard_iterator {
                Some(next) => iterator = next,
                None => {
                    warn!("Shard has been closed");
                    return Ok(());
                }
            }
        }
    }
}
