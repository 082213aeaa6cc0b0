// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{KinesisClient, ShardSubscription, StartingPosition, SubscriptionEvent};
use crate::error::AcquisitionError;
use crate::reader::{Delivery, RecordEmitter};

/// Push reader for one shard, through an enhanced fan-out consumer.
pub struct SubscriptionReader {
    pub client: Arc<dyn KinesisClient>,
    pub consumer_arn: String,
    pub shard_id: String,
    /// Pause between subscribing and reading events.
    pub subscribe_grace: Duration,
    pub emitter: RecordEmitter,
    pub token: CancellationToken,
}

impl SubscriptionReader {
    pub async fn run(self) -> Result<(), AcquisitionError> {
        let subscribed = tokio::select! {
            biased;
            () = self.token.cancelled() => return Ok(()),
            res = self.client.subscribe_to_shard(
                &self.consumer_arn,
                &self.shard_id,
                StartingPosition::Latest,
            ) => res,
        };
        let mut subscription = subscribed.map_err(AcquisitionError::Subscribe)?;
        debug!("Subscribed to shard");

        // Subscribing to an already closed shard succeeds and the event
        // stream ends right away. Without this pause every reader of a
        // freshly resharded stream could exit before a live one starts.
        tokio::select! {
            biased;
            () = self.token.cancelled() => return Self::close(subscription.as_mut()).await,
            () = tokio::time::sleep(self.subscribe_grace) => {}
        }

        loop {
            let event = tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    return Self::close(subscription.as_mut()).await;
                }
                event = subscription.next_event() => event,
            };

            match event {
                None => {
                    info!("Event stream has been closed");
                    return Ok(());
                }
                Some(SubscriptionEvent::Records(records)) => {
                    match self.emitter.emit(&self.shard_id, records, &self.token).await {
                        Ok(Delivery::Delivered) => {}
                        Ok(Delivery::Cancelled) => {
                            return Self::close(subscription.as_mut()).await;
                        }
                        Err(err) => {
                            if let Err(close_err) = Self::close(subscription.as_mut()).await {
                                warn!("{close_err}");
                            }
                            return Err(err);
                        }
                    }
                }
                Some(SubscriptionEvent::Unknown(kind)) => {
                    info!("got an unknown event ({kind}), ignoring it");
                }
            }
        }
    }

    async fn close(subscription: &mut dyn ShardSubscription) -> Result<(), AcquisitionError> {
        info!("Subscribed shard reader is dying");
        subscription
            .close()
            .await
            .map_err(AcquisitionError::CloseSubscription)
    }
}
