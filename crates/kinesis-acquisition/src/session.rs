// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::KinesisClient;
use crate::config::{KinesisConfig, StreamIdentity};
use crate::consumer::{ConsumerManager, RetryBudget};
use crate::error::{AcquisitionError, ConfigError};
use crate::reader::RecordEmitter;
use crate::supervisor::{ReadProtocol, ShardSupervisor};

/// One acquisition run over a validated configuration.
///
/// Polling mode loops supervision cycles until cancellation or a fatal
/// error. Fan-out mode wraps the same loop between a consumer clean-up and
/// registration, and removes the consumer again on cancellation.
pub struct StreamSession {
    config: Arc<KinesisConfig>,
    client: Arc<dyn KinesisClient>,
    emitter: RecordEmitter,
}

impl StreamSession {
    pub fn new(
        config: Arc<KinesisConfig>,
        client: Arc<dyn KinesisClient>,
        emitter: RecordEmitter,
    ) -> Self {
        Self {
            config,
            client,
            emitter,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), AcquisitionError> {
        if self.config.use_enhanced_fanout {
            self.enhanced_read(&cancel).await
        } else {
            self.read_from_stream(&cancel).await
        }
    }

    fn supervisor(&self, protocol: ReadProtocol) -> ShardSupervisor {
        ShardSupervisor::new(
            Arc::clone(&self.client),
            self.config.stream.stream_name(),
            protocol,
            self.config.timings,
            self.emitter.clone(),
        )
    }

    async fn read_from_stream(&self, cancel: &CancellationToken) -> Result<(), AcquisitionError> {
        info!("starting kinesis acquisition from shards");
        self.supervisor(ReadProtocol::Polling).run(cancel).await
    }

    async fn enhanced_read(&self, cancel: &CancellationToken) -> Result<(), AcquisitionError> {
        let StreamIdentity::Arn { arn, .. } = &self.config.stream else {
            return Err(ConfigError::MissingStreamArn.into());
        };
        let Some(consumer_name) = self.config.consumer_name.as_deref() else {
            return Err(ConfigError::MissingConsumerName.into());
        };

        info!("starting kinesis acquisition with enhanced fan-out");

        let manager = ConsumerManager::new(
            Arc::clone(&self.client),
            consumer_name,
            arn.as_str(),
            RetryBudget::new(self.config.max_retries, self.config.timings.retry_backoff),
        );

        let startup = async {
            manager.ensure_clean().await?;
            manager.register().await
        };
        let consumer = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Cancelled while setting up consumer {consumer_name}");
                return manager.ensure_clean().await;
            }
            res = startup => res?,
        };

        self.supervisor(ReadProtocol::Subscription {
            consumer_arn: consumer.consumer_arn,
        })
        .run(cancel)
        .await?;

        manager.ensure_clean().await
    }
}
