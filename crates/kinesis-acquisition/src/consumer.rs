// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Enhanced fan-out consumer lifecycle.
//!
//! Consumers are never reused across runs: every session first removes any
//! consumer left behind under the configured name, then registers a fresh
//! one and waits for it to become active. Both waits poll
//! `DescribeStreamConsumer` with a linear backoff (attempt `i` sleeps
//! `base * i`) bounded by [`RetryBudget::max_attempts`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::client::{ConsumerLookup, ConsumerStatus, KinesisClient};
use crate::error::AcquisitionError;

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub base: Duration,
}

impl RetryBudget {
    #[must_use]
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, base }
    }

    /// Wait following the 1-indexed `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }
}

/// A consumer registered by this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerDescriptor {
    pub name: String,
    pub stream_arn: String,
    pub consumer_arn: String,
    pub status: ConsumerStatus,
}

pub struct ConsumerManager {
    client: Arc<dyn KinesisClient>,
    consumer_name: String,
    stream_arn: String,
    budget: RetryBudget,
}

impl ConsumerManager {
    pub fn new(
        client: Arc<dyn KinesisClient>,
        consumer_name: impl Into<String>,
        stream_arn: impl Into<String>,
        budget: RetryBudget,
    ) -> Self {
        Self {
            client,
            consumer_name: consumer_name.into(),
            stream_arn: stream_arn.into(),
            budget,
        }
    }

    /// Deregisters the consumer if it exists and waits until it is gone.
    ///
    /// A consumer that does not exist is not an error.
    pub async fn ensure_clean(&self) -> Result<(), AcquisitionError> {
        debug!("Deregistering consumer {} if it exists", self.consumer_name);

        match self
            .client
            .deregister_stream_consumer(&self.consumer_name, &self.stream_arn)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(AcquisitionError::DeregisterConsumer(err)),
        }

        self.wait_for_deregistration().await
    }

    async fn wait_for_deregistration(&self) -> Result<(), AcquisitionError> {
        for attempt in 1..=self.budget.max_attempts {
            let lookup = ConsumerLookup::ByName {
                consumer_name: self.consumer_name.clone(),
                stream_arn: self.stream_arn.clone(),
            };
            match self.client.describe_stream_consumer(lookup).await {
                Err(err) if err.is_not_found() => {
                    info!("Consumer {} deregistered", self.consumer_name);
                    return Ok(());
                }
                Err(err) => {
                    error!("Error while waiting for consumer deregistration: {err}");
                    return Err(AcquisitionError::DescribeConsumer(err));
                }
                Ok(status) => {
                    debug!(
                        "Waiting for consumer deregistration {attempt} (status {status})"
                    );
                }
            }
            tokio::time::sleep(self.budget.delay(attempt)).await;
        }

        Err(AcquisitionError::ConvergenceTimeout {
            consumer: self.consumer_name.clone(),
            expected: "deregistered",
            attempts: self.budget.max_attempts,
        })
    }

    /// Registers the consumer and waits until it is active.
    pub async fn register(&self) -> Result<ConsumerDescriptor, AcquisitionError> {
        debug!("Registering consumer {}", self.consumer_name);

        let registered = self
            .client
            .register_stream_consumer(&self.consumer_name, &self.stream_arn)
            .await
            .map_err(AcquisitionError::RegisterConsumer)?;

        self.wait_for_registration(&registered.consumer_arn).await?;
        info!("Consumer {} is active", registered.consumer_arn);

        Ok(ConsumerDescriptor {
            name: registered.consumer_name,
            stream_arn: self.stream_arn.clone(),
            consumer_arn: registered.consumer_arn,
            status: ConsumerStatus::Active,
        })
    }

    async fn wait_for_registration(&self, consumer_arn: &str) -> Result<(), AcquisitionError> {
        for attempt in 1..=self.budget.max_attempts {
            let status = self
                .client
                .describe_stream_consumer(ConsumerLookup::ByArn(consumer_arn.to_string()))
                .await
                .map_err(AcquisitionError::DescribeConsumer)?;

            if status == ConsumerStatus::Active {
                return Ok(());
            }

            tokio::time::sleep(self.budget.delay(attempt)).await;
            debug!("Waiting for consumer registration {attempt}");
        }

        Err(AcquisitionError::ConvergenceTimeout {
            consumer: consumer_arn.to_string(),
            expected: "active",
            attempts: self.budget.max_attempts,
        })
    }
}
