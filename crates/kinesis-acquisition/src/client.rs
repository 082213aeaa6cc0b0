// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport seam towards the Kinesis API.
//!
//! The crate never talks to the wire itself: the host provides a
//! [`ClientFactory`] building a [`KinesisClient`], and every call the readers
//! and the consumer manager make goes through that trait. Implementations are
//! expected to be stateless per call so a single client can be shared by all
//! shard readers behind an `Arc`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientOptions;
use crate::error::ClientError;

/// One data record as returned by `GetRecords` or pushed by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub data: Vec<u8>,
    pub partition_key: String,
    pub sequence_number: String,
}

impl Record {
    /// Record with only a payload, used by tests and simple transports.
    #[must_use]
    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            partition_key: String::new(),
            sequence_number: String::new(),
        }
    }
}

/// Where a new iterator or subscription starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartingPosition {
    /// Just after the most recent record of the shard.
    Latest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRecordsOutput {
    pub records: Vec<Record>,
    /// `None` once the shard has been closed and fully read.
    pub next_shard_iterator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerStatus {
    Creating,
    Deleting,
    Active,
}

impl std::fmt::Display for ConsumerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Deleting => write!(f, "DELETING"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

/// Handle returned by `RegisterStreamConsumer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredConsumer {
    pub consumer_name: String,
    pub consumer_arn: String,
    pub status: ConsumerStatus,
}

/// How to address a consumer in `DescribeStreamConsumer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerLookup {
    ByName {
        consumer_name: String,
        stream_arn: String,
    },
    ByArn(String),
}

/// Item yielded by a shard subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Records(Vec<Record>),
    /// Event type the transport does not know how to interpret.
    Unknown(String),
}

/// Live push channel for one shard, obtained with `SubscribeToShard`.
#[async_trait]
pub trait ShardSubscription: Send {
    /// Next event, or `None` once the provider closed the stream.
    async fn next_event(&mut self) -> Option<SubscriptionEvent>;

    /// Releases the subscription.
    async fn close(&mut self) -> Result<(), ClientError>;
}

#[async_trait]
pub trait KinesisClient: Send + Sync {
    async fn list_shards(&self, stream_name: &str) -> Result<Vec<String>, ClientError>;

    async fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        position: StartingPosition,
    ) -> Result<String, ClientError>;

    async fn get_records(&self, shard_iterator: &str) -> Result<GetRecordsOutput, ClientError>;

    async fn register_stream_consumer(
        &self,
        consumer_name: &str,
        stream_arn: &str,
    ) -> Result<RegisteredConsumer, ClientError>;

    async fn deregister_stream_consumer(
        &self,
        consumer_name: &str,
        stream_arn: &str,
    ) -> Result<(), ClientError>;

    async fn describe_stream_consumer(
        &self,
        lookup: ConsumerLookup,
    ) -> Result<ConsumerStatus, ClientError>;

    async fn subscribe_to_shard(
        &self,
        consumer_arn: &str,
        shard_id: &str,
        position: StartingPosition,
    ) -> Result<Box<dyn ShardSubscription>, ClientError>;
}

/// Builds the transport from the configured region / endpoint / profile.
///
/// Session and credential resolution live behind this trait.
pub trait ClientFactory: Send + Sync {
    fn new_client(&self, options: &ClientOptions) -> Result<Arc<dyn KinesisClient>, ClientError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ClientOptions) -> Result<Arc<dyn KinesisClient>, ClientError> + Send + Sync,
{
    fn new_client(&self, options: &ClientOptions) -> Result<Arc<dyn KinesisClient>, ClientError> {
        self(options)
    }
}
