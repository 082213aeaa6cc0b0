// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kinesis data source for a log acquisition pipeline.
//!
//! Reads every shard of a stream, either by polling (`GetRecords`) or through
//! an enhanced fan-out consumer (`SubscribeToShard`), and pushes one
//! [`LineEvent`] per log line to the host's sink. Resharding is handled by
//! relisting the shards once every reader of the current cohort has exited
//! cleanly.
//!
//! The transport is provided by the host through [`ClientFactory`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod config;
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod event;
pub mod group;
pub mod metrics;
pub mod reader;
pub mod session;
pub mod source;
pub mod supervisor;

pub use client::{
    ClientFactory, ConsumerLookup, ConsumerStatus, GetRecordsOutput, KinesisClient, Record,
    RegisteredConsumer, ShardSubscription, StartingPosition, SubscriptionEvent,
};
pub use config::{AcquisitionMode, ClientOptions, KinesisConfig, StreamIdentity, Timings};
pub use consumer::{ConsumerDescriptor, ConsumerManager, RetryBudget};
pub use error::{AcquisitionError, ClientError, ConfigError, DecodeError};
pub use event::LineEvent;
pub use metrics::{AcquisitionMetrics, MetricsLevel};
pub use source::KinesisSource;
pub use supervisor::{CycleOutcome, ReadProtocol, ShardSupervisor};
