// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kinesis data source configuration.
//!
//! The configuration is handed over as raw YAML bytes by the host's
//! acquisition framework and loaded through `figment`:
//!
//! ```yaml
//! source: kinesis
//! stream_arn: arn:aws:kinesis:us-east-1:123456789012:stream/security-logs
//! use_enhanced_fanout: true
//! consumer_name: crowd-reader
//! from_subscription: true
//! labels:
//!   type: syslog
//! ```
//!
//! [`KinesisConfig::from_yaml`] validates the stream identity once and folds
//! it into a [`StreamIdentity`], which is the only form the rest of the crate
//! ever sees.

use std::collections::HashMap;
use std::time::Duration;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::metrics::MetricsLevel;

pub const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_READ_INTERVAL_MS: u64 = 1_000;
const DEFAULT_SUBSCRIBE_GRACE_MS: u64 = 1_000;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Acquisition mode requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Follow the stream until cancelled.
    #[default]
    Tail,
    /// Read once and stop. Not supported by this data source.
    Cat,
}

/// Which stream to read, resolved from `stream_name` / `stream_arn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamIdentity {
    Name(String),
    Arn {
        arn: String,
        /// Name segment of the ARN resource, used to list shards and label metrics.
        stream_name: String,
    },
}

impl StreamIdentity {
    /// Human readable stream name.
    #[must_use]
    pub fn stream_name(&self) -> &str {
        match self {
            StreamIdentity::Name(name) => name,
            StreamIdentity::Arn { stream_name, .. } => stream_name,
        }
    }

    #[must_use]
    pub fn arn(&self) -> Option<&str> {
        match self {
            StreamIdentity::Name(_) => None,
            StreamIdentity::Arn { arn, .. } => Some(arn),
        }
    }

    /// Value used as the `source` of emitted events: the ARN when one was
    /// configured, otherwise the stream name.
    #[must_use]
    pub fn source_label(&self) -> &str {
        match self {
            StreamIdentity::Name(name) => name,
            StreamIdentity::Arn { arn, .. } => arn,
        }
    }

    /// Parses a stream ARN and extracts the stream name from its
    /// `stream/<name>` resource.
    pub fn from_arn(arn: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[1].is_empty() || parts[2].is_empty()
        {
            return Err(ConfigError::InvalidArn(arn.to_string()));
        }

        let resource = parts[5];
        match resource.strip_prefix("stream/") {
            Some(stream_name) if !stream_name.is_empty() => Ok(StreamIdentity::Arn {
                arn: arn.to_string(),
                stream_name: stream_name.to_string(),
            }),
            _ => Err(ConfigError::NotAStreamArn(arn.to_string())),
        }
    }
}

/// Transport overrides passed to the host's client factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub profile: Option<String>,
}

/// Timing constants of the readers and of the consumer convergence waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Delay between two `GetRecords` calls on the same shard.
    pub read_interval: Duration,
    /// Pause after subscribing to a shard before reading its events.
    pub subscribe_grace: Duration,
    /// Base unit of the linear backoff used while waiting for a consumer
    /// to (de)register.
    pub retry_backoff: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            read_interval: Duration::from_millis(DEFAULT_READ_INTERVAL_MS),
            subscribe_grace: Duration::from_millis(DEFAULT_SUBSCRIBE_GRACE_MS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TimingsYaml {
    read_interval_ms: Option<u64>,
    subscribe_grace_ms: Option<u64>,
    retry_backoff_ms: Option<u64>,
}

/// Raw YAML document, mirrors the keys accepted by the data source.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct YamlConfig {
    // Keys shared by every data source
    mode: AcquisitionMode,
    labels: HashMap<String, String>,
    unique_id: String,
    name: Option<String>,
    // keys shared by every datasource, handled by the host
    #[allow(dead_code)]
    source: Option<String>,
    #[allow(dead_code)]
    log_level: Option<String>,
    #[allow(dead_code)]
    transform: Option<String>,
    use_time_machine: bool,
    metrics_level: MetricsLevel,

    stream_name: Option<String>,
    stream_arn: Option<String>,
    use_enhanced_fanout: bool,
    consumer_name: Option<String>,
    from_subscription: bool,
    max_retries: i64,
    aws_profile: Option<String>,
    aws_region: Option<String>,
    aws_endpoint: Option<String>,
    timings: TimingsYaml,
}

/// Validated configuration of the Kinesis data source.
#[derive(Debug, Clone)]
pub struct KinesisConfig {
    pub mode: AcquisitionMode,
    pub labels: HashMap<String, String>,
    pub unique_id: String,
    pub name: Option<String>,
    pub use_time_machine: bool,
    pub metrics_level: MetricsLevel,
    pub stream: StreamIdentity,
    pub use_enhanced_fanout: bool,
    /// Set iff `use_enhanced_fanout` is true.
    pub consumer_name: Option<String>,
    /// Records are gzip'd CloudWatch subscription envelopes.
    pub from_subscription: bool,
    pub max_retries: u32,
    pub client: ClientOptions,
    pub timings: Timings,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl KinesisConfig {
    /// Parses and validates a YAML configuration.
    pub fn from_yaml(yaml: &[u8]) -> Result<Self, ConfigError> {
        let text = std::str::from_utf8(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let raw: YamlConfig = Figment::new()
            .merge(Yaml::string(text))
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        Self::validate(raw)
    }

    fn validate(raw: YamlConfig) -> Result<Self, ConfigError> {
        let stream_name = non_empty(raw.stream_name);
        let stream_arn = non_empty(raw.stream_arn);
        let consumer_name = non_empty(raw.consumer_name);

        if stream_name.is_none() && !raw.use_enhanced_fanout {
            return Err(ConfigError::MissingStreamName);
        }
        if stream_arn.is_none() && raw.use_enhanced_fanout {
            return Err(ConfigError::MissingStreamArn);
        }
        if consumer_name.is_none() && raw.use_enhanced_fanout {
            return Err(ConfigError::MissingConsumerName);
        }

        let stream = match (stream_name, stream_arn) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingStreamIdentity),
            (Some(name), None) => StreamIdentity::Name(name),
            (None, Some(arn)) => StreamIdentity::from_arn(&arn)?,
            // unreachable given the checks above, kept total for the compiler
            (None, None) => return Err(ConfigError::MissingStreamName),
        };

        let max_retries = if raw.max_retries <= 0 {
            DEFAULT_MAX_RETRIES
        } else {
            u32::try_from(raw.max_retries).unwrap_or(u32::MAX)
        };

        let defaults = Timings::default();
        let timings = Timings {
            read_interval: raw
                .timings
                .read_interval_ms
                .map_or(defaults.read_interval, Duration::from_millis),
            subscribe_grace: raw
                .timings
                .subscribe_grace_ms
                .map_or(defaults.subscribe_grace, Duration::from_millis),
            retry_backoff: raw
                .timings
                .retry_backoff_ms
                .map_or(defaults.retry_backoff, Duration::from_millis),
        };

        Ok(Self {
            mode: raw.mode,
            labels: raw.labels,
            unique_id: raw.unique_id,
            name: raw.name,
            use_time_machine: raw.use_time_machine,
            metrics_level: raw.metrics_level,
            stream,
            use_enhanced_fanout: raw.use_enhanced_fanout,
            consumer_name: if raw.use_enhanced_fanout {
                consumer_name
            } else {
                None
            },
            from_subscription: raw.from_subscription,
            max_retries,
            client: ClientOptions {
                region: non_empty(raw.aws_region),
                endpoint: non_empty(raw.aws_endpoint),
                profile: raw.aws_profile,
            },
            timings,
        })
    }
}
