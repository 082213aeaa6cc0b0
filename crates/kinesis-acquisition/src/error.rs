// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while loading or validating a data source configuration.
///
/// These are fatal at configure time and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot parse kinesis datasource configuration: {0}")]
    Parse(String),

    #[error("stream_name is mandatory when use_enhanced_fanout is false")]
    MissingStreamName,

    #[error("stream_arn is mandatory when use_enhanced_fanout is true")]
    MissingStreamArn,

    #[error("consumer_name is mandatory when use_enhanced_fanout is true")]
    MissingConsumerName,

    #[error("stream_arn and stream_name are mutually exclusive")]
    ConflictingStreamIdentity,

    #[error("cannot parse stream ARN {0}")]
    InvalidArn(String),

    #[error("resource part of stream ARN {0} does not start with stream/")]
    NotAStreamArn(String),
}

/// Classification of a failed transport call.
///
/// The reader and the consumer manager only ever branch on the kind, the
/// message is carried for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("provisioned throughput exceeded: {0}")]
    ProvisionedThroughputExceeded(String),

    #[error("expired iterator: {0}")]
    ExpiredIterator(String),

    #[error("cannot create kinesis client: {0}")]
    Construction(String),

    #[error("{0}")]
    Transport(String),
}

impl ClientError {
    /// Errors the polling reader swallows until its next tick.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ProvisionedThroughputExceeded(_) | ClientError::ExpiredIterator(_)
        )
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::ResourceNotFound(_))
    }
}

/// Failure to recover log lines from a single record. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot decompress record: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("cannot unmarshal subscription envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// Errors surfaced by a running acquisition.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("kinesis datasource does not support {0}")]
    Unsupported(&'static str),

    #[error("kinesis datasource is not configured")]
    NotConfigured,

    #[error("cannot list shards: {0}")]
    ListShards(#[source] ClientError),

    #[error("cannot get shard iterator: {0}")]
    ShardIterator(#[source] ClientError),

    #[error("cannot get records: {0}")]
    GetRecords(#[source] ClientError),

    #[error("cannot subscribe to shard: {0}")]
    Subscribe(#[source] ClientError),

    #[error("cannot close kinesis subscribed shard reader: {0}")]
    CloseSubscription(#[source] ClientError),

    #[error("cannot register stream consumer: {0}")]
    RegisterConsumer(#[source] ClientError),

    #[error("cannot deregister stream consumer: {0}")]
    DeregisterConsumer(#[source] ClientError),

    #[error("cannot describe stream consumer: {0}")]
    DescribeConsumer(#[source] ClientError),

    #[error("consumer {consumer} is not {expected} after {attempts} tries")]
    ConvergenceTimeout {
        consumer: String,
        expected: &'static str,
        attempts: u32,
    },

    #[error("shard reader panicked: {0}")]
    ReaderPanicked(String),

    #[error("event sink has been closed")]
    SinkClosed,

    #[error("cannot create kinesis metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AcquisitionError::GetRecords(ClientError::Transport("boom".to_string()));
        assert_eq!(error.to_string(), "cannot get records: boom");

        let error = AcquisitionError::ConvergenceTimeout {
            consumer: "c1".to_string(),
            expected: "active",
            attempts: 10,
        };
        assert_eq!(error.to_string(), "consumer c1 is not active after 10 tries");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ClientError::ProvisionedThroughputExceeded("x".into()).is_retryable());
        assert!(ClientError::ExpiredIterator("x".into()).is_retryable());
        assert!(!ClientError::ResourceNotFound("x".into()).is_retryable());
        assert!(!ClientError::Transport("x".into()).is_retryable());

        assert!(ClientError::ResourceNotFound("x".into()).is_not_found());
        assert!(!ClientError::Transport("x".into()).is_not_found());
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::ConflictingStreamIdentity.to_string(),
            "stream_arn and stream_name are mutually exclusive"
        );
        let err: AcquisitionError = ConfigError::MissingConsumerName.into();
        assert_eq!(
            err.to_string(),
            "consumer_name is mandatory when use_enhanced_fanout is true"
        );
    }
}
