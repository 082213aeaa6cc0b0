// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point used by the host's acquisition framework.
//!
//! ```text
//! configure(yaml) -> run(sink, cancel) -> JoinHandle<Result<..>>
//! ```
//!
//! `run` does not block: it spawns the [`StreamSession`] on the current
//! tokio runtime and hands back its handle.

use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::client::{ClientFactory, KinesisClient};
use crate::config::{AcquisitionMode, KinesisConfig};
use crate::error::AcquisitionError;
use crate::event::{LineEvent, MODULE_NAME};
use crate::metrics::AcquisitionMetrics;
use crate::reader::RecordEmitter;
use crate::session::StreamSession;

struct Configured {
    config: Arc<KinesisConfig>,
    client: Arc<dyn KinesisClient>,
    metrics: AcquisitionMetrics,
}

pub struct KinesisSource {
    factory: Arc<dyn ClientFactory>,
    configured: Option<Configured>,
}

impl KinesisSource {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            configured: None,
        }
    }

    /// Validates `yaml` and builds the transport client.
    ///
    /// Calling it again replaces the previous configuration.
    pub fn configure(&mut self, yaml: &[u8]) -> Result<(), AcquisitionError> {
        let config = KinesisConfig::from_yaml(yaml)?;
        debug!("kinesis datasource configured for stream {}", config.stream.stream_name());

        let client = self.factory.new_client(&config.client)?;
        let metrics = AcquisitionMetrics::new(config.metrics_level)?;
        self.configured = Some(Configured {
            config: Arc::new(config),
            client,
            metrics,
        });
        Ok(())
    }

    pub fn configure_by_dsn(&mut self, _dsn: &str) -> Result<(), AcquisitionError> {
        Err(AcquisitionError::Unsupported("command-line acquisition"))
    }

    pub fn one_shot(
        &self,
        _sink: Sender<LineEvent>,
        _cancel: CancellationToken,
    ) -> Result<(), AcquisitionError> {
        Err(AcquisitionError::Unsupported("one-shot acquisition"))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        MODULE_NAME
    }

    /// Configured mode, `tail` until configured.
    #[must_use]
    pub fn mode(&self) -> AcquisitionMode {
        self.configured
            .as_ref()
            .map_or(AcquisitionMode::Tail, |c| c.config.mode)
    }

    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.configured
            .as_ref()
            .map_or("", |c| c.config.unique_id.as_str())
    }

    pub fn can_run(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> Option<&KinesisConfig> {
        self.configured.as_ref().map(|c| c.config.as_ref())
    }

    /// Counters shared with the running readers, once configured.
    #[must_use]
    pub fn metrics(&self) -> Option<&AcquisitionMetrics> {
        self.configured.as_ref().map(|c| &c.metrics)
    }

    /// Starts streaming acquisition in the background.
    ///
    /// The handle resolves once `cancel` fires (`Ok`) or a fatal error
    /// stopped the session. Must be called from within a tokio runtime.
    pub fn run(
        &self,
        sink: Sender<LineEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<Result<(), AcquisitionError>>, AcquisitionError> {
        let Some(configured) = self.configured.as_ref() else {
            return Err(AcquisitionError::NotConfigured);
        };
        if configured.config.mode == AcquisitionMode::Cat {
            return Err(AcquisitionError::Unsupported("one-shot acquisition"));
        }

        let emitter = RecordEmitter::new(&configured.config, sink, configured.metrics.clone());
        let session = StreamSession::new(
            Arc::clone(&configured.config),
            Arc::clone(&configured.client),
            emitter,
        );
        let span = info_span!(
            "kinesis",
            stream = %configured.config.stream.stream_name(),
            fanout = configured.config.use_enhanced_fanout,
        );

        Ok(tokio::spawn(session.run(cancel).instrument(span)))
    }
}
