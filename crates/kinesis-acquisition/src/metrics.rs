// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line counters exposed to the host.
//!
//! Two counter families are maintained, both incremented once per raw record
//! read from a shard (before any envelope decoding):
//!
//! - `kinesis_lines_read_total{stream, datasource_type, acquis_type}`
//! - `kinesis_lines_read_shards_total{stream, shard}`
//!
//! Each source owns its own [`Registry`]; the host scrapes it through
//! [`AcquisitionMetrics::registry`].

use prometheus::{IntCounterVec, Opts, Registry};
use serde::Deserialize;

pub const DATASOURCE_TYPE: &str = "kinesis";

/// How much of the counters the host asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricsLevel {
    None,
    Aggregated,
    #[default]
    Full,
}

/// Cheaply cloneable handle on the counters, shared by every reader.
#[derive(Clone)]
pub struct AcquisitionMetrics {
    level: MetricsLevel,
    registry: Registry,
    lines_read: IntCounterVec,
    lines_read_shards: IntCounterVec,
}

impl AcquisitionMetrics {
    /// Creates both counter families and registers them, unless `level` is
    /// [`MetricsLevel::None`] in which case the registry stays empty.
    pub fn new(level: MetricsLevel) -> Result<Self, prometheus::Error> {
        let lines_read = IntCounterVec::new(
            Opts::new("kinesis_lines_read_total", "Total lines read from kinesis streams"),
            &["stream", "datasource_type", "acquis_type"],
        )?;
        let lines_read_shards = IntCounterVec::new(
            Opts::new(
                "kinesis_lines_read_shards_total",
                "Total lines read per kinesis shard",
            ),
            &["stream", "shard"],
        )?;

        let registry = Registry::new();
        if level != MetricsLevel::None {
            registry.register(Box::new(lines_read.clone()))?;
            registry.register(Box::new(lines_read_shards.clone()))?;
        }

        Ok(Self {
            level,
            registry,
            lines_read,
            lines_read_shards,
        })
    }

    /// Registry holding the counters, for the host to gather.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Counts one record read from `shard`.
    pub fn record_read(&self, stream: &str, shard: &str, acquis_type: &str) {
        if self.level == MetricsLevel::None {
            return;
        }

        self.lines_read
            .with_label_values(&[stream, DATASOURCE_TYPE, acquis_type])
            .inc();
        self.lines_read_shards
            .with_label_values(&[stream, shard])
            .inc();
    }

    /// Records read on a single shard so far.
    #[must_use]
    pub fn shard_lines_read(&self, stream: &str, shard: &str) -> u64 {
        self.lines_read_shards
            .with_label_values(&[stream, shard])
            .get()
    }

    /// Records read on the whole stream so far for one acquisition type.
    #[must_use]
    pub fn lines_read(&self, stream: &str, acquis_type: &str) -> u64 {
        self.lines_read
            .with_label_values(&[stream, DATASOURCE_TYPE, acquis_type])
            .get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_read_counts_both_families() {
        let metrics = AcquisitionMetrics::new(MetricsLevel::Full).unwrap();
        metrics.record_read("s1", "shard-0", "syslog");
        metrics.record_read("s1", "shard-0", "syslog");
        metrics.record_read("s1", "shard-1", "syslog");

        assert_eq!(metrics.shard_lines_read("s1", "shard-0"), 2);
        assert_eq!(metrics.shard_lines_read("s1", "shard-1"), 1);
        assert_eq!(metrics.lines_read("s1", "syslog"), 3);
        assert_eq!(metrics.lines_read("s1", "nginx"), 0);
    }

    #[test]
    fn test_registry_exposes_labeled_families() {
        let metrics = AcquisitionMetrics::new(MetricsLevel::Full).unwrap();
        metrics.record_read("s1", "shard-0", "syslog");

        let families = metrics.registry().gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"kinesis_lines_read_total"));
        assert!(names.contains(&"kinesis_lines_read_shards_total"));

        let shards = families
            .iter()
            .find(|f| f.get_name() == "kinesis_lines_read_shards_total")
            .unwrap();
        let labels: Vec<(&str, &str)> = shards.get_metric()[0]
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();
        assert_eq!(labels, vec![("shard", "shard-0"), ("stream", "s1")]);
    }

    #[test]
    fn test_level_none_counts_nothing() {
        let metrics = AcquisitionMetrics::new(MetricsLevel::None).unwrap();
        metrics.record_read("s1", "shard-0", "");

        assert_eq!(metrics.lines_read("s1", ""), 0);
        assert_eq!(metrics.shard_lines_read("s1", "shard-0"), 0);
        assert!(metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = AcquisitionMetrics::new(MetricsLevel::Aggregated).unwrap();
        let clone = metrics.clone();
        clone.record_read("s1", "shard-0", "");

        assert_eq!(metrics.shard_lines_read("s1", "shard-0"), 1);
    }
}
