// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Helpers for asserting on exported metrics.

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{
    InMemoryMetricExporter, SdkMeterProvider,
    data::{AggregatedMetrics, MetricData, ScopeMetrics},
};

use crate::metrics::EVENT_COUNT_NAME;

/// Collects what a cache reports to an in-memory `OTel` pipeline.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl Default for MetricTester {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    #[must_use]
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Returns the cumulative value of the event counter for the data point carrying `attribute`.
    #[must_use]
    pub fn event_count(&self, attribute: &KeyValue) -> u64 {
        self.provider.force_flush().unwrap();

        let exported = self.exporter.get_finished_metrics().unwrap();
        let Some(latest) = exported.last() else {
            return 0;
        };

        latest
            .scope_metrics()
            .flat_map(ScopeMetrics::metrics)
            .filter(|metric| metric.name() == EVENT_COUNT_NAME)
            .map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => sum
                    .data_points()
                    .filter(|point| point.attributes().any(|kv| kv == attribute))
                    .map(|point| point.value())
                    .sum(),
                _ => 0,
            })
            .sum()
    }
}

