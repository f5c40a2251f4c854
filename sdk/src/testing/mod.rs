//! In-memory exporters for tests: collect whatever a provider/processor
//! hands them instead of shipping it anywhere (grounded on the teacher's
//! `testing::trace`/`testing::metrics` in-memory exporters).

#[cfg(feature = "trace")]
pub mod trace {
    use crate::error::SdkResult;
    use crate::export::SpanExporter;
    use crate::trace::SpanData;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Collects every exported span batch in memory, for assertions in tests.
    #[derive(Clone, Debug, Default)]
    pub struct InMemorySpanExporter {
        spans: Arc<Mutex<Vec<SpanData>>>,
    }

    impl InMemorySpanExporter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns a snapshot of every span exported so far.
        pub fn get_finished_spans(&self) -> Vec<SpanData> {
            self.spans.lock().unwrap().clone()
        }

        pub fn reset(&self) {
            self.spans.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl SpanExporter for InMemorySpanExporter {
        async fn export(&self, mut batch: Vec<SpanData>) -> SdkResult<()> {
            self.spans.lock().unwrap().append(&mut batch);
            Ok(())
        }

        async fn shutdown(&self) -> SdkResult<()> {
            self.reset();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn exported_spans_are_retained_until_reset() {
            let exporter = InMemorySpanExporter::new();
            futures_executor::block_on(exporter.export(vec![])).unwrap();
            assert!(exporter.get_finished_spans().is_empty());
            exporter.reset();
            assert!(exporter.get_finished_spans().is_empty());
        }
    }
}

#[cfg(feature = "metrics")]
pub mod metrics {
    use crate::error::SdkResult;
    use crate::metrics::{MetricData, MetricExporter};
    use async_trait::async_trait;
    use otel_api::metrics::InstrumentType;
    use std::sync::{Arc, Mutex};

    /// Collects every exported metric batch in memory, for assertions in tests.
    #[derive(Clone, Debug, Default)]
    pub struct InMemoryMetricExporter {
        batches: Arc<Mutex<Vec<Vec<MetricData>>>>,
    }

    impl InMemoryMetricExporter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns every batch exported so far, most recent last.
        pub fn get_finished_metrics(&self) -> Vec<Vec<MetricData>> {
            self.batches.lock().unwrap().clone()
        }

        pub fn reset(&self) {
            self.batches.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl MetricExporter for InMemoryMetricExporter {
        async fn export(&self, batch: Vec<MetricData>) -> SdkResult<()> {
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }

        fn preferred_temporality(&self, _kind: InstrumentType) -> crate::metrics::AggregationTemporality {
            crate::metrics::AggregationTemporality::Cumulative
        }

        async fn shutdown(&self) -> SdkResult<()> {
            self.reset();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn new_exporter_starts_empty() {
            let exporter = InMemoryMetricExporter::new();
            assert!(exporter.get_finished_metrics().is_empty());
        }
    }
}
