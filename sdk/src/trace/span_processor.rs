//! Span processors: hooks invoked on span start/end. [`BatchSpanProcessor`]
//! (§4.1) is the production path -- bounded queue, dedicated worker thread,
//! time/size-triggered export, flush and idempotent shutdown.

use crate::export::SpanExporter;
use crate::trace::SpanData;
use otel_api::otel_warn;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{SdkError, SdkResult};

#[cfg(feature = "metrics")]
use crate::metrics::{Meter, MeterProvider, Observation};
#[cfg(feature = "metrics")]
use otel_api::KeyValue;

const PROCESSOR_TYPE: &str = "batch_span_processor";

/// Hooks invoked at span start/end. Built-in processors batch and forward to
/// an exporter; multiple processors registered on a provider are invoked in
/// registration order and all see every sampled span.
pub trait SpanProcessor: Send + Sync + Debug {
    /// Called synchronously on the thread that started the span. Must not block.
    fn on_start(&self, _span_context: &otel_api::trace::SpanContext) {}

    /// Called synchronously within `Span::end`. Must be non-blocking and best-effort.
    fn on_end(&self, span: SpanData);

    /// Returns once every span enqueued before this call was handed to the exporter.
    fn force_flush(&self) -> SdkResult<()>;

    /// Flushes, then shuts the exporter down exactly once. Idempotent: later
    /// calls return the first call's cached result.
    fn shutdown(&self) -> SdkResult<()>;
}

const DEFAULT_SCHEDULE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;
const DEFAULT_MAX_EXPORT_BATCH_SIZE: usize = 512;
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`BatchSpanProcessor`]; see §4.1 for each default's rationale.
pub struct BatchSpanProcessorBuilder<E> {
    exporter: E,
    schedule_delay: Duration,
    max_queue_size: usize,
    max_export_batch_size: usize,
    exporter_timeout: Duration,
    #[cfg(feature = "metrics")]
    meter: Option<Meter>,
}

impl<E: SpanExporter + 'static> BatchSpanProcessorBuilder<E> {
    pub fn with_schedule_delay(mut self, delay: Duration) -> Self {
        self.schedule_delay = delay;
        self
    }
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }
    pub fn with_max_export_batch_size(mut self, size: usize) -> Self {
        self.max_export_batch_size = size.min(self.max_queue_size.max(size));
        self
    }
    pub fn with_exporter_timeout(mut self, timeout: Duration) -> Self {
        self.exporter_timeout = timeout;
        self
    }

    /// Reports the `queueSize{processorType=batch_span_processor}` gauge and
    /// `processedSpans{processorType,dropped}` counter (§4.1 "Observability")
    /// through a meter obtained from `meter_provider`.
    #[cfg(feature = "metrics")]
    pub fn with_meter_provider(mut self, meter_provider: &MeterProvider) -> Self {
        self.meter = Some(meter_provider.meter_named("otel.sdk.trace.batch_span_processor"));
        self
    }

    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::start(
            self.exporter,
            self.schedule_delay,
            self.max_queue_size,
            self.max_export_batch_size,
            self.exporter_timeout,
            #[cfg(feature = "metrics")]
            self.meter,
        )
    }
}

/// Forwards to the wrapped processor, so a processor that must also be held
/// elsewhere (e.g. to track its `shutdown` as a cleanup handle once
/// registered with a provider) can be registered by cloning the `Arc` rather
/// than giving up the only handle to it.
impl<T: SpanProcessor + ?Sized> SpanProcessor for Arc<T> {
    fn on_start(&self, span_context: &otel_api::trace::SpanContext) {
        (**self).on_start(span_context)
    }
    fn on_end(&self, span: SpanData) {
        (**self).on_end(span)
    }
    fn force_flush(&self) -> SdkResult<()> {
        (**self).force_flush()
    }
    fn shutdown(&self) -> SdkResult<()> {
        (**self).shutdown()
    }
}

enum ControlMessage {
    Flush(crossbeam_channel::Sender<SdkResult<()>>),
    Shutdown(crossbeam_channel::Sender<SdkResult<()>>),
}

/// Bounded-queue, single-worker-thread batch span processor (§4.1).
///
/// `on_end` is a non-blocking, best-effort `try_send`: once `max_queue_size`
/// sampled spans are buffered, further spans are dropped and counted rather
/// than applying backpressure to the producing thread.
pub struct BatchSpanProcessor {
    span_sender: crossbeam_channel::Sender<SpanData>,
    control_sender: crossbeam_channel::Sender<ControlMessage>,
    queue_len: Arc<AtomicUsize>,
    dropped_spans: Arc<AtomicU64>,
    exported_spans: Arc<AtomicU64>,
    is_shutdown: Arc<AtomicBool>,
    shutdown_result: Arc<OnceLock<ShutdownOutcome>>,
    worker: Option<thread::JoinHandle<()>>,
}

#[derive(Clone)]
struct ShutdownOutcome(Result<(), String>);

impl Debug for BatchSpanProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSpanProcessor")
            .field("queue_len", &self.queue_len.load(Ordering::Relaxed))
            .field("is_shutdown", &self.is_shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl BatchSpanProcessor {
    pub fn builder<E: SpanExporter + 'static>(exporter: E) -> BatchSpanProcessorBuilder<E> {
        BatchSpanProcessorBuilder {
            exporter,
            schedule_delay: DEFAULT_SCHEDULE_DELAY,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_export_batch_size: DEFAULT_MAX_EXPORT_BATCH_SIZE,
            exporter_timeout: DEFAULT_EXPORT_TIMEOUT,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    fn start<E: SpanExporter + 'static>(
        exporter: E,
        schedule_delay: Duration,
        max_queue_size: usize,
        max_export_batch_size: usize,
        exporter_timeout: Duration,
        #[cfg(feature = "metrics")] meter: Option<Meter>,
    ) -> Self {
        let exporter = Arc::new(exporter);
        let (span_tx, span_rx) = crossbeam_channel::bounded::<SpanData>(max_queue_size);
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<ControlMessage>();
        let queue_len = Arc::new(AtomicUsize::new(0));
        let dropped_spans = Arc::new(AtomicU64::new(0));
        let exported_spans = Arc::new(AtomicU64::new(0));
        let is_shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_result = Arc::new(OnceLock::new());

        #[cfg(feature = "metrics")]
        if let Some(meter) = &meter {
            let gauge = meter.i64_observable_gauge("queueSize", "Number of spans buffered for export", "spans");
            let gauge_queue_len = queue_len.clone();
            let _ = meter.register_callback(&gauge, move || {
                vec![Observation::new(gauge_queue_len.load(Ordering::Relaxed) as i64, [KeyValue::new("processorType", PROCESSOR_TYPE)])]
            });

            let counter = meter.i64_observable_counter("processedSpans", "Number of spans processed by the batch span processor", "spans");
            let counter_exported = exported_spans.clone();
            let counter_dropped = dropped_spans.clone();
            let _ = meter.register_callback(&counter, move || {
                vec![
                    Observation::new(
                        counter_exported.load(Ordering::Relaxed) as i64,
                        [KeyValue::new("processorType", PROCESSOR_TYPE), KeyValue::new("dropped", false)],
                    ),
                    Observation::new(
                        counter_dropped.load(Ordering::Relaxed) as i64,
                        [KeyValue::new("processorType", PROCESSOR_TYPE), KeyValue::new("dropped", true)],
                    ),
                ]
            });
        }

        let worker_queue_len = queue_len.clone();
        let worker_exported = exported_spans.clone();
        let worker_shutdown_result = shutdown_result.clone();

        let worker = thread::Builder::new()
            .name("otel-batch-span-processor".into())
            .spawn(move || {
                run_worker(
                    exporter,
                    span_rx,
                    control_rx,
                    schedule_delay,
                    max_export_batch_size,
                    exporter_timeout,
                    worker_queue_len,
                    worker_exported,
                    worker_shutdown_result,
                )
            })
            .expect("failed to spawn batch span processor worker thread");

        BatchSpanProcessor {
            span_sender: span_tx,
            control_sender: control_tx,
            queue_len,
            dropped_spans,
            exported_spans,
            is_shutdown,
            shutdown_result,
            worker: Some(worker),
        }
    }

    /// Current approximate queue depth; backs the `queueSize{processorType}` self-metric.
    pub fn queue_size(&self) -> u64 {
        self.queue_len.load(Ordering::Relaxed) as u64
    }

    /// Total spans handed to the exporter across all completed batches.
    pub fn exported_span_count(&self) -> u64 {
        self.exported_spans.load(Ordering::Relaxed)
    }

    /// Total spans dropped because the queue was full; backs `processedSpans{dropped=true}`.
    pub fn dropped_span_count(&self) -> u64 {
        self.dropped_spans.load(Ordering::Relaxed)
    }

    fn request(&self, make_msg: impl FnOnce(crossbeam_channel::Sender<SdkResult<()>>) -> ControlMessage) -> SdkResult<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if self.control_sender.send(make_msg(tx)).is_err() {
            return Err(SdkError::ChannelClosed);
        }
        rx.recv().unwrap_or(Err(SdkError::ChannelClosed))
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }
        match self.span_sender.try_send(span) {
            Ok(()) => {
                self.queue_len.store(self.span_sender.len(), Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_spans.fetch_add(1, Ordering::Relaxed);
                otel_warn!(name: "BatchSpanProcessor.SpanDropped", reason = "queue full");
            }
        }
    }

    fn force_flush(&self) -> SdkResult<()> {
        self.request(ControlMessage::Flush)
    }

    fn shutdown(&self) -> SdkResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return match self.shutdown_result.get() {
                Some(ShutdownOutcome(Ok(()))) => Ok(()),
                Some(ShutdownOutcome(Err(e))) => Err(SdkError::Export(e.clone())),
                None => Ok(()), // worker hasn't finished shutting down yet; treat as success-in-flight
            };
        }
        self.request(ControlMessage::Shutdown)
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::SeqCst) {
            let _ = SpanProcessor::shutdown(self);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker<E: SpanExporter + 'static>(
    exporter: Arc<E>,
    span_rx: crossbeam_channel::Receiver<SpanData>,
    control_rx: crossbeam_channel::Receiver<ControlMessage>,
    schedule_delay: Duration,
    max_export_batch_size: usize,
    exporter_timeout: Duration,
    queue_len: Arc<AtomicUsize>,
    exported_spans: Arc<AtomicU64>,
    shutdown_result: Arc<OnceLock<ShutdownOutcome>>,
) {
    let mut batch: Vec<SpanData> = Vec::with_capacity(max_export_batch_size);
    let mut next_export_time = Instant::now() + schedule_delay;

    let export_now = |batch: &mut Vec<SpanData>, exported_spans: &Arc<AtomicU64>| {
        if batch.is_empty() {
            return;
        }
        let to_export = std::mem::take(batch);
        let len = to_export.len() as u64;
        match export_with_timeout(&exporter, to_export, exporter_timeout) {
            Ok(()) => {
                exported_spans.fetch_add(len, Ordering::Relaxed);
            }
            Err(TimeoutOrExport::Export(err)) => otel_warn!(name: "BatchSpanProcessor.ExportFailed", error = format!("{err}")),
            Err(TimeoutOrExport::TimedOut) => otel_warn!(name: "BatchSpanProcessor.ExportTimedOut"),
        }
    };

    loop {
        let timeout = next_export_time.saturating_duration_since(Instant::now());
        crossbeam_channel::select! {
            recv(control_rx) -> msg => {
                match msg {
                    Ok(ControlMessage::Flush(done)) => {
                        drain_all(&span_rx, &mut batch, &mut |b| export_now(b, &exported_spans), max_export_batch_size);
                        let _ = done.send(Ok(()));
                    }
                    Ok(ControlMessage::Shutdown(done)) => {
                        drain_all(&span_rx, &mut batch, &mut |b| export_now(b, &exported_spans), max_export_batch_size);
                        let result = futures_executor::block_on(exporter.shutdown());
                        let outcome = match &result {
                            Ok(()) => ShutdownOutcome(Ok(())),
                            Err(e) => ShutdownOutcome(Err(e.to_string())),
                        };
                        let _ = shutdown_result.set(outcome);
                        let _ = done.send(result);
                        return;
                    }
                    Err(_) => return,
                }
            },
            recv(span_rx) -> msg => {
                if let Ok(span) = msg {
                    batch.push(span);
                    while batch.len() < max_export_batch_size {
                        match span_rx.try_recv() {
                            Ok(s) => batch.push(s),
                            Err(_) => break,
                        }
                    }
                    queue_len.store(span_rx.len(), Ordering::Relaxed);
                }
                if batch.len() >= max_export_batch_size || Instant::now() >= next_export_time {
                    export_now(&mut batch, &exported_spans);
                    next_export_time = Instant::now() + schedule_delay;
                }
            },
            default(timeout) => {
                export_now(&mut batch, &exported_spans);
                next_export_time = Instant::now() + schedule_delay;
            },
        }
    }
}

/// Drains the entire queue into batches of at most `max_batch` and exports each,
/// used by `force_flush`/`shutdown` to guarantee every already-queued span is observed.
fn drain_all(
    span_rx: &crossbeam_channel::Receiver<SpanData>,
    batch: &mut Vec<SpanData>,
    export: &mut dyn FnMut(&mut Vec<SpanData>),
    max_batch: usize,
) {
    loop {
        while batch.len() < max_batch {
            match span_rx.try_recv() {
                Ok(s) => batch.push(s),
                Err(_) => break,
            }
        }
        if batch.is_empty() {
            break;
        }
        export(batch);
        if span_rx.is_empty() {
            break;
        }
    }
}

enum TimeoutOrExport {
    Export(SdkError),
    TimedOut,
}

/// Runs `exporter.export(batch)` to completion on a helper thread and races it
/// against `timeout`. The helper thread is not cancelled on timeout -- it is
/// left to finish or fail on its own, matching "the exporter owns its own
/// internal timeout" (see [`SpanExporter::export`]); this call only bounds
/// how long the worker thread waits for it.
fn export_with_timeout<E: SpanExporter + 'static>(exporter: &Arc<E>, batch: Vec<SpanData>, timeout: Duration) -> Result<(), TimeoutOrExport> {
    let exporter = exporter.clone();
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let result = futures_executor::block_on(exporter.export(batch));
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TimeoutOrExport::Export(err)),
        Err(_) => Err(TimeoutOrExport::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkResult as Result;
    use async_trait::async_trait;
    use otel_api::trace::{SpanContext, SpanId, SpanKind, TraceFlags, TraceId, TraceState};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct CollectingExporter {
        batches: Arc<Mutex<Vec<Vec<SpanData>>>>,
    }

    #[async_trait]
    impl SpanExporter for CollectingExporter {
        async fn export(&self, batch: Vec<SpanData>) -> Result<()> {
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }
    }

    fn sampled_span(name: &'static str) -> SpanData {
        use crate::resource::Resource;
        use crate::scope::InstrumentationScope;
        use crate::trace::span::{Span, SpanLimits};
        use std::time::SystemTime;

        let ctx = SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::SAMPLED, false, TraceState::NONE);
        Span::new(
            ctx,
            SpanContext::NONE,
            name.into(),
            SpanKind::Internal,
            SystemTime::now(),
            vec![],
            vec![],
            SpanLimits::default(),
            Arc::new(Resource::empty()),
            Arc::new(InstrumentationScope::new("test")),
            Arc::new(Vec::new()),
        )
        .end()
    }

    fn unsampled_span() -> SpanData {
        use crate::resource::Resource;
        use crate::scope::InstrumentationScope;
        use crate::trace::span::{Span, SpanLimits};
        use std::time::SystemTime;

        let ctx = SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::NOT_SAMPLED, false, TraceState::NONE);
        Span::new(
            ctx,
            SpanContext::NONE,
            "unsampled".into(),
            SpanKind::Internal,
            SystemTime::now(),
            vec![],
            vec![],
            SpanLimits::default(),
            Arc::new(Resource::empty()),
            Arc::new(InstrumentationScope::new("test")),
            Arc::new(Vec::new()),
        )
        .end()
    }

    #[test]
    fn unsampled_spans_are_never_enqueued() {
        let exporter = CollectingExporter::default();
        let processor = BatchSpanProcessor::builder(exporter).build();
        processor.on_end(unsampled_span());
        assert_eq!(processor.queue_size(), 0);
        processor.shutdown().unwrap();
    }

    #[test]
    fn force_flush_observes_all_spans_queued_before_the_call() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let exporter = CollectingExporter { batches: batches.clone() };
        let processor = BatchSpanProcessor::builder(exporter)
            .with_schedule_delay(Duration::from_secs(60))
            .build();

        for i in 0..10 {
            processor.on_end(sampled_span(if i % 2 == 0 { "a" } else { "b" }));
        }
        processor.force_flush().unwrap();

        let exported: usize = batches.lock().unwrap().iter().map(|b| b.len()).sum();
        assert_eq!(exported, 10);
        processor.shutdown().unwrap();
    }

    #[test]
    fn queue_bounds_drop_overflow_and_count_it() {
        let exporter = CollectingExporter::default();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_schedule_delay(Duration::from_secs(60))
            .with_max_queue_size(4)
            .with_max_export_batch_size(4)
            .build();

        for _ in 0..20 {
            processor.on_end(sampled_span("x"));
        }
        // Some number <= 4 remain queued (others may have started exporting);
        // what matters is drops are counted for the overflow.
        assert!(processor.dropped_span_count() > 0);
        processor.shutdown().unwrap();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let exporter = CollectingExporter::default();
        let processor = BatchSpanProcessor::builder(exporter).build();
        assert!(processor.shutdown().is_ok());
        assert!(processor.shutdown().is_ok());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn self_metrics_are_observable_through_the_configured_meter_provider() {
        use crate::metrics::{AggregationTemporality, MetricReader, MetricProducer, PointValue};
        use std::sync::Mutex as StdMutex;

        #[derive(Debug, Default)]
        struct NullReader {
            producer: StdMutex<Option<std::sync::Weak<dyn MetricProducer>>>,
        }
        impl MetricReader for NullReader {
            fn register_producer(&self, producer: std::sync::Weak<dyn MetricProducer>) {
                *self.producer.lock().unwrap() = Some(producer);
            }
            fn collect(&self) -> SdkResult<Vec<crate::metrics::MetricData>> {
                let guard = self.producer.lock().unwrap();
                Ok(guard.as_ref().and_then(|p| p.upgrade()).map(|p| p.produce()).unwrap_or_default())
            }
            fn force_flush(&self) -> SdkResult<()> {
                Ok(())
            }
            fn shutdown(&self) -> SdkResult<()> {
                Ok(())
            }
        }

        let reader = Arc::new(NullReader::default());
        let meter_provider = MeterProvider::builder().with_reader(reader.clone(), AggregationTemporality::Cumulative).build();

        let exporter = CollectingExporter::default();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_schedule_delay(Duration::from_secs(60))
            .with_meter_provider(&meter_provider)
            .build();

        processor.on_end(sampled_span("x"));
        processor.force_flush().unwrap();

        let data = reader.collect().unwrap();
        let queue_size = data.iter().find(|m| m.descriptor.name.as_ref() == "queueSize").expect("queueSize gauge registered");
        match &queue_size.points[0].value {
            PointValue::Gauge { .. } => {}
            _ => panic!("expected gauge point"),
        }

        let processed = data.iter().find(|m| m.descriptor.name.as_ref() == "processedSpans").expect("processedSpans counter registered");
        assert_eq!(processed.points.len(), 2);

        processor.shutdown().unwrap();
    }

    #[test]
    fn batch_sizing_never_exceeds_configured_max() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let exporter = CollectingExporter { batches: batches.clone() };
        let processor = BatchSpanProcessor::builder(exporter)
            .with_max_export_batch_size(3)
            .with_max_queue_size(100)
            .with_schedule_delay(Duration::from_secs(60))
            .build();

        for _ in 0..10 {
            processor.on_end(sampled_span("x"));
        }
        processor.force_flush().unwrap();
        for batch in batches.lock().unwrap().iter() {
            assert!(batch.len() <= 3);
            assert!(!batch.is_empty());
        }
        processor.shutdown().unwrap();
    }
}
