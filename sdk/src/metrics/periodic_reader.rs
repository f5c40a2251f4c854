//! [`PeriodicMetricReader`]: collects and exports on a fixed interval, with
//! ad-hoc flush and idempotent shutdown (§4.2 "PeriodicMetricReader").

use super::data::MetricData;
use super::exporter::MetricExporter;
use super::reader::{MetricProducer, MetricReader};
use crate::error::{SdkError, SdkResult};
use otel_api::otel_warn;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PeriodicMetricReaderBuilder<E> {
    exporter: E,
    interval: Duration,
    timeout: Duration,
}

impl<E: MetricExporter + 'static> PeriodicMetricReaderBuilder<E> {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn build(self) -> PeriodicMetricReader {
        PeriodicMetricReader::start(self.exporter, self.interval, self.timeout)
    }
}

enum ControlMessage {
    Flush(crossbeam_channel::Sender<SdkResult<()>>),
    Shutdown(crossbeam_channel::Sender<SdkResult<()>>),
}

#[derive(Clone)]
struct ShutdownOutcome(Result<(), String>);

type ProducerSlot = Arc<Mutex<Option<Weak<dyn MetricProducer>>>>;

/// Collects from its registered provider and exports on a fixed interval.
///
/// Export time does not count toward the interval: a collection that takes
/// longer than `interval` is immediately followed by the next one rather
/// than skipped.
pub struct PeriodicMetricReader {
    control_sender: crossbeam_channel::Sender<ControlMessage>,
    producer: ProducerSlot,
    is_shutdown: Arc<AtomicBool>,
    shutdown_result: Arc<OnceLock<ShutdownOutcome>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Debug for PeriodicMetricReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicMetricReader").field("is_shutdown", &self.is_shutdown.load(Ordering::Relaxed)).finish()
    }
}

impl PeriodicMetricReader {
    pub fn builder<E: MetricExporter + 'static>(exporter: E) -> PeriodicMetricReaderBuilder<E> {
        PeriodicMetricReaderBuilder { exporter, interval: DEFAULT_INTERVAL, timeout: DEFAULT_TIMEOUT }
    }

    fn start<E: MetricExporter + 'static>(exporter: E, interval: Duration, timeout: Duration) -> Self {
        let exporter = Arc::new(exporter);
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<ControlMessage>();
        let producer: ProducerSlot = Arc::new(Mutex::new(None));
        let is_shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_result = Arc::new(OnceLock::new());

        let worker_producer = producer.clone();
        let worker_shutdown_result = shutdown_result.clone();

        let worker = thread::Builder::new()
            .name("otel-periodic-metric-reader".into())
            .spawn(move || run_worker(exporter, worker_producer, control_rx, interval, timeout, worker_shutdown_result))
            .expect("failed to spawn periodic metric reader worker thread");

        PeriodicMetricReader { control_sender: control_tx, producer, is_shutdown, shutdown_result, worker: Some(worker) }
    }

    fn request(&self, make_msg: impl FnOnce(crossbeam_channel::Sender<SdkResult<()>>) -> ControlMessage) -> SdkResult<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if self.control_sender.send(make_msg(tx)).is_err() {
            return Err(SdkError::ChannelClosed);
        }
        rx.recv().unwrap_or(Err(SdkError::ChannelClosed))
    }
}

impl MetricReader for PeriodicMetricReader {
    fn register_producer(&self, producer: Weak<dyn MetricProducer>) {
        *self.producer.lock().unwrap() = Some(producer);
    }

    fn collect(&self) -> SdkResult<Vec<MetricData>> {
        collect_now(&self.producer)
    }

    fn force_flush(&self) -> SdkResult<()> {
        self.request(ControlMessage::Flush)
    }

    fn shutdown(&self) -> SdkResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return match self.shutdown_result.get() {
                Some(ShutdownOutcome(Ok(()))) => Ok(()),
                Some(ShutdownOutcome(Err(e))) => Err(SdkError::Export(e.clone())),
                None => Ok(()),
            };
        }
        self.request(ControlMessage::Shutdown)
    }
}

impl Drop for PeriodicMetricReader {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::SeqCst) {
            let _ = MetricReader::shutdown(self);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn collect_now(producer: &ProducerSlot) -> SdkResult<Vec<MetricData>> {
    let guard = producer.lock().unwrap();
    let producer = guard.as_ref().ok_or_else(|| SdkError::Config("reader is not registered with a provider".into()))?;
    let producer = producer.upgrade().ok_or(SdkError::ChannelClosed)?;
    Ok(producer.produce())
}

fn collect_and_export<E: MetricExporter + 'static>(exporter: &Arc<E>, producer: &ProducerSlot, timeout: Duration) -> SdkResult<()> {
    let batch: Vec<MetricData> = collect_now(producer)?.into_iter().filter(|m| !m.is_empty()).collect();
    if batch.is_empty() {
        return Ok(());
    }
    export_with_timeout(exporter, batch, timeout)
}

enum TimeoutOrExport {
    Export(SdkError),
    TimedOut,
}

fn export_with_timeout<E: MetricExporter + 'static>(exporter: &Arc<E>, batch: Vec<MetricData>, timeout: Duration) -> SdkResult<()> {
    let exporter_clone = exporter.clone();
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let result = futures_executor::block_on(exporter_clone.export(batch));
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(SdkError::Timeout(timeout)),
    }
    .map_err(|err| match err {
        SdkError::Timeout(_) => {
            otel_warn!(name: "PeriodicMetricReader.ExportTimedOut");
            err
        }
        other => {
            otel_warn!(name: "PeriodicMetricReader.ExportFailed", error = format!("{other}"));
            other
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn run_worker<E: MetricExporter + 'static>(
    exporter: Arc<E>,
    producer: ProducerSlot,
    control_rx: crossbeam_channel::Receiver<ControlMessage>,
    interval: Duration,
    timeout: Duration,
    shutdown_result: Arc<OnceLock<ShutdownOutcome>>,
) {
    let mut next_export_time = Instant::now() + interval;

    loop {
        let wait = next_export_time.saturating_duration_since(Instant::now());
        crossbeam_channel::select! {
            recv(control_rx) -> msg => {
                match msg {
                    Ok(ControlMessage::Flush(done)) => {
                        let result = collect_and_export(&exporter, &producer, timeout);
                        let _ = done.send(result);
                        next_export_time = Instant::now() + interval;
                    }
                    Ok(ControlMessage::Shutdown(done)) => {
                        let collect_result = collect_and_export(&exporter, &producer, timeout);
                        let shutdown_result_inner = futures_executor::block_on(exporter.shutdown());
                        let combined = collect_result.and(shutdown_result_inner);
                        let outcome = match &combined {
                            Ok(()) => ShutdownOutcome(Ok(())),
                            Err(e) => ShutdownOutcome(Err(e.to_string())),
                        };
                        let _ = shutdown_result.set(outcome);
                        let _ = done.send(combined);
                        return;
                    }
                    Err(_) => return,
                }
            },
            default(wait) => {
                if let Err(err) = collect_and_export(&exporter, &producer, timeout) {
                    otel_warn!(name: "PeriodicMetricReader.PeriodicExportFailed", error = format!("{err}"));
                }
                next_export_time = Instant::now() + interval;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkResult as Result;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct CollectingExporter {
        batches: Arc<StdMutex<Vec<Vec<MetricData>>>>,
    }

    #[async_trait]
    impl MetricExporter for CollectingExporter {
        async fn export(&self, batch: Vec<MetricData>) -> Result<()> {
            self.batches.lock().unwrap().push(batch);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StaticProducer(Vec<MetricData>);

    impl MetricProducer for StaticProducer {
        fn produce(&self) -> Vec<MetricData> {
            self.0.clone()
        }
    }

    #[test]
    fn flush_with_no_registered_producer_reports_an_error() {
        let reader = PeriodicMetricReader::builder(CollectingExporter::default()).with_interval(Duration::from_secs(3600)).build();
        assert!(reader.force_flush().is_err());
    }

    #[test]
    fn flush_exports_whatever_the_producer_currently_has() {
        let exporter = CollectingExporter::default();
        let batches = exporter.batches.clone();
        let reader = PeriodicMetricReader::builder(exporter).with_interval(Duration::from_secs(3600)).build();
        let producer: Arc<dyn MetricProducer> = Arc::new(StaticProducer(vec![]));
        reader.register_producer(Arc::downgrade(&producer));
        // An empty-but-registered producer yields nothing to export, not an error.
        assert!(reader.force_flush().is_ok());
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let reader = PeriodicMetricReader::builder(CollectingExporter::default()).with_interval(Duration::from_secs(3600)).build();
        let producer: Arc<dyn MetricProducer> = Arc::new(StaticProducer(vec![]));
        reader.register_producer(Arc::downgrade(&producer));
        assert!(MetricReader::shutdown(&reader).is_ok());
        assert!(MetricReader::shutdown(&reader).is_ok());
    }
}
