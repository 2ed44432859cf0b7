// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Ingestion Loop
//!
//! Single dedicated worker that drains the [`EventQueue`], decodes each raw
//! report, applies dedup through the [`DedupBuffer`] and notifies the sink for
//! every newly accepted tag.
//!
//! ```text
//! EventQueue ──dequeue(poll)──▶ decode ──▶ filter ──▶ offer ──Accepted──▶ NotificationSink
//!                                 │           │         └──Duplicate──▶ (counted)
//!                                 └─Malformed─┴─Filtered──▶ (logged / counted)
//! ```
//!
//! A corrupt report or a failing sink never stops the loop. The loop ends only
//! when its shutdown flag is raised; whatever is already queued at that point
//! is drained before the thread exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::core::dedup::{DedupBuffer, OfferOutcome};
use crate::core::error::InventoryResult;
use crate::core::event::{RawTagReport, TagRecord, TimestampSource};
use crate::core::stream::event_queue::EventQueue;
use crate::core::stream::output::sink::NotificationSink;
use crate::core::util::shutdown::{ShutdownCoordinator, ShutdownHandle};

/// Default queue poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Knobs for the ingestion worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionSettings {
    pub poll_interval: Duration,
    pub timestamps: TimestampSource,
    /// When set, only this EPC is offered to the dedup buffer
    pub epc_filter: Option<String>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timestamps: TimestampSource::Reader,
            epc_filter: None,
        }
    }
}

/// What happened to one raw report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Accepted,
    Duplicate,
    Filtered,
    Malformed,
}

/// Pipeline counters, updated by the worker and readable from any thread
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    received: CachePadded<AtomicU64>,
    accepted: CachePadded<AtomicU64>,
    duplicates: CachePadded<AtomicU64>,
    filtered: CachePadded<AtomicU64>,
    malformed: CachePadded<AtomicU64>,
    sink_failures: CachePadded<AtomicU64>,
}

impl IngestionMetrics {
    fn record(&self, outcome: ReportOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ReportOutcome::Accepted => &self.accepted,
            ReportOutcome::Duplicate => &self.duplicates,
            ReportOutcome::Filtered => &self.filtered,
            ReportOutcome::Malformed => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionMetricsSnapshot {
        IngestionMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestionMetricsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub malformed: u64,
    pub sink_failures: u64,
}

/// Per-report pipeline stage: decode, filter, offer, notify
#[derive(Debug)]
pub struct TagProcessor {
    buffer: Arc<DedupBuffer>,
    sink: Arc<dyn NotificationSink>,
    settings: IngestionSettings,
    metrics: Arc<IngestionMetrics>,
}

impl TagProcessor {
    pub fn new(
        buffer: Arc<DedupBuffer>,
        sink: Arc<dyn NotificationSink>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            buffer,
            sink,
            settings,
            metrics: Arc::new(IngestionMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn process(&self, raw: &RawTagReport) -> ReportOutcome {
        let outcome = self.classify(raw);
        self.metrics.record(outcome);
        outcome
    }

    fn classify(&self, raw: &RawTagReport) -> ReportOutcome {
        let record = match TagRecord::decode(raw, self.settings.timestamps) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("[IngestionLoop] Skipping tag report: {}", e);
                return ReportOutcome::Malformed;
            }
        };

        if let Some(wanted) = &self.settings.epc_filter {
            if record.epc() != wanted {
                return ReportOutcome::Filtered;
            }
        }

        // Offer a clone so the notification can be emitted after the lock is released
        match self.buffer.offer(record.clone()) {
            OfferOutcome::Duplicate => ReportOutcome::Duplicate,
            OfferOutcome::Accepted => {
                if let Err(e) = self.sink.notify(&record) {
                    self.metrics.sink_failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[IngestionLoop] Failed to notify new tag {}: {}",
                        record.epc(),
                        e
                    );
                }
                ReportOutcome::Accepted
            }
        }
    }
}

/// Handle to the running ingestion worker
#[derive(Debug)]
pub struct IngestionLoop {
    shutdown: ShutdownCoordinator,
    metrics: Arc<IngestionMetrics>,
    sink: Arc<dyn NotificationSink>,
    worker: Option<JoinHandle<()>>,
}

impl IngestionLoop {
    /// Spawn the worker thread
    pub fn spawn(
        queue: Arc<EventQueue<RawTagReport>>,
        buffer: Arc<DedupBuffer>,
        sink: Arc<dyn NotificationSink>,
        settings: IngestionSettings,
    ) -> InventoryResult<Self> {
        let shutdown = ShutdownCoordinator::new();
        let poll_interval = settings.poll_interval;
        let processor = TagProcessor::new(buffer, Arc::clone(&sink), settings);
        let metrics = processor.metrics();
        let handle = shutdown.handle();

        let worker = thread::Builder::new()
            .name("tag-ingestion".to_string())
            .spawn(move || run(queue, processor, handle, poll_interval))?;

        log::debug!(
            "[IngestionLoop] Started with poll interval {:?}",
            poll_interval
        );
        Ok(Self {
            shutdown,
            metrics,
            sink,
            worker: Some(worker),
        })
    }

    pub fn metrics(&self) -> IngestionMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    /// Signal the worker, wait for it to drain and exit, and return final counters
    pub fn shutdown(mut self) -> IngestionMetricsSnapshot {
        self.stop_worker();
        self.metrics.snapshot()
    }

    fn stop_worker(&mut self) {
        self.shutdown.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("[IngestionLoop] Worker thread panicked");
            }
            if let Err(e) = self.sink.flush() {
                log::warn!("[IngestionLoop] Sink flush failed: {}", e);
            }
        }
    }
}

impl Drop for IngestionLoop {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run(
    queue: Arc<EventQueue<RawTagReport>>,
    processor: TagProcessor,
    shutdown: ShutdownHandle,
    poll_interval: Duration,
) {
    while !shutdown.is_shutdown() {
        if let Some(raw) = queue.dequeue(poll_interval) {
            processor.process(&raw);
        }
    }

    let mut drained = 0usize;
    while let Some(raw) = queue.try_dequeue() {
        processor.process(&raw);
        drained += 1;
    }
    if drained > 0 {
        log::debug!("[IngestionLoop] Drained {} queued report(s) at shutdown", drained);
    }

    let stats = processor.metrics.snapshot();
    log::info!(
        "[IngestionLoop] Stopped: received={} accepted={} duplicates={} filtered={} malformed={}",
        stats.received,
        stats.accepted,
        stats.duplicates,
        stats.filtered,
        stats.malformed
    );
}
