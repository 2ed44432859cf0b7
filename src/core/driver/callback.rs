// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ConnectionEvent, ConnectionEventCallback, TagReportCallback};
use crate::core::event::RawTagReport;
use crate::core::stream::event_queue::QueueProducer;

/// Adapter that connects the driver's tag report callback to the event queue
///
/// ```text
/// driver thread → on_tag_report(batch) → EventQueue → IngestionLoop
/// ```
///
/// Runs on the driver's thread, so it does nothing but enqueue: no decoding,
/// no locking beyond the channel itself.
#[derive(Debug, Clone)]
pub struct TagReportEnqueuer {
    producer: QueueProducer<RawTagReport>,
}

impl TagReportEnqueuer {
    pub fn new(producer: QueueProducer<RawTagReport>) -> Self {
        Self { producer }
    }
}

impl TagReportCallback for TagReportEnqueuer {
    fn on_tag_report(&self, batch: Vec<RawTagReport>) {
        for report in batch {
            self.producer.enqueue(report);
        }
    }
}

/// Logs connection events; attempts are reported separately from everything else
#[derive(Debug, Clone, Default)]
pub struct ConnectionEventLogger;

impl ConnectionEventCallback for ConnectionEventLogger {
    fn on_connection_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::ConnectionAttempt(status) => {
                log::info!("[Reader] Connection event: {:?}", status);
            }
            ConnectionEvent::StateChanged { from, to } => {
                log::debug!("[Reader] State {} -> {}", from, to);
            }
            ConnectionEvent::Other(description) => {
                log::info!("[Reader] Other event: {}", description);
            }
        }
    }
}
