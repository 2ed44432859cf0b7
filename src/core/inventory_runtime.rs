// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires queue, dedup buffer, ingestion worker and lifecycle controller together

use std::sync::{Arc, Mutex};

use crate::core::command::CommandDispatcher;
use crate::core::config::AppConfig;
use crate::core::dedup::DedupBuffer;
use crate::core::driver::{ConnectionEventLogger, DriverCallbacks, ReaderDriver, TagReportEnqueuer};
use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::RawTagReport;
use crate::core::ingestion::{IngestionLoop, IngestionMetricsSnapshot};
use crate::core::lifecycle::{failed, LifecycleController, Notice};
use crate::core::stream::event_queue::EventQueue;
use crate::core::stream::output::sink::NotificationSink;
use crate::core::util::shutdown::ShutdownCoordinator;

/// One running inventory pipeline
///
/// The ingestion worker starts on construction. `shutdown` may be called from
/// any thread, any number of times; only the first call does the work.
#[derive(Debug)]
pub struct InventoryRuntime {
    config: AppConfig,
    queue: Arc<EventQueue<RawTagReport>>,
    buffer: Arc<DedupBuffer>,
    controller: Arc<LifecycleController>,
    ingestion: Mutex<Option<IngestionLoop>>,
    shutdown: ShutdownCoordinator,
}

impl InventoryRuntime {
    pub fn new(config: AppConfig, sink: Arc<dyn NotificationSink>) -> InventoryResult<Self> {
        config.validate()?;

        let queue = Arc::new(EventQueue::new());
        let buffer = Arc::new(DedupBuffer::new(config.pipeline.buffer_capacity)?);
        let controller = Arc::new(LifecycleController::new(Arc::clone(&buffer)));
        let ingestion = IngestionLoop::spawn(
            Arc::clone(&queue),
            Arc::clone(&buffer),
            sink,
            config.ingestion_settings(),
        )?;

        log::info!(
            "[InventoryRuntime] Pipeline ready (buffer capacity {})",
            buffer.capacity()
        );
        Ok(Self {
            config,
            queue,
            buffer,
            controller,
            ingestion: Mutex::new(Some(ingestion)),
            shutdown: ShutdownCoordinator::new(),
        })
    }

    /// Connect to the configured host through `driver`
    pub fn connect(&self, driver: &dyn ReaderDriver) -> InventoryResult<String> {
        let host = self
            .config
            .connection
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                InventoryError::configuration_with_key("no reader host configured", "connection.host")
            })?;

        self.controller.connect(
            driver,
            host,
            self.config.connection.port,
            &self.config.reader,
            self.callbacks(),
        )
    }

    /// Connect, reporting an unreachable or failing reader as a notice.
    ///
    /// The runtime stays usable without a session: lifecycle commands then
    /// answer `NotConnected`. Only configuration errors are returned as `Err`.
    pub fn connect_or_notify(&self, driver: &dyn ReaderDriver) -> InventoryResult<Notice> {
        match self.connect(driver) {
            Ok(peer) => Ok(Notice::Connected { peer }),
            Err(e) if e.is_driver_failure() => Ok(failed("connect", e)),
            Err(e) => Err(e),
        }
    }

    /// Callbacks feeding this runtime's queue
    pub fn callbacks(&self) -> DriverCallbacks {
        DriverCallbacks {
            tag_report: Arc::new(TagReportEnqueuer::new(self.queue.producer())),
            connection_event: Arc::new(ConnectionEventLogger),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> Arc<LifecycleController> {
        Arc::clone(&self.controller)
    }

    pub fn buffer(&self) -> Arc<DedupBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn queue(&self) -> Arc<EventQueue<RawTagReport>> {
        Arc::clone(&self.queue)
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(self.controller())
    }

    /// Live ingestion counters; `None` once shut down
    pub fn metrics(&self) -> Option<IngestionMetricsSnapshot> {
        self.ingestion
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(IngestionLoop::metrics)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    /// Stop and disconnect the reader, then drain and join the ingestion worker.
    ///
    /// Returns the final ingestion counters on the first call, `None` afterwards.
    pub fn shutdown(&self) -> Option<IngestionMetricsSnapshot> {
        if !self.shutdown.shutdown() {
            return None;
        }

        match self.controller.shutdown() {
            Notice::NotConnected => {}
            notice => log::info!("[InventoryRuntime] {}", notice),
        }

        let ingestion = self
            .ingestion
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let stats = ingestion.map(IngestionLoop::shutdown)?;
        log::info!(
            "[InventoryRuntime] Shut down: {} unique tag(s) accepted, {} duplicate report(s), {} malformed",
            stats.accepted,
            stats.duplicates,
            stats.malformed
        );
        Some(stats)
    }
}

impl Drop for InventoryRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
