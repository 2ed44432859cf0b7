// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::TagRecord;
use crate::core::stream::output::sink::sink_trait::NotificationSink;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// LogSink - sink that routes tag notifications through the `log` facade
///
/// Every accepted record is also retained in `records`, which makes this the
/// sink of choice for tests and for headless runs.
#[derive(Debug, Clone)]
pub struct LogSink {
    pub records: Arc<Mutex<Vec<TagRecord>>>,
    prefix: String,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_prefix("[TAG]")
    }

    /// Create a LogSink with a custom line prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            prefix: prefix.into(),
        }
    }

    /// Records notified so far, oldest first
    pub fn received(&self) -> Vec<TagRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// EPCs notified so far, oldest first
    pub fn received_epcs(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|record| record.epc().to_string())
            .collect()
    }
}

impl NotificationSink for LogSink {
    fn notify(&self, record: &TagRecord) -> InventoryResult<()> {
        log::info!("{} New tag: {}", self.prefix, record);
        self.records
            .lock()
            .map_err(|_| InventoryError::sink("LogSink record store poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
