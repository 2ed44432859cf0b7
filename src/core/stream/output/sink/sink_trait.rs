// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::error::InventoryResult;
use crate::core::event::TagRecord;
use std::fmt::Debug;

/// Receives one call per newly accepted tag.
///
/// Called on the ingestion worker after the dedup lock has been released, so an
/// implementation may block on I/O. Errors are logged by the caller and never
/// stop the pipeline.
pub trait NotificationSink: Debug + Send + Sync {
    fn notify(&self, record: &TagRecord) -> InventoryResult<()>;

    /// Flush buffered output. Called once at shutdown.
    fn flush(&self) -> InventoryResult<()> {
        Ok(())
    }
}
