// SPDX-License-Identifier: MIT OR Apache-2.0

//! RFID tag inventory pipeline
//!
//! ```text
//! driver callback threads ──▶ EventQueue ──▶ IngestionLoop ──▶ DedupBuffer ──▶ NotificationSink
//!                                                                   ▲
//! operator ──▶ CommandDispatcher ──▶ LifecycleController ───────────┘ (clear)
//!                                           │
//!                                           └──▶ ReaderSession (start / stop / state / disconnect)
//! ```

pub mod core;

pub use crate::core::command::{Command, CommandDispatcher};
pub use crate::core::config::{AppConfig, ConfigOverrides, ReaderConfig};
pub use crate::core::dedup::{DedupBuffer, OfferOutcome};
pub use crate::core::driver::{DriverRegistry, ReaderDriver, ReaderSession, SimulatedDriver};
pub use crate::core::error::{InventoryError, InventoryResult};
pub use crate::core::event::{RawTagReport, TagRecord, TimestampSource};
pub use crate::core::inventory_runtime::InventoryRuntime;
pub use crate::core::lifecycle::{LifecycleController, Notice};
