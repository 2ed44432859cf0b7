// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Reader Driver Boundary
//!
//! The wire protocol spoken to the physical reader lives behind these traits.
//! The rest of the crate only sees:
//!
//! ```text
//! ReaderDriver::connect() ──▶ ReaderSession (start / stop / state / capabilities / disconnect)
//!        │
//!        └── DriverCallbacks, invoked on driver-owned threads:
//!              TagReportCallback::on_tag_report(batch)
//!              ConnectionEventCallback::on_connection_event(event)
//! ```
//!
//! Callbacks arrive concurrently with, and asynchronously to, every lifecycle
//! operation. Implementations of the callback traits must return quickly; the
//! shipped [`TagReportEnqueuer`] only pushes into the event queue.

pub mod callback;
pub mod simulated;

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::core::config::ReaderConfig;
use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::RawTagReport;

pub use callback::{ConnectionEventLogger, TagReportEnqueuer};
pub use simulated::{SimulatedDriver, SimulatedOperation, SimulatedReader, SimulatedReaderSettings};

/// Default LLRP port
pub const DEFAULT_READER_PORT: u16 = 5084;

/// Connection state as reported by a reader session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Inventorying,
    Error,
}

impl ConnectionState {
    /// A session in this state accepts inventory commands
    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Inventorying)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Inventorying => "INVENTORYING",
            ConnectionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a connection attempt, as the reader announces it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAttemptStatus {
    Success,
    FailedReaderInitiatedConnectionExists,
    FailedClientInitiatedConnectionExists,
    FailedOtherReason,
    AnotherConnectionAttempted,
}

/// Asynchronous notification from the driver about the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectionAttempt(ConnectionAttemptStatus),
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Other(String),
}

/// One selectable transmit power level of an antenna
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLevel {
    pub index: u16,
    pub dbm: f32,
}

/// What the reader reports about itself after connecting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderCapabilities {
    pub model: String,
    pub antenna_power_levels: BTreeMap<u16, Vec<PowerLevel>>,
}

impl ReaderCapabilities {
    pub fn power_levels(&self, antenna: u16) -> &[PowerLevel] {
        self.antenna_power_levels
            .get(&antenna)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Index of the strongest power level available on `antenna`
    pub fn max_power_index(&self, antenna: u16) -> Option<u16> {
        self.power_levels(antenna)
            .iter()
            .max_by(|a, b| a.dbm.total_cmp(&b.dbm).then(a.index.cmp(&b.index)))
            .map(|level| level.index)
    }

    pub fn supports_power_index(&self, antenna: u16, index: u16) -> bool {
        self.power_levels(antenna)
            .iter()
            .any(|level| level.index == index)
    }
}

/// Receives tag report batches on a driver thread
pub trait TagReportCallback: Debug + Send + Sync {
    fn on_tag_report(&self, batch: Vec<RawTagReport>);
}

/// Receives connection events on a driver thread
pub trait ConnectionEventCallback: Debug + Send + Sync {
    fn on_connection_event(&self, event: ConnectionEvent);
}

/// The two sinks a driver is handed at connect time
#[derive(Debug, Clone)]
pub struct DriverCallbacks {
    pub tag_report: Arc<dyn TagReportCallback>,
    pub connection_event: Arc<dyn ConnectionEventCallback>,
}

/// Live handle to one reader
///
/// Every method may block on the device. None of them is called while the
/// dedup buffer lock is held.
pub trait ReaderSession: Debug + Send + Sync {
    fn start_inventory(&self) -> InventoryResult<()>;

    /// Stop inventory, letting in-flight reports finish transmitting
    fn stop_politely(&self) -> InventoryResult<()>;

    fn state(&self) -> ConnectionState;

    fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    fn capabilities(&self) -> InventoryResult<ReaderCapabilities>;

    fn set_transmit_power(&self, antenna: u16, power_index: u16) -> InventoryResult<()>;

    fn disconnect(&self) -> InventoryResult<()>;

    /// `host:port` of the remote end
    fn peer(&self) -> String;
}

/// Factory for reader sessions
pub trait ReaderDriver: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn connect(
        &self,
        host: &str,
        port: u16,
        config: &ReaderConfig,
        callbacks: DriverCallbacks,
    ) -> InventoryResult<Box<dyn ReaderSession>>;
}

/// Name → driver lookup used at startup
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn ReaderDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every driver shipped in this crate
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SimulatedDriver::default()));
        registry
    }

    /// Register a driver under its own name, replacing any previous one
    pub fn register(&mut self, driver: Arc<dyn ReaderDriver>) {
        let name = driver.name().to_string();
        if self.drivers.insert(name.clone(), driver).is_some() {
            log::debug!("[DriverRegistry] Replaced driver '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> InventoryResult<Arc<dyn ReaderDriver>> {
        self.drivers.get(name).map(Arc::clone).ok_or_else(|| {
            InventoryError::configuration_with_key(
                format!(
                    "no reader driver registered under '{}' (available: {})",
                    name,
                    self.names().join(", ")
                ),
                "connection.driver",
            )
        })
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities() -> ReaderCapabilities {
        let mut levels = BTreeMap::new();
        levels.insert(
            1,
            vec![
                PowerLevel { index: 1, dbm: 10.0 },
                PowerLevel { index: 2, dbm: 20.0 },
                PowerLevel { index: 3, dbm: 30.0 },
            ],
        );
        levels.insert(2, vec![PowerLevel { index: 7, dbm: 15.5 }]);
        ReaderCapabilities {
            model: "test".to_string(),
            antenna_power_levels: levels,
        }
    }

    #[test]
    fn test_alive_states() {
        assert!(ConnectionState::Connected.is_alive());
        assert!(ConnectionState::Inventorying.is_alive());
        assert!(!ConnectionState::Connecting.is_alive());
        assert!(!ConnectionState::Disconnected.is_alive());
        assert!(!ConnectionState::Error.is_alive());
    }

    #[test]
    fn test_max_power_index() {
        let caps = capabilities();
        assert_eq!(caps.max_power_index(1), Some(3));
        assert_eq!(caps.max_power_index(2), Some(7));
        assert_eq!(caps.max_power_index(9), None);
        assert!(caps.supports_power_index(1, 2));
        assert!(!caps.supports_power_index(2, 2));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["simulated".to_string()]);
        assert!(registry.get("simulated").is_ok());

        let err = registry.get("llrp").unwrap_err();
        assert!(err.to_string().contains("no reader driver registered under 'llrp'"));
    }
}
