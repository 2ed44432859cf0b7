// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Lifecycle Controller
//!
//! The only component that issues commands to the reader. The session sits
//! behind one mutex, so start, stop and shutdown never interleave with each
//! other; tag callbacks keep flowing into the queue the whole time.
//!
//! Every operation answers with a [`Notice`] whose `Display` is the line shown
//! to the operator. Driver failures become [`Notice::OperationFailed`] and are
//! never propagated as errors.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::config::ReaderConfig;
use crate::core::dedup::DedupBuffer;
use crate::core::driver::{ConnectionState, DriverCallbacks, ReaderDriver, ReaderSession};
use crate::core::error::{InventoryError, InventoryResult};

/// Operator-facing result of a lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected { peer: String },
    InventoryStarted,
    InventoryStopped,
    TagDataCleared { dropped: usize },
    ReaderState(ConnectionState),
    NotConnected,
    OperationFailed {
        operation: &'static str,
        reason: String,
    },
    Disconnected,
}

impl Notice {
    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::OperationFailed { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { peer } => {
                write!(f, "Reader connected to {}. Ready for commands.", peer)
            }
            Notice::InventoryStarted => write!(f, "Started inventory."),
            Notice::InventoryStopped => write!(f, "Stopped inventory."),
            Notice::TagDataCleared { .. } => write!(f, "Tag data cleared."),
            Notice::ReaderState(state) => write!(f, "Reader state: {}", state),
            Notice::NotConnected => write!(f, "Reader not connected."),
            Notice::OperationFailed { operation, reason } => {
                write!(f, "Failed to {}: {}", operation, reason)
            }
            Notice::Disconnected => write!(f, "Reader disconnected."),
        }
    }
}

#[derive(Debug)]
pub struct LifecycleController {
    buffer: Arc<DedupBuffer>,
    session: Mutex<Option<Box<dyn ReaderSession>>>,
}

impl LifecycleController {
    pub fn new(buffer: Arc<DedupBuffer>) -> Self {
        Self {
            buffer,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Box<dyn ReaderSession>>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a session through `driver`, then apply transmit power.
    ///
    /// Returns the peer address of the new session.
    pub fn connect(
        &self,
        driver: &dyn ReaderDriver,
        host: &str,
        port: u16,
        config: &ReaderConfig,
        callbacks: DriverCallbacks,
    ) -> InventoryResult<String> {
        let mut slot = self.session();
        if slot.is_some() {
            return Err(InventoryError::connect(
                format!("{}:{}", host, port),
                "a reader session is already open",
            ));
        }

        log::info!(
            "[Lifecycle] Connecting to {}:{} via '{}' driver",
            host,
            port,
            driver.name()
        );
        let session = driver.connect(host, port, config, callbacks)?;
        let applied = apply_transmit_power(session.as_ref(), config);
        log::debug!("[Lifecycle] Transmit power set on {} antenna(s)", applied);

        let peer = session.peer();
        *slot = Some(session);
        Ok(peer)
    }

    /// Take ownership of an already opened session
    pub fn attach_session(&self, session: Box<dyn ReaderSession>) -> InventoryResult<()> {
        let mut slot = self.session();
        if let Some(existing) = slot.as_ref() {
            return Err(InventoryError::connect(
                session.peer(),
                format!("a reader session to {} is already open", existing.peer()),
            ));
        }
        *slot = Some(session);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session()
            .as_ref()
            .map(|session| session.is_alive())
            .unwrap_or(false)
    }

    /// Clear the dedup state and start inventory on a live session.
    ///
    /// The clear is not undone if the driver then fails to start.
    pub fn start(&self) -> Notice {
        let slot = self.session();
        let Some(session) = slot.as_ref().filter(|s| s.is_alive()) else {
            return Notice::NotConnected;
        };

        let dropped = self.buffer.clear();
        log::info!("[Lifecycle] Tag data cleared ({} buffered record(s))", dropped);

        match session.start_inventory() {
            Ok(()) => {
                log::info!("[Lifecycle] Inventory started on {}", session.peer());
                Notice::InventoryStarted
            }
            Err(e) => failed("start inventory", e),
        }
    }

    pub fn stop(&self) -> Notice {
        let slot = self.session();
        let Some(session) = slot.as_ref().filter(|s| s.is_alive()) else {
            return Notice::NotConnected;
        };

        match session.stop_politely() {
            Ok(()) => {
                log::info!("[Lifecycle] Inventory stopped on {}", session.peer());
                Notice::InventoryStopped
            }
            Err(e) => failed("stop inventory", e),
        }
    }

    /// Always permitted, connected or not
    pub fn clear(&self) -> Notice {
        let dropped = self.buffer.clear();
        log::info!("[Lifecycle] Tag data cleared ({} buffered record(s))", dropped);
        Notice::TagDataCleared { dropped }
    }

    pub fn query_state(&self) -> Notice {
        match self.session().as_ref() {
            Some(session) if session.is_alive() => Notice::ReaderState(session.state()),
            _ => Notice::NotConnected,
        }
    }

    /// Stop politely and disconnect. Subsequent calls report `NotConnected`.
    ///
    /// The session lock is held until disconnect returns; concurrent callers
    /// block until then.
    pub fn shutdown(&self) -> Notice {
        let mut slot = self.session();
        let Some(session) = slot.take() else {
            return Notice::NotConnected;
        };

        let mut outcome = Notice::Disconnected;
        if session.is_alive() {
            if let Err(e) = session.stop_politely() {
                outcome = failed("stop inventory", e);
            }
        }
        if let Err(e) = session.disconnect() {
            outcome = failed("disconnect", e);
        } else {
            log::info!("[Lifecycle] Disconnected from {}", session.peer());
        }
        drop(slot);
        outcome
    }
}

pub(crate) fn failed(operation: &'static str, error: InventoryError) -> Notice {
    log::error!("[Lifecycle] Failed to {}: {}", operation, error);
    Notice::OperationFailed {
        operation,
        reason: error.to_string(),
    }
}

/// Explicit overrides first, otherwise the strongest level the reader offers.
/// Returns how many antennas were configured.
fn apply_transmit_power(session: &dyn ReaderSession, config: &ReaderConfig) -> usize {
    let capabilities = match session.capabilities() {
        Ok(capabilities) => capabilities,
        Err(e) => {
            log::warn!(
                "[Lifecycle] Could not read reader capabilities, keeping default power: {}",
                e
            );
            return 0;
        }
    };

    let mut applied = 0;
    for &antenna in &config.antennas {
        let Some(index) = config
            .power_override(antenna)
            .or_else(|| capabilities.max_power_index(antenna))
        else {
            log::warn!("[Lifecycle] Reader advertises no power levels for antenna {}", antenna);
            continue;
        };
        match session.set_transmit_power(antenna, index) {
            Ok(()) => {
                log::debug!("[Lifecycle] Antenna {} power index {}", antenna, index);
                applied += 1;
            }
            Err(e) => log::warn!(
                "[Lifecycle] Failed to set power index {} on antenna {}: {}",
                index,
                antenna,
                e
            ),
        }
    }
    applied
}
