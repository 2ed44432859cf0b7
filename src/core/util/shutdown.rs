// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown handling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;

/// Shutdown coordinator
///
/// Owns the flag; workers poll it through a [`ShutdownHandle`].
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    shutdown_flag: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }

    /// Raise the flag. Returns `true` for the first caller only.
    pub fn shutdown(&self) -> bool {
        !self.shutdown_flag.swap(true, Ordering::AcqRel)
    }

    /// Resolve once ctrl-c is received, raising the flag
    pub async fn wait_for_shutdown_signal(&self) {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("[Shutdown] Failed to listen for shutdown signal: {}", e);
            return;
        }
        log::info!("[Shutdown] Interrupt received");
        self.shutdown();
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown_flag),
        }
    }
}

/// Handle for checking shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
