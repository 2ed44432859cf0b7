// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Simulated Reader
//!
//! In-process stand-in for a physical reader. It speaks the same driver
//! traits as a real one: connect hands back a [`ReaderSession`], tag reports
//! arrive on a reporter thread owned by the "device", and connection events
//! are emitted for every state change.
//!
//! While inventorying, the reporter thread emits one batch of
//! `report_every_n_tags` random reports from the configured tag population
//! per `report_interval`. Only fields enabled in the tag content selector are
//! filled in.
//!
//! The [`SimulatedReader`] handle stays with the caller after the session is
//! handed out, so tests can inject batches, force individual operations to
//! fail and inspect what the controller asked of the device.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{
    ConnectionAttemptStatus, ConnectionEvent, ConnectionState, DriverCallbacks, PowerLevel,
    ReaderCapabilities, ReaderDriver, ReaderSession,
};
use crate::core::config::ReaderConfig;
use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::RawTagReport;

/// Device operations that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOperation {
    Connect,
    StartInventory,
    StopPolitely,
    Capabilities,
    SetTransmitPower,
    Disconnect,
}

impl SimulatedOperation {
    fn name(&self) -> &'static str {
        match self {
            SimulatedOperation::Connect => "connect",
            SimulatedOperation::StartInventory => "start_inventory",
            SimulatedOperation::StopPolitely => "stop_politely",
            SimulatedOperation::Capabilities => "capabilities",
            SimulatedOperation::SetTransmitPower => "set_transmit_power",
            SimulatedOperation::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedReaderSettings {
    pub model: String,
    /// EPCs the reporter thread draws from
    pub tag_population: Vec<String>,
    pub report_interval: Duration,
    /// Power table advertised for every antenna
    pub power_levels: Vec<PowerLevel>,
    /// When false the reporter thread stays idle and only injected batches are delivered
    pub autonomous: bool,
}

impl Default for SimulatedReaderSettings {
    fn default() -> Self {
        Self {
            model: "Simulated R420".to_string(),
            tag_population: (0..24)
                .map(|i| format!("300833B2DDD901400000{:04X}", i))
                .collect(),
            report_interval: Duration::from_millis(250),
            power_levels: (1..=81)
                .map(|index| PowerLevel {
                    index,
                    dbm: 10.0 + 0.25 * f32::from(index - 1),
                })
                .collect(),
            autonomous: true,
        }
    }
}

impl SimulatedReaderSettings {
    /// Settings for a reader that reports only what is injected
    pub fn manual() -> Self {
        Self {
            autonomous: false,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    state: ConnectionState,
    peer: Option<String>,
    callbacks: Option<DriverCallbacks>,
    config: ReaderConfig,
    tx_power: BTreeMap<u16, u16>,
    failures: HashSet<SimulatedOperation>,
    calls: Vec<SimulatedOperation>,
}

/// Shared device state behind a simulated session
#[derive(Debug)]
pub struct SimulatedReader {
    settings: SimulatedReaderSettings,
    device: Mutex<DeviceState>,
    reporting: Arc<AtomicBool>,
    reporter: Mutex<Option<JoinHandle<()>>>,
    /// Held for the whole of a batch delivery
    batch_lock: Mutex<()>,
    reports_sent: AtomicU64,
}

impl SimulatedReader {
    pub fn new(settings: SimulatedReaderSettings) -> Self {
        Self {
            settings,
            device: Mutex::new(DeviceState {
                state: ConnectionState::Disconnected,
                peer: None,
                callbacks: None,
                config: ReaderConfig::default(),
                tx_power: BTreeMap::new(),
                failures: HashSet::new(),
                calls: Vec::new(),
            }),
            reporting: Arc::new(AtomicBool::new(false)),
            reporter: Mutex::new(None),
            batch_lock: Mutex::new(()),
            reports_sent: AtomicU64::new(0),
        }
    }

    fn device(&self) -> MutexGuard<'_, DeviceState> {
        self.device.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent call of `operation` fail
    pub fn fail(&self, operation: SimulatedOperation) {
        self.device().failures.insert(operation);
    }

    pub fn recover(&self, operation: SimulatedOperation) {
        self.device().failures.remove(&operation);
    }

    pub fn state(&self) -> ConnectionState {
        self.device().state
    }

    /// Power index currently applied per antenna
    pub fn transmit_power(&self) -> BTreeMap<u16, u16> {
        self.device().tx_power.clone()
    }

    /// Every device operation attempted so far, in order
    pub fn calls(&self) -> Vec<SimulatedOperation> {
        self.device().calls.clone()
    }

    pub fn reports_sent(&self) -> u64 {
        self.reports_sent.load(Ordering::Relaxed)
    }

    /// Deliver `batch` through the tag report callback on the calling thread.
    ///
    /// Returns false when no client is connected.
    pub fn inject(&self, batch: Vec<RawTagReport>) -> bool {
        let _batch = self.batch_lock.lock().unwrap_or_else(|e| e.into_inner());
        let callbacks = self.device().callbacks.clone();
        match callbacks {
            Some(callbacks) => {
                self.reports_sent
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                callbacks.tag_report.on_tag_report(batch);
                true
            }
            None => false,
        }
    }

    /// Simulate the link dropping: the session reports `Error` from now on
    pub fn drop_connection(&self) {
        self.halt_reporter();
        self.transition(ConnectionState::Error);
        self.emit(ConnectionEvent::Other("connection lost".to_string()));
    }

    /// Record the call and fail it if forced to
    fn check(&self, operation: SimulatedOperation) -> InventoryResult<()> {
        let mut device = self.device();
        device.calls.push(operation);
        if device.failures.contains(&operation) {
            return Err(InventoryError::driver_call(
                operation.name(),
                "simulated device failure",
            ));
        }
        Ok(())
    }

    fn emit(&self, event: ConnectionEvent) {
        let callbacks = self.device().callbacks.clone();
        if let Some(callbacks) = callbacks {
            callbacks.connection_event.on_connection_event(event);
        }
    }

    fn transition(&self, to: ConnectionState) {
        let from = {
            let mut device = self.device();
            std::mem::replace(&mut device.state, to)
        };
        if from != to {
            self.emit(ConnectionEvent::StateChanged { from, to });
        }
    }

    fn attach(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        config: &ReaderConfig,
        callbacks: DriverCallbacks,
    ) -> InventoryResult<()> {
        let address = format!("{}:{}", host, port);
        let already_connected = {
            let mut device = self.device();
            device.calls.push(SimulatedOperation::Connect);
            if device.failures.contains(&SimulatedOperation::Connect) {
                return Err(InventoryError::connect(address, "connection refused"));
            }
            device.callbacks.is_some()
        };
        if already_connected {
            callbacks.connection_event.on_connection_event(ConnectionEvent::ConnectionAttempt(
                ConnectionAttemptStatus::FailedClientInitiatedConnectionExists,
            ));
            return Err(InventoryError::connect(
                address,
                "reader already has a client connection",
            ));
        }

        {
            let mut device = self.device();
            device.peer = Some(address);
            device.callbacks = Some(callbacks);
            device.config = config.clone();
            if config.reset_on_connect {
                device.tx_power.clear();
            }
        }
        self.emit(ConnectionEvent::ConnectionAttempt(ConnectionAttemptStatus::Success));
        self.transition(ConnectionState::Connecting);
        self.transition(ConnectionState::Connected);

        if config.start_inventory_on_connect {
            self.start_reporting()?;
        }
        Ok(())
    }

    fn start_reporting(self: &Arc<Self>) -> InventoryResult<()> {
        self.check(SimulatedOperation::StartInventory)?;
        if !self.state().is_alive() {
            return Err(InventoryError::NotConnected);
        }
        if self.reporting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.settings.autonomous {
            let reader = Arc::clone(self);
            let running = Arc::clone(&self.reporting);
            let interval = self.settings.report_interval;
            let worker = thread::Builder::new()
                .name("simulated-reader".to_string())
                .spawn(move || {
                    while running.load(Ordering::SeqCst) {
                        thread::park_timeout(interval);
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let batch = reader.random_batch();
                        reader.inject(batch);
                    }
                })
                .map_err(|e| {
                    self.reporting.store(false, Ordering::SeqCst);
                    InventoryError::from(e)
                })?;
            *self.reporter.lock().unwrap_or_else(|e| e.into_inner()) = Some(worker);
        }
        self.transition(ConnectionState::Inventorying);
        Ok(())
    }

    /// Stop the reporter thread and wait for an in-flight batch to finish
    fn halt_reporter(&self) {
        self.reporting.store(false, Ordering::SeqCst);
        let worker = self
            .reporter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            worker.thread().unpark();
            if worker.join().is_err() {
                log::error!("[SimulatedReader] Reporter thread panicked");
            }
        }
        drop(self.batch_lock.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn random_batch(&self) -> Vec<RawTagReport> {
        let config = self.device().config.clone();
        let selector = &config.tag_content_selector;
        let antennas: Vec<u16> = config.antennas.iter().copied().collect();
        let mut rng = rand::thread_rng();

        let mut batch = Vec::with_capacity(config.report_every_n_tags as usize);
        for _ in 0..config.report_every_n_tags {
            let Some(epc) = self.settings.tag_population.choose(&mut rng) else {
                break;
            };
            let mut report = RawTagReport::with_epc(epc.as_bytes());
            if selector.is_enabled("EnableAntennaID") {
                report.antenna_id = antennas.choose(&mut rng).copied();
            }
            if selector.is_enabled("EnableChannelIndex") {
                report.channel_index = Some(rng.gen_range(1..=50));
            }
            if selector.is_enabled("EnablePeakRSSI") {
                report.peak_rssi = Some(rng.gen_range(-75..=-30));
            }
            if selector.is_enabled("EnableLastSeenTimestamp") {
                report.last_seen_timestamp_utc =
                    u64::try_from(chrono::Utc::now().timestamp_micros()).ok();
            }
            if selector.is_enabled("EnableTagSeenCount") {
                report.tag_seen_count = Some(rng.gen_range(1..=4));
            }
            batch.push(report);
        }
        batch
    }

    fn capabilities(&self) -> ReaderCapabilities {
        let config = self.device().config.clone();
        ReaderCapabilities {
            model: self.settings.model.clone(),
            antenna_power_levels: config
                .antennas
                .iter()
                .map(|antenna| (*antenna, self.settings.power_levels.clone()))
                .collect(),
        }
    }
}

/// Session handed out by [`SimulatedDriver::connect`]
#[derive(Debug)]
pub struct SimulatedSession {
    reader: Arc<SimulatedReader>,
}

impl ReaderSession for SimulatedSession {
    fn start_inventory(&self) -> InventoryResult<()> {
        self.reader.start_reporting()
    }

    fn stop_politely(&self) -> InventoryResult<()> {
        self.reader.check(SimulatedOperation::StopPolitely)?;
        self.reader.halt_reporter();
        if self.reader.state() == ConnectionState::Inventorying {
            self.reader.transition(ConnectionState::Connected);
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.reader.state()
    }

    fn capabilities(&self) -> InventoryResult<ReaderCapabilities> {
        self.reader.check(SimulatedOperation::Capabilities)?;
        Ok(self.reader.capabilities())
    }

    fn set_transmit_power(&self, antenna: u16, power_index: u16) -> InventoryResult<()> {
        self.reader.check(SimulatedOperation::SetTransmitPower)?;
        if !self.reader.capabilities().supports_power_index(antenna, power_index) {
            return Err(InventoryError::driver_call(
                "set_transmit_power",
                format!("antenna {} has no power index {}", antenna, power_index),
            ));
        }
        self.reader.device().tx_power.insert(antenna, power_index);
        Ok(())
    }

    fn disconnect(&self) -> InventoryResult<()> {
        self.reader.check(SimulatedOperation::Disconnect)?;
        self.reader.halt_reporter();
        self.reader.transition(ConnectionState::Disconnected);
        let mut device = self.reader.device();
        device.callbacks = None;
        device.peer = None;
        Ok(())
    }

    fn peer(&self) -> String {
        self.reader.device().peer.clone().unwrap_or_default()
    }
}

/// Driver registered as `simulated`
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    reader: Arc<SimulatedReader>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(SimulatedReaderSettings::default())
    }
}

impl SimulatedDriver {
    pub fn new(settings: SimulatedReaderSettings) -> Self {
        Self {
            reader: Arc::new(SimulatedReader::new(settings)),
        }
    }

    /// The device behind every session this driver hands out
    pub fn handle(&self) -> Arc<SimulatedReader> {
        Arc::clone(&self.reader)
    }
}

impl ReaderDriver for SimulatedDriver {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn connect(
        &self,
        host: &str,
        port: u16,
        config: &ReaderConfig,
        callbacks: DriverCallbacks,
    ) -> InventoryResult<Box<dyn ReaderSession>> {
        self.reader.attach(host, port, config, callbacks)?;
        log::info!(
            "[SimulatedReader] Connected to {}:{} ({})",
            host,
            port,
            self.reader.settings.model
        );
        Ok(Box::new(SimulatedSession {
            reader: Arc::clone(&self.reader),
        }))
    }
}
