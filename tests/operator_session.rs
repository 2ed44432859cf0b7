// SPDX-License-Identifier: MIT OR Apache-2.0

use rfid_inventory::core::driver::{
    ConnectionState, SimulatedDriver, SimulatedOperation, SimulatedReaderSettings,
};
use rfid_inventory::core::stream::output::sink::LogSink;
use rfid_inventory::{AppConfig, InventoryRuntime, Notice, RawTagReport};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn runtime(capacity: usize) -> (InventoryRuntime, LogSink, SimulatedDriver) {
    let mut config = AppConfig::default();
    config.connection.host = Some("192.168.1.100".to_string());
    config.pipeline.buffer_capacity = capacity;
    config.pipeline.poll_interval_ms = 10;

    let sink = LogSink::new();
    let runtime = InventoryRuntime::new(config, Arc::new(sink.clone())).unwrap();
    let driver = SimulatedDriver::new(SimulatedReaderSettings::manual());
    runtime.connect(&driver).unwrap();
    (runtime, sink, driver)
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !condition() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn scripted_session_start_state_stop_exit() {
    let (runtime, _sink, driver) = runtime(100);
    let mut output = Vec::new();

    runtime
        .dispatcher()
        .run(Cursor::new("start\nSTATE\n stop \nbogus\nexit\n"), &mut output)
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Started inventory."));
    assert!(output.contains("Reader state: INVENTORYING"));
    assert!(output.contains("Stopped inventory."));
    assert!(output.contains("Unknown command."));
    assert!(output.trim_end().ends_with("Reader disconnected."));
    assert_eq!(driver.handle().state(), ConnectionState::Disconnected);
    assert!(runtime.shutdown().is_some());
}

#[test]
fn clear_then_redetect_and_start_resets() {
    let (runtime, sink, driver) = runtime(100);
    let controller = runtime.controller();
    let buffer = runtime.buffer();
    let reader = driver.handle();

    assert_eq!(controller.start(), Notice::InventoryStarted);
    reader.inject(vec![
        RawTagReport::with_epc(b"A").seen_count(1),
        RawTagReport::with_epc(b"A").seen_count(2),
    ]);
    wait_until(|| runtime.metrics().map_or(false, |m| m.received == 2));
    assert_eq!(buffer.len(), 1);
    assert_eq!(controller.clear(), Notice::TagDataCleared { dropped: 1 });

    reader.inject(vec![RawTagReport::with_epc(b"A").seen_count(3)]);
    wait_until(|| sink.received().len() == 2);

    let records = buffer.snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].seen_count(), 3);

    // start always begins from an empty dedup state
    assert_eq!(controller.start(), Notice::InventoryStarted);
    assert!(buffer.is_empty());
    runtime.shutdown();
}

#[test]
fn eviction_keeps_epc_marked_as_seen() {
    let (runtime, sink, driver) = runtime(2);
    let reader = driver.handle();

    reader.inject(vec![
        RawTagReport::with_epc(b"A"),
        RawTagReport::with_epc(b"B"),
        RawTagReport::with_epc(b"C"),
    ]);
    wait_until(|| sink.received().len() == 3);
    reader.inject(vec![RawTagReport::with_epc(b"A")]);

    let stats = runtime.shutdown().unwrap();
    let buffer = runtime.buffer();
    let epcs: Vec<String> = buffer.snapshot().iter().map(|r| r.epc().to_string()).collect();
    assert_eq!(epcs, vec!["B".to_string(), "C".to_string()]);
    assert!(buffer.contains("A"));
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.duplicates, 1);
}

#[test]
fn failing_driver_surfaces_notice_and_keeps_running() {
    let (runtime, _sink, driver) = runtime(100);
    driver.handle().fail(SimulatedOperation::StopPolitely);

    let mut output = Vec::new();
    runtime
        .dispatcher()
        .run(Cursor::new("start\nstop\nstate\n"), &mut output)
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Failed to stop inventory"));
    assert!(output.contains("Reader state: INVENTORYING"));
    // end of input still disconnects even though the polite stop failed
    assert_eq!(driver.handle().state(), ConnectionState::Disconnected);
    runtime.shutdown();
}

#[test]
fn commands_race_with_tag_stream() {
    let (runtime, _sink, driver) = runtime(50);
    let controller = runtime.controller();
    let reader = driver.handle();
    controller.start();

    let feeder = thread::spawn(move || {
        for round in 0..200u32 {
            reader.inject(vec![RawTagReport::with_epc(format!("R{}", round % 80))]);
        }
    });
    for _ in 0..20 {
        controller.clear();
        controller.query_state();
    }
    feeder.join().unwrap();

    runtime.shutdown();
    let view = runtime.buffer().view();
    assert!(view.records.len() <= 50);
    for record in &view.records {
        assert!(view.seen.binary_search(&record.epc().to_string()).is_ok());
    }
}

#[test]
fn unreachable_reader_leaves_console_usable() {
    let mut config = AppConfig::default();
    config.connection.host = Some("192.168.1.250".to_string());
    config.pipeline.poll_interval_ms = 10;
    let runtime = InventoryRuntime::new(config, Arc::new(LogSink::new())).unwrap();
    let driver = SimulatedDriver::new(SimulatedReaderSettings::manual());
    driver.handle().fail(SimulatedOperation::Connect);

    let notice = runtime.connect_or_notify(&driver).unwrap();
    assert!(notice.is_failure());

    let mut output = Vec::new();
    runtime
        .dispatcher()
        .run(Cursor::new("start
stop
state
clear
exit
"), &mut output)
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert_eq!(output.matches("Reader not connected.").count(), 3);
    assert!(output.contains("Tag data cleared."));
    assert!(runtime.shutdown().is_some());
}
