// SPDX-License-Identifier: MIT OR Apache-2.0

use rfid_inventory::core::dedup::DedupBuffer;
use rfid_inventory::core::driver::{
    ConnectionEventLogger, DriverCallbacks, ReaderDriver, SimulatedDriver, SimulatedReaderSettings,
    TagReportEnqueuer,
};
use rfid_inventory::core::ingestion::{IngestionLoop, IngestionSettings};
use rfid_inventory::core::stream::output::sink::{ConsoleSink, LogSink, NotificationSink};
use rfid_inventory::core::stream::EventQueue;
use rfid_inventory::{RawTagReport, ReaderConfig, TimestampSource};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn settings() -> IngestionSettings {
    IngestionSettings {
        poll_interval: Duration::from_millis(10),
        ..IngestionSettings::default()
    }
}

fn wait_for(sink: &LogSink, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while sink.received().len() < count && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

fn callbacks(queue: &EventQueue<RawTagReport>) -> DriverCallbacks {
    DriverCallbacks {
        tag_report: Arc::new(TagReportEnqueuer::new(queue.producer())),
        connection_event: Arc::new(ConnectionEventLogger),
    }
}

#[test]
fn simulated_reader_to_log_sink() {
    let queue = Arc::new(EventQueue::new());
    let buffer = Arc::new(DedupBuffer::new(100).unwrap());
    let sink = LogSink::new();
    let ingestion = IngestionLoop::spawn(
        Arc::clone(&queue),
        Arc::clone(&buffer),
        Arc::new(sink.clone()),
        settings(),
    )
    .unwrap();

    let driver = SimulatedDriver::new(SimulatedReaderSettings::manual());
    let _session = driver
        .connect("127.0.0.1", 5084, &ReaderConfig::default(), callbacks(&queue))
        .unwrap();
    let reader = driver.handle();

    reader.inject(vec![
        RawTagReport::with_epc(b"E200001").channel(7).seen_count(3).last_seen(1_000),
        RawTagReport::with_epc(b"E200002").last_seen(2_000),
    ]);
    reader.inject(vec![RawTagReport::with_epc(b"E200001").last_seen(3_000)]);
    wait_for(&sink, 2);

    let stats = ingestion.shutdown();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.duplicates, 1);

    let records = sink.received();
    assert_eq!(records[0].epc(), "E200001");
    assert_eq!(records[0].channel(), Some(7));
    assert_eq!(records[0].seen_count(), 3);
    assert_eq!(records[0].last_seen(), 1_000);
    assert_eq!(records[1].seen_count(), 1);
    assert_eq!(buffer.len(), 2);
}

#[test]
fn concurrent_callbacks_accept_each_epc_once() {
    let queue = Arc::new(EventQueue::new());
    let buffer = Arc::new(DedupBuffer::new(1000).unwrap());
    let sink = LogSink::new();
    let ingestion = IngestionLoop::spawn(
        Arc::clone(&queue),
        Arc::clone(&buffer),
        Arc::new(sink.clone()),
        settings(),
    )
    .unwrap();

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let enqueuer = TagReportEnqueuer::new(queue.producer());
            thread::spawn(move || {
                use rfid_inventory::core::driver::TagReportCallback;
                for round in 0..5 {
                    let batch = (0..50)
                        .map(|i| RawTagReport::with_epc(format!("EPC{:03}", i)).seen_count(round + 1))
                        .collect();
                    enqueuer.on_tag_report(batch);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    wait_for(&sink, 50);

    let stats = ingestion.shutdown();
    assert_eq!(stats.received, 4 * 5 * 50);
    assert_eq!(stats.accepted, 50);
    let mut epcs = sink.received_epcs();
    epcs.sort();
    epcs.dedup();
    assert_eq!(epcs.len(), 50);
}

#[test]
fn malformed_reports_are_skipped() {
    let queue = Arc::new(EventQueue::new());
    let buffer = Arc::new(DedupBuffer::new(10).unwrap());
    let sink = LogSink::new();
    let ingestion = IngestionLoop::spawn(
        Arc::clone(&queue),
        buffer,
        Arc::new(sink.clone()),
        IngestionSettings {
            timestamps: TimestampSource::Local,
            ..settings()
        },
    )
    .unwrap();

    queue.enqueue(RawTagReport::default());
    queue.enqueue(RawTagReport::with_epc([0xFFu8, 0xFE]));
    queue.enqueue(RawTagReport::with_epc(b"   "));
    queue.enqueue(RawTagReport::with_epc(b"GOOD"));
    wait_for(&sink, 1);

    let stats = ingestion.shutdown();
    assert_eq!(stats.malformed, 3);
    assert_eq!(sink.received_epcs(), vec!["GOOD".to_string()]);
    assert!(sink.received()[0].last_seen() > 0);
}

#[test]
fn queued_reports_are_drained_on_shutdown() {
    let queue = Arc::new(EventQueue::new());
    for i in 0..20 {
        queue.enqueue(RawTagReport::with_epc(format!("T{}", i)));
    }
    let sink = LogSink::new();
    let ingestion = IngestionLoop::spawn(
        Arc::clone(&queue),
        Arc::new(DedupBuffer::new(5).unwrap()),
        Arc::new(sink.clone()),
        settings(),
    )
    .unwrap();

    let stats = ingestion.shutdown();
    assert_eq!(stats.accepted, 20);
    assert!(queue.is_empty());
    assert_eq!(sink.received().len(), 20);
}

#[test]
fn console_sink_line_format() {
    let sink = ConsoleSink::new(Vec::new());
    let record = rfid_inventory::TagRecord::new("ABC123", None, 1_700_000_000, 2);
    sink.notify(&record).unwrap();
    let record = rfid_inventory::TagRecord::new("DEF456", Some(12), 5, 1);
    sink.notify(&record).unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        output,
        "New tag: EPC: ABC123 | Ch: - | Seen: 2x | Time: 1700000000\n\
         New tag: EPC: DEF456 | Ch: 12 | Seen: 1x | Time: 5\n"
    );
}
