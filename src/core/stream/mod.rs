// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod event_queue;
pub mod output;

pub use self::event_queue::{EventQueue, QueueProducer};
pub use self::output::{ConsoleSink, LogSink, NotificationSink};
