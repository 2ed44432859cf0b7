// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod sink;

pub use self::sink::{ConsoleSink, LogSink, NotificationSink};
