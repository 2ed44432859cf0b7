// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod console_sink;
pub mod log_sink;
pub mod sink_trait;

pub use console_sink::ConsoleSink;
pub use log_sink::LogSink;
pub use sink_trait::NotificationSink;
