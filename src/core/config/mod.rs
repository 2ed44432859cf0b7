// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod app_config;
pub mod reader_config;

pub use app_config::{AppConfig, ConfigOverrides, ConnectionSettings, PipelineSettings};
pub use reader_config::{AntennaPower, ReaderConfig, TagContentSelector};
