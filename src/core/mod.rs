// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod command;
pub mod config;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod event;
pub mod ingestion;
pub mod inventory_runtime;
pub mod lifecycle;
pub mod stream;
pub mod util;

pub use self::inventory_runtime::InventoryRuntime;
