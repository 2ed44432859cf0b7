// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod tag_record;

pub use tag_record::{RawTagReport, TagRecord, TimestampSource};
