// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Tag Records
//!
//! Two shapes of the same detection:
//!
//! - [`RawTagReport`] is what a reader driver hands over on its callback thread.
//!   Every field is optional because the tag content selector decides what the
//!   reader includes, and a corrupt frame may omit anything.
//! - [`TagRecord`] is the decoded, immutable record the dedup stage works with.
//!   Decoding happens on the ingestion worker, never on the driver thread.

use std::fmt;

use crate::core::error::{InventoryError, InventoryResult};

/// Where a record's last-seen timestamp comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Use `LastSeenTimestampUTC` from the report, local clock if absent
    #[default]
    Reader,
    /// Always stamp with the local wall clock at decode time
    Local,
}

/// One per-tag entry of a driver tag report batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTagReport {
    pub epc: Option<Vec<u8>>,
    pub antenna_id: Option<u16>,
    pub channel_index: Option<u16>,
    pub peak_rssi: Option<i8>,
    /// Microseconds since the Unix epoch
    pub last_seen_timestamp_utc: Option<u64>,
    pub tag_seen_count: Option<u32>,
}

impl RawTagReport {
    /// Report carrying only an EPC
    pub fn with_epc(epc: impl AsRef<[u8]>) -> Self {
        Self {
            epc: Some(epc.as_ref().to_vec()),
            ..Self::default()
        }
    }

    pub fn channel(mut self, channel_index: u16) -> Self {
        self.channel_index = Some(channel_index);
        self
    }

    pub fn antenna(mut self, antenna_id: u16) -> Self {
        self.antenna_id = Some(antenna_id);
        self
    }

    pub fn rssi(mut self, peak_rssi: i8) -> Self {
        self.peak_rssi = Some(peak_rssi);
        self
    }

    pub fn last_seen(mut self, timestamp_us: u64) -> Self {
        self.last_seen_timestamp_utc = Some(timestamp_us);
        self
    }

    pub fn seen_count(mut self, count: u32) -> Self {
        self.tag_seen_count = Some(count);
        self
    }
}

/// A decoded tag detection. Identity is the EPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    epc: String,
    antenna_id: Option<u16>,
    channel: Option<u16>,
    peak_rssi: Option<i8>,
    last_seen: u64,
    seen_count: u32,
}

impl TagRecord {
    /// Build a record directly. The EPC must already be canonical.
    pub fn new(epc: impl Into<String>, channel: Option<u16>, last_seen: u64, seen_count: u32) -> Self {
        Self {
            epc: epc.into(),
            antenna_id: None,
            channel,
            peak_rssi: None,
            last_seen,
            seen_count,
        }
    }

    /// Decode a raw report.
    ///
    /// The EPC bytes must be non-empty ASCII; surrounding whitespace is trimmed.
    /// A missing seen-count is treated as a single sighting.
    pub fn decode(raw: &RawTagReport, timestamps: TimestampSource) -> InventoryResult<Self> {
        let bytes = raw
            .epc
            .as_deref()
            .ok_or_else(|| InventoryError::malformed_record("report has no EPC field"))?;

        if !bytes.is_ascii() {
            return Err(InventoryError::malformed_record(format!(
                "EPC is not ASCII ({} bytes)",
                bytes.len()
            )));
        }

        // is_ascii() above guarantees valid UTF-8
        let epc = std::str::from_utf8(bytes)
            .map_err(|e| InventoryError::malformed_record(format!("EPC decode failed: {e}")))?
            .trim();
        if epc.is_empty() {
            return Err(InventoryError::malformed_record("EPC is empty"));
        }

        let last_seen = match (timestamps, raw.last_seen_timestamp_utc) {
            (TimestampSource::Reader, Some(ts)) => ts,
            _ => local_timestamp_us(),
        };

        Ok(Self {
            epc: epc.to_string(),
            antenna_id: raw.antenna_id,
            channel: raw.channel_index,
            peak_rssi: raw.peak_rssi,
            last_seen,
            seen_count: raw.tag_seen_count.unwrap_or(1),
        })
    }

    #[inline]
    pub fn epc(&self) -> &str {
        &self.epc
    }

    #[inline]
    pub fn antenna_id(&self) -> Option<u16> {
        self.antenna_id
    }

    #[inline]
    pub fn channel(&self) -> Option<u16> {
        self.channel
    }

    #[inline]
    pub fn peak_rssi(&self) -> Option<i8> {
        self.peak_rssi
    }

    /// Microseconds since the Unix epoch
    #[inline]
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    #[inline]
    pub fn seen_count(&self) -> u32 {
        self.seen_count
    }
}

/// Operator-facing notification line
impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPC: {} | Ch: ", self.epc)?;
        match self.channel {
            Some(ch) => write!(f, "{ch}")?,
            None => f.write_str("-")?,
        }
        write!(f, " | Seen: {}x | Time: {}", self.seen_count, self.last_seen)
    }
}

fn local_timestamp_us() -> u64 {
    // Pre-epoch clocks clamp to zero
    u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_report() {
        let raw = RawTagReport::with_epc(b"300833b2ddd9014000000000")
            .antenna(1)
            .channel(7)
            .rssi(-52)
            .last_seen(1_700_000_000_000_000)
            .seen_count(4);

        let record = TagRecord::decode(&raw, TimestampSource::Reader).unwrap();
        assert_eq!(record.epc(), "300833b2ddd9014000000000");
        assert_eq!(record.antenna_id(), Some(1));
        assert_eq!(record.channel(), Some(7));
        assert_eq!(record.peak_rssi(), Some(-52));
        assert_eq!(record.last_seen(), 1_700_000_000_000_000);
        assert_eq!(record.seen_count(), 4);
    }

    #[test]
    fn test_decode_trims_epc() {
        let raw = RawTagReport::with_epc(b"  E200 \n").last_seen(5);
        let record = TagRecord::decode(&raw, TimestampSource::Reader).unwrap();
        assert_eq!(record.epc(), "E200");
    }

    #[test]
    fn test_missing_epc_is_malformed() {
        let raw = RawTagReport::default().channel(3);
        let err = TagRecord::decode(&raw, TimestampSource::Reader).unwrap_err();
        assert!(matches!(err, InventoryError::MalformedRecord { .. }));
    }

    #[test]
    fn test_non_ascii_epc_is_malformed() {
        let raw = RawTagReport::with_epc([0xE2, 0x80, 0xFF]);
        let err = TagRecord::decode(&raw, TimestampSource::Reader).unwrap_err();
        assert!(err.to_string().contains("not ASCII"));
    }

    #[test]
    fn test_blank_epc_is_malformed() {
        let raw = RawTagReport::with_epc(b"   ");
        assert!(TagRecord::decode(&raw, TimestampSource::Reader).is_err());
    }

    #[test]
    fn test_missing_timestamp_falls_back_to_local_clock() {
        let before = local_timestamp_us();
        let raw = RawTagReport::with_epc(b"AA");
        let record = TagRecord::decode(&raw, TimestampSource::Reader).unwrap();
        assert!(record.last_seen() >= before);
        assert_eq!(record.seen_count(), 1);
    }

    #[test]
    fn test_local_timestamp_source_ignores_reader_clock() {
        let raw = RawTagReport::with_epc(b"AA").last_seen(42);
        let record = TagRecord::decode(&raw, TimestampSource::Local).unwrap();
        assert_ne!(record.last_seen(), 42);
    }

    #[test]
    fn test_display_line() {
        let record = TagRecord::new("ABC", Some(2), 99, 3);
        assert_eq!(record.to_string(), "EPC: ABC | Ch: 2 | Seen: 3x | Time: 99");

        let no_channel = TagRecord::new("ABC", None, 99, 1);
        assert_eq!(no_channel.to_string(), "EPC: ABC | Ch: - | Seen: 1x | Time: 99");
    }
}
