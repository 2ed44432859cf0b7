// SPDX-License-Identifier: MIT OR Apache-2.0

//! Settings handed to a reader driver at connect time

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::{InventoryError, InventoryResult};

/// Optional per-tag fields the reader is asked to include in every report
pub const DEFAULT_TAG_CONTENT: &[(&str, bool)] = &[
    ("EnableROSpecID", false),
    ("EnableSpecIndex", false),
    ("EnableInventoryParameterSpecID", false),
    ("EnableAntennaID", true),
    ("EnableChannelIndex", false),
    ("EnablePeakRSSI", true),
    ("EnableFirstSeenTimestamp", false),
    ("EnableLastSeenTimestamp", true),
    ("EnableTagSeenCount", true),
    ("EnableAccessSpecID", false),
];

/// Field-name → enabled mapping for tag report contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagContentSelector(BTreeMap<String, bool>);

impl Default for TagContentSelector {
    fn default() -> Self {
        Self(
            DEFAULT_TAG_CONTENT
                .iter()
                .map(|(name, enabled)| (name.to_string(), *enabled))
                .collect(),
        )
    }
}

impl TagContentSelector {
    /// Unknown fields count as disabled
    pub fn is_enabled(&self, field: &str) -> bool {
        self.0.get(field).copied().unwrap_or(false)
    }

    pub fn set(&mut self, field: impl Into<String>, enabled: bool) {
        self.0.insert(field.into(), enabled);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }
}

/// Explicit transmit power for one antenna
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntennaPower {
    pub antenna: u16,
    pub power_index: u16,
}

/// Driver connect configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    pub reset_on_connect: bool,
    pub start_inventory_on_connect: bool,
    pub antennas: BTreeSet<u16>,
    pub report_every_n_tags: u32,
    pub session: u8,
    pub tag_content_selector: TagContentSelector,
    /// Antennas not listed here get the maximum power the reader advertises
    pub tx_power: Vec<AntennaPower>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            reset_on_connect: true,
            start_inventory_on_connect: false,
            antennas: [1, 2].into_iter().collect(),
            report_every_n_tags: 1,
            session: 2,
            tag_content_selector: TagContentSelector::default(),
            tx_power: Vec::new(),
        }
    }
}

impl ReaderConfig {
    /// Explicit power override for `antenna`, if configured
    pub fn power_override(&self, antenna: u16) -> Option<u16> {
        self.tx_power
            .iter()
            .find(|entry| entry.antenna == antenna)
            .map(|entry| entry.power_index)
    }

    pub fn validate(&self) -> InventoryResult<()> {
        if self.antennas.is_empty() {
            return Err(InventoryError::configuration_with_key(
                "at least one antenna must be enabled",
                "reader.antennas",
            ));
        }
        if self.antennas.contains(&0) {
            return Err(InventoryError::configuration_with_key(
                "antenna ids start at 1",
                "reader.antennas",
            ));
        }
        if self.report_every_n_tags == 0 {
            return Err(InventoryError::configuration_with_key(
                "report_every_n_tags must be at least 1",
                "reader.report_every_n_tags",
            ));
        }
        if self.session > 3 {
            return Err(InventoryError::configuration_with_key(
                format!("session must be 0-3, got {}", self.session),
                "reader.session",
            ));
        }
        for entry in &self.tx_power {
            if !self.antennas.contains(&entry.antenna) {
                return Err(InventoryError::configuration_with_key(
                    format!("tx_power set for antenna {} which is not enabled", entry.antenna),
                    "reader.tx_power",
                ));
            }
        }
        Ok(())
    }
}
