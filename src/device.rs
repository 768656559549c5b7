//! Legacy enumeration read models
//!
//! Plain data snapshots of adapters and display devices, re-derived from a
//! live enumeration on every query. Attachment is partitioned into the two
//! views at the bottom; validity is never stored on any of these types, it
//! is recomputed by [`DisplayTopologyReader`](crate::reader::DisplayTopologyReader)
//! against a fresh enumeration.

use serde::{Deserialize, Serialize};

use crate::identity::DeviceIdentity;
use crate::os::DeviceRecord;

/// A video controller as seen by the legacy per-device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAdapter {
    pub identity: DeviceIdentity,
}

impl DisplayAdapter {
    pub(crate) fn from_record(record: &DeviceRecord) -> Self {
        Self {
            identity: DeviceIdentity::new(
                record.device_id.clone(),
                record.device_string.clone(),
                record.device_key.clone(),
            ),
        }
    }
}

impl std::fmt::Display for DisplayAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity.name)
    }
}

/// A monitor endpoint reported under an adapter.
///
/// `is_available` is the attachment state at enumeration time, a transient
/// fact that is never cached beyond one enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDevice {
    pub identity: DeviceIdentity,
    pub adapter: DisplayAdapter,
    /// Source GDI name driving the device (`\\.\DISPLAY1`)
    pub display_name: String,
    /// Target device name (`\\.\DISPLAY1\Monitor0`)
    pub display_full_name: String,
    pub is_available: bool,
}

impl DisplayDevice {
    pub(crate) fn from_records(adapter: &DisplayAdapter, source: &DeviceRecord, target: &DeviceRecord) -> Self {
        Self {
            identity: DeviceIdentity::new(
                target.device_id.clone(),
                target.device_string.clone(),
                target.device_key.clone(),
            ),
            adapter: adapter.clone(),
            display_name: source.device_name.clone(),
            display_full_name: target.device_name.clone(),
            is_available: target.is_attached(),
        }
    }
}

impl std::fmt::Display for DisplayDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) - available: {}",
            self.display_full_name, self.identity.name, self.is_available
        )
    }
}

/// View over a [`DisplayDevice`] that was attached to the desktop when
/// enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub device: DisplayDevice,
}

impl Display {
    pub fn identity(&self) -> &DeviceIdentity {
        &self.device.identity
    }
}

/// View over a [`DisplayDevice`] that was detached when enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnattachedDisplay {
    pub device: DisplayDevice,
}

impl UnattachedDisplay {
    pub fn identity(&self) -> &DeviceIdentity {
        &self.device.identity
    }
}
