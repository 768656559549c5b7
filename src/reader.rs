//! Topology reader service
//!
//! `DisplayTopologyReader` is the stateless query surface over the OS
//! capability traits. Every call is a fresh, blocking round-trip: nothing is
//! cached, and validity of any previously obtained entity is recomputed from
//! a live re-enumeration because attachment can change asynchronously
//! between calls (monitor plugged or unplugged).

use std::collections::HashMap;

use tracing::debug;

use crate::constants::enum_flags;
use crate::device::{Display, DisplayAdapter, DisplayDevice, UnattachedDisplay};
use crate::error::{DisplayError, DisplayResult};
use crate::gamma::GammaRamp;
use crate::identity::DeviceIdentity;
use crate::os::{DeviceContextApi, DisplayConfigApi, RegistryApi};
use crate::registry::RegistryAddress;

/// Stateless reader over the display subsystem capabilities.
///
/// Hold one per call site or share a single instance; there is no state to
/// invalidate either way.
pub struct DisplayTopologyReader<'a> {
    pub(crate) device_context: &'a dyn DeviceContextApi,
    pub(crate) display_config: &'a dyn DisplayConfigApi,
    pub(crate) registry: &'a dyn RegistryApi,
}

impl<'a> DisplayTopologyReader<'a> {
    pub fn new(
        device_context: &'a dyn DeviceContextApi,
        display_config: &'a dyn DisplayConfigApi,
        registry: &'a dyn RegistryApi,
    ) -> Self {
        Self {
            device_context,
            display_config,
            registry,
        }
    }

    /// All display adapters on this machine, deduplicated by first-seen
    /// device path.
    pub fn display_adapters(&self) -> Vec<DisplayAdapter> {
        let mut seen_paths: Vec<String> = Vec::new();
        let mut adapters = Vec::new();
        for index in 0u32.. {
            let Some(record) = self.device_context.enum_display_devices(None, index, 0) else {
                break;
            };
            if !seen_paths.contains(&record.device_id) {
                seen_paths.push(record.device_id.clone());
                adapters.push(DisplayAdapter::from_record(&record));
            }
        }
        debug!(count = adapters.len(), "enumerated display adapters");
        adapters
    }

    /// Display devices connected to an adapter.
    ///
    /// `attached` filters the result: `Some(true)` keeps at most one device
    /// per device path and stops scanning a source on its first attached
    /// hit; `Some(false)` applies the unattached rule below; `None` returns
    /// every raw row.
    ///
    /// Unattached rule: within one source's rows, an attached row for a
    /// monitor discards any unattached candidate for it (the target is in
    /// use, not available) and ends the scan; otherwise the last unattached
    /// row for the identity wins. The OS can return stale duplicate rows for
    /// one physical identity, and this tie-break tolerates them.
    pub fn display_devices(&self, adapter: &DisplayAdapter, attached: Option<bool>) -> Vec<DisplayDevice> {
        let mut returned: HashMap<String, String> = HashMap::new();
        let mut devices = Vec::new();
        for index in 0u32.. {
            let Some(source) = self.device_context.enum_display_devices(None, index, 0) else {
                break;
            };
            if source.device_id != adapter.identity.path {
                continue;
            }
            let mut candidate: Option<DisplayDevice> = None;
            for monitor_index in 0u32.. {
                let Some(monitor) = self.device_context.enum_display_devices(
                    Some(&source.device_name),
                    monitor_index,
                    enum_flags::GET_DEVICE_INTERFACE_NAME,
                ) else {
                    break;
                };
                match attached {
                    None => devices.push(DisplayDevice::from_records(adapter, &source, &monitor)),
                    Some(true) => {
                        if monitor.is_attached() && !returned.contains_key(&monitor.device_id) {
                            returned.insert(monitor.device_id.clone(), monitor.device_key.clone());
                            devices.push(DisplayDevice::from_records(adapter, &source, &monitor));
                            break;
                        }
                    }
                    Some(false) => {
                        if monitor.is_attached() {
                            candidate = None;
                            break;
                        }
                        if returned
                            .get(&monitor.device_id)
                            .map_or(true, |key| key != &monitor.device_key)
                        {
                            candidate = Some(DisplayDevice::from_records(adapter, &source, &monitor));
                        }
                    }
                }
            }
            if let Some(device) = candidate {
                returned.insert(device.identity.path.clone(), device.identity.registry_key.clone());
                devices.push(device);
            }
        }
        devices
    }

    /// All displays currently attached to the desktop.
    pub fn displays(&self) -> Vec<Display> {
        self.display_adapters()
            .iter()
            .flat_map(|adapter| self.display_devices(adapter, Some(true)))
            .filter(|device| device.is_available)
            .map(|device| Display { device })
            .collect()
    }

    /// All displays known to the machine but not attached to the desktop.
    pub fn unattached_displays(&self) -> Vec<UnattachedDisplay> {
        self.display_adapters()
            .iter()
            .flat_map(|adapter| self.display_devices(adapter, Some(false)))
            .map(|device| UnattachedDisplay { device })
            .collect()
    }

    /// A display is valid iff a fresh enumeration still reports a device
    /// with the same `(path, registry_key)` as attached.
    pub fn is_display_valid(&self, display: &Display) -> bool {
        self.displays()
            .iter()
            .any(|current| current.identity() == display.identity())
    }

    /// An unattached display is valid iff a fresh enumeration still reports
    /// it as not attached.
    pub fn is_unattached_valid(&self, display: &UnattachedDisplay) -> bool {
        self.unattached_displays()
            .iter()
            .any(|current| current.identity() == display.identity())
    }

    /// The unattached counterpart of a display that has gone invalid due to
    /// detachment. `None` while the display is still valid.
    pub fn to_unattached_display(&self, display: &Display) -> Option<UnattachedDisplay> {
        if self.is_display_valid(display) {
            return None;
        }
        self.unattached_displays()
            .into_iter()
            .find(|candidate| candidate.identity() == display.identity())
    }

    /// The attached counterpart of an unattached display that has gone
    /// invalid due to attachment. `None` while it is still unattached.
    pub fn to_display(&self, display: &UnattachedDisplay) -> Option<Display> {
        if self.is_unattached_valid(display) {
            return None;
        }
        self.displays()
            .into_iter()
            .find(|candidate| candidate.identity() == display.identity())
    }

    /// Fresh device record for an identity, looking at attached devices
    /// first, then unattached ones. This is what lets a caller keep
    /// answering name queries across a hot-plug event without re-acquiring
    /// entities from scratch.
    pub fn refresh_device(&self, identity: &DeviceIdentity) -> Option<DisplayDevice> {
        self.displays()
            .into_iter()
            .map(|display| display.device)
            .find(|device| device.identity == *identity)
            .or_else(|| {
                self.unattached_displays()
                    .into_iter()
                    .map(|display| display.device)
                    .find(|device| device.identity == *identity)
            })
    }

    /// Gamma ramp currently applied to the source driving a display.
    pub fn display_gamma_ramp(&self, display: &Display) -> DisplayResult<GammaRamp> {
        if !self.is_display_valid(display) {
            return Err(DisplayError::InvalidDisplay(display.identity().path.clone()));
        }
        self.device_context.gamma_ramp(&display.device.display_name)
    }

    /// Applies a gamma ramp to the source driving a display.
    pub fn set_display_gamma_ramp(&self, display: &Display, ramp: &GammaRamp) -> DisplayResult<()> {
        if !self.is_display_valid(display) {
            return Err(DisplayError::InvalidDisplay(display.identity().path.clone()));
        }
        self.device_context.set_gamma_ramp(&display.device.display_name, ramp)
    }

    /// Reads an informational value from a device's driver registry key.
    pub fn device_registry_value(&self, device: &DisplayDevice, value_name: &str) -> DisplayResult<Option<String>> {
        let address = RegistryAddress::parse(&device.identity.registry_key)?;
        self.registry.read_string(&address, value_name)
    }
}
