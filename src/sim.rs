//! Simulated display subsystem
//!
//! An in-memory implementation of the three OS capability traits. Monitor
//! rows are scripted exactly as the OS would return them, mode changes are
//! staged and committed the way the real device context does it, and
//! individual submissions can be made to fail so the rollback paths are
//! exercisable without hardware. Backs the unit tests and the sample binary.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::constants::{change_flags, fields, set_config, state_flags, win32};
use crate::error::{DisplayError, DisplayResult};
use crate::gamma::GammaRamp;
use crate::identity::Luid;
use crate::os::{
    ChangeStatus, DeviceContextApi, DeviceMode, DeviceRecord, DisplayConfigApi, PathDescriptor, PathScope,
    PreferredMode, RegistryApi, SettingsMode, TargetDeviceInfo,
};
use crate::registry::RegistryAddress;
use crate::scale::ScaleSteps;
use crate::types::{Point, Size, TopologyId};

/// One recorded mode-change submission, rejected ones included.
#[derive(Debug, Clone)]
pub struct Submission {
    pub device_name: String,
    pub mode: DeviceMode,
    pub flags: u32,
}

impl Submission {
    /// A submission that clears width, height and position detaches the
    /// output.
    pub fn is_disable(&self) -> bool {
        self.mode.fields == (fields::PELS_WIDTH | fields::PELS_HEIGHT | fields::POSITION)
            && self.mode.resolution().is_empty()
    }
}

#[derive(Debug, Clone)]
struct Rejection {
    device_name: String,
    /// With a resolution, only modes of that size are rejected
    resolution: Option<Size>,
    status: ChangeStatus,
}

#[derive(Default)]
struct ModeTable {
    current: Option<DeviceMode>,
    registry: Option<DeviceMode>,
    supported: Vec<DeviceMode>,
}

#[derive(Default)]
struct SimState {
    adapters: Vec<DeviceRecord>,
    /// Monitor rows keyed by the owning adapter's device name
    monitors: HashMap<String, Vec<DeviceRecord>>,
    modes: HashMap<String, ModeTable>,
    staged: Vec<(String, DeviceMode)>,
    submissions: Vec<Submission>,
    rejections: Vec<Rejection>,
    gamma: HashMap<String, GammaRamp>,
    registry_values: HashMap<(String, String), String>,

    paths: Vec<PathDescriptor>,
    adapter_paths: HashMap<Luid, String>,
    source_names: HashMap<(Luid, u32), String>,
    target_devices: HashMap<(Luid, u32), TargetDeviceInfo>,
    preferred_modes: HashMap<(Luid, u32), PreferredMode>,
    scales: HashMap<(Luid, u32), ScaleSteps>,
    path_submissions: Vec<(Vec<PathDescriptor>, u32)>,
    last_topology: Option<(TopologyId, bool)>,
}

/// The simulated machine. Set it up with the builder methods, then hand it
/// to a [`DisplayTopologyReader`](crate::reader::DisplayTopologyReader) as
/// all three capabilities at once.
pub struct SimulatedOs {
    state: RefCell<SimState>,
}

impl SimulatedOs {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SimState::default()),
        }
    }

    pub fn add_adapter(&mut self, device_name: &str, description: &str, device_path: &str) {
        self.state.get_mut().adapters.push(DeviceRecord {
            device_name: device_name.to_string(),
            device_string: description.to_string(),
            device_id: device_path.to_string(),
            device_key: format!("\\Registry\\Machine\\System\\Adapters\\{description}"),
            state_flags: state_flags::ATTACHED_TO_DESKTOP,
        });
    }

    pub fn add_monitor(&mut self, adapter_name: &str, device_path: &str, device_key: &str, attached: bool) {
        let state = self.state.get_mut();
        let rows = state.monitors.entry(adapter_name.to_string()).or_default();
        rows.push(DeviceRecord {
            device_name: format!("{adapter_name}\\Monitor{}", rows.len()),
            device_string: "Generic PnP Monitor".to_string(),
            device_id: device_path.to_string(),
            device_key: device_key.to_string(),
            state_flags: if attached { state_flags::ATTACHED_TO_DESKTOP } else { 0 },
        });
    }

    /// Sets the mode currently driving a source, mirrored into the registry
    /// mode.
    pub fn set_current_mode(&mut self, device_name: &str, resolution: Size, position: Point, frequency: u32) {
        let mode = full_mode(device_name, resolution, position, frequency, 32);
        let table = self.state.get_mut().modes.entry(device_name.to_string()).or_default();
        table.current = Some(mode.clone());
        table.registry = Some(mode);
    }

    pub fn add_supported_mode(&mut self, device_name: &str, resolution: Size, frequency: u32, bits: u32) {
        let mode = full_mode(device_name, resolution, Point::default(), frequency, bits);
        self.state
            .get_mut()
            .modes
            .entry(device_name.to_string())
            .or_default()
            .supported
            .push(mode);
    }

    /// Marks a monitor as unplugged. Takes `&self` so a hot-plug event can
    /// be injected mid-scenario, while readers hold the machine.
    pub fn detach_monitor(&self, device_path: &str) {
        for rows in self.state.borrow_mut().monitors.values_mut() {
            for row in rows.iter_mut().filter(|row| row.device_id == device_path) {
                row.state_flags &= !state_flags::ATTACHED_TO_DESKTOP;
            }
        }
    }

    /// Rejects every mode change submitted for a device.
    pub fn reject_mode_changes_for(&self, device_name: &str, status: ChangeStatus) {
        self.state.borrow_mut().rejections.push(Rejection {
            device_name: device_name.to_string(),
            resolution: None,
            status,
        });
    }

    /// Rejects mode changes for a device only at the given resolution.
    pub fn reject_resolution(&self, device_name: &str, resolution: Size, status: ChangeStatus) {
        self.state.borrow_mut().rejections.push(Rejection {
            device_name: device_name.to_string(),
            resolution: Some(resolution),
            status,
        });
    }

    pub fn set_registry_value(&mut self, address: &str, value_name: &str, value: &str) {
        self.state
            .get_mut()
            .registry_values
            .insert((address.to_string(), value_name.to_string()), value.to_string());
    }

    pub fn add_path(&mut self, descriptor: PathDescriptor) {
        self.state.get_mut().paths.push(descriptor);
    }

    pub fn set_adapter_device_path(&mut self, adapter: Luid, device_path: &str) {
        self.state.get_mut().adapter_paths.insert(adapter, device_path.to_string());
    }

    pub fn set_source_name(&mut self, adapter: Luid, source_id: u32, display_name: &str) {
        self.state
            .get_mut()
            .source_names
            .insert((adapter, source_id), display_name.to_string());
    }

    pub fn set_target_device(&mut self, adapter: Luid, target_id: u32, info: TargetDeviceInfo) {
        self.state.get_mut().target_devices.insert((adapter, target_id), info);
    }

    pub fn set_target_preferred_mode(&mut self, adapter: Luid, target_id: u32, mode: PreferredMode) {
        self.state.get_mut().preferred_modes.insert((adapter, target_id), mode);
    }

    pub fn set_source_scale(&mut self, adapter: Luid, source_id: u32, steps: ScaleSteps) {
        self.state.get_mut().scales.insert((adapter, source_id), steps);
    }

    /// Every mode-change submission so far, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.borrow().submissions.clone()
    }

    pub fn clear_submissions(&self) {
        self.state.borrow_mut().submissions.clear();
    }

    pub fn last_path_submission(&self) -> Option<(Vec<PathDescriptor>, u32)> {
        self.state.borrow().path_submissions.last().cloned()
    }

    pub fn last_topology(&self) -> Option<(TopologyId, bool)> {
        self.state.borrow().last_topology
    }

    fn commit(state: &mut SimState, device_name: &str, mode: &DeviceMode) {
        let disable = mode.fields == (fields::PELS_WIDTH | fields::PELS_HEIGHT | fields::POSITION)
            && mode.resolution().is_empty();
        if let Some(rows) = state.monitors.get_mut(device_name) {
            for row in rows {
                if disable {
                    row.state_flags &= !state_flags::ATTACHED_TO_DESKTOP;
                } else {
                    row.state_flags |= state_flags::ATTACHED_TO_DESKTOP;
                }
            }
        }
        let table = state.modes.entry(device_name.to_string()).or_default();
        if disable {
            table.current = None;
        } else {
            table.current = Some(mode.clone());
            table.registry = Some(mode.clone());
        }
    }
}

impl Default for SimulatedOs {
    fn default() -> Self {
        Self::new()
    }
}

fn full_mode(device_name: &str, resolution: Size, position: Point, frequency: u32, bits: u32) -> DeviceMode {
    DeviceMode {
        device_name: device_name.to_string(),
        fields: fields::POSITION
            | fields::ORIENTATION
            | fields::FIXED_OUTPUT
            | fields::BITS_PER_PIXEL
            | fields::PELS_WIDTH
            | fields::PELS_HEIGHT
            | fields::DISPLAY_FLAGS
            | fields::FREQUENCY,
        position,
        bits_per_pixel: bits,
        width: resolution.width,
        height: resolution.height,
        frequency,
        ..DeviceMode::default()
    }
}

impl DeviceContextApi for SimulatedOs {
    fn enum_display_devices(&self, device_name: Option<&str>, index: u32, _flags: u32) -> Option<DeviceRecord> {
        let state = self.state.borrow();
        match device_name {
            None => state.adapters.get(index as usize).cloned(),
            Some(name) => state.monitors.get(name)?.get(index as usize).cloned(),
        }
    }

    fn enum_display_settings(&self, device_name: &str, mode: SettingsMode) -> Option<DeviceMode> {
        let state = self.state.borrow();
        let table = state.modes.get(device_name)?;
        match mode {
            SettingsMode::Current => table.current.clone(),
            SettingsMode::Registry => table.registry.clone(),
            SettingsMode::Index(index) => table.supported.get(index as usize).cloned(),
        }
    }

    fn change_display_settings(&self, device_name: Option<&str>, mode: Option<&DeviceMode>, flags: u32) -> ChangeStatus {
        let mut state = self.state.borrow_mut();
        match (device_name, mode) {
            (Some(name), Some(mode)) => {
                state.submissions.push(Submission {
                    device_name: name.to_string(),
                    mode: mode.clone(),
                    flags,
                });
                if let Some(rejection) = state.rejections.iter().find(|rejection| {
                    rejection.device_name == name
                        && rejection.resolution.map_or(true, |size| size == mode.resolution())
                }) {
                    return rejection.status;
                }
                if flags & change_flags::RESET != 0 {
                    Self::commit(&mut state, name, mode);
                } else {
                    state.staged.push((name.to_string(), mode.clone()));
                }
                ChangeStatus::Successful
            }
            (None, None) if flags & change_flags::RESET != 0 => {
                // Later staged entries for the same device win
                let staged = std::mem::take(&mut state.staged);
                for (name, mode) in &staged {
                    Self::commit(&mut state, name, mode);
                }
                ChangeStatus::Successful
            }
            _ => ChangeStatus::BadParam,
        }
    }

    fn gamma_ramp(&self, device_name: &str) -> DisplayResult<GammaRamp> {
        Ok(self
            .state
            .borrow()
            .gamma
            .get(device_name)
            .cloned()
            .unwrap_or_else(GammaRamp::identity))
    }

    fn set_gamma_ramp(&self, device_name: &str, ramp: &GammaRamp) -> DisplayResult<()> {
        self.state.borrow_mut().gamma.insert(device_name.to_string(), ramp.clone());
        Ok(())
    }
}

impl DisplayConfigApi for SimulatedOs {
    fn query_paths(&self, scope: PathScope) -> DisplayResult<Vec<PathDescriptor>> {
        let state = self.state.borrow();
        Ok(state
            .paths
            .iter()
            .filter(|path| match scope {
                PathScope::All => true,
                PathScope::Active => path.active,
            })
            .cloned()
            .collect())
    }

    fn adapter_device_path(&self, adapter: Luid) -> DisplayResult<String> {
        self.state
            .borrow()
            .adapter_paths
            .get(&adapter)
            .cloned()
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))
    }

    fn source_device_name(&self, adapter: Luid, source_id: u32) -> DisplayResult<String> {
        self.state
            .borrow()
            .source_names
            .get(&(adapter, source_id))
            .cloned()
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))
    }

    fn target_device(&self, adapter: Luid, target_id: u32) -> DisplayResult<TargetDeviceInfo> {
        self.state
            .borrow()
            .target_devices
            .get(&(adapter, target_id))
            .cloned()
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))
    }

    fn target_preferred_mode(&self, adapter: Luid, target_id: u32) -> DisplayResult<PreferredMode> {
        self.state
            .borrow()
            .preferred_modes
            .get(&(adapter, target_id))
            .copied()
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))
    }

    fn source_dpi_scale(&self, adapter: Luid, source_id: u32) -> DisplayResult<ScaleSteps> {
        self.state
            .borrow()
            .scales
            .get(&(adapter, source_id))
            .copied()
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))
    }

    fn set_source_dpi_scale(&self, adapter: Luid, source_id: u32, relative_steps: i32) -> DisplayResult<()> {
        let mut state = self.state.borrow_mut();
        let steps = state
            .scales
            .get_mut(&(adapter, source_id))
            .ok_or(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER))?;
        if relative_steps < steps.minimum || relative_steps > steps.maximum {
            return Err(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER));
        }
        steps.current = relative_steps;
        Ok(())
    }

    fn set_paths(&self, paths: &[PathDescriptor], flags: u32) -> DisplayResult<()> {
        let mut state = self.state.borrow_mut();
        state.path_submissions.push((paths.to_vec(), flags));
        if flags & set_config::APPLY != 0 {
            state.paths = paths.to_vec();
        }
        Ok(())
    }

    fn set_topology(&self, topology: TopologyId, use_saved_database: bool) -> DisplayResult<()> {
        self.state.borrow_mut().last_topology = Some((topology, use_saved_database));
        Ok(())
    }
}

impl RegistryApi for SimulatedOs {
    fn read_string(&self, address: &RegistryAddress, value_name: &str) -> DisplayResult<Option<String>> {
        Ok(self
            .state
            .borrow()
            .registry_values
            .get(&(address.to_string(), value_name.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_changes_commit_in_submission_order() {
        let mut os = SimulatedOs::new();
        os.add_adapter("\\\\.\\DISPLAY1", "GPU", "PCI\\1");
        os.add_monitor("\\\\.\\DISPLAY1", "MON\\A", "\\Registry\\Machine\\a", true);

        let first = full_mode("\\\\.\\DISPLAY1", Size::new(1024, 768), Point::default(), 60, 32);
        let second = full_mode("\\\\.\\DISPLAY1", Size::new(1920, 1080), Point::default(), 60, 32);
        os.change_display_settings(Some("\\\\.\\DISPLAY1"), Some(&first), change_flags::NO_RESET);
        os.change_display_settings(Some("\\\\.\\DISPLAY1"), Some(&second), change_flags::NO_RESET);

        // Nothing is visible until the commit
        assert!(os.enum_display_settings("\\\\.\\DISPLAY1", SettingsMode::Current).is_none());

        os.change_display_settings(None, None, change_flags::RESET);
        let current = os.enum_display_settings("\\\\.\\DISPLAY1", SettingsMode::Current).unwrap();
        assert_eq!(current.resolution(), Size::new(1920, 1080));
    }

    #[test]
    fn test_committed_disable_detaches_monitor_rows() {
        let mut os = SimulatedOs::new();
        os.add_adapter("\\\\.\\DISPLAY1", "GPU", "PCI\\1");
        os.add_monitor("\\\\.\\DISPLAY1", "MON\\A", "\\Registry\\Machine\\a", true);
        os.set_current_mode("\\\\.\\DISPLAY1", Size::new(1920, 1080), Point::default(), 60);

        let disable = DeviceMode {
            device_name: "\\\\.\\DISPLAY1".to_string(),
            fields: fields::PELS_WIDTH | fields::PELS_HEIGHT | fields::POSITION,
            ..DeviceMode::default()
        };
        os.change_display_settings(Some("\\\\.\\DISPLAY1"), Some(&disable), change_flags::RESET);

        let row = os.enum_display_devices(Some("\\\\.\\DISPLAY1"), 0, 0).unwrap();
        assert!(!row.is_attached());
        assert!(os.enum_display_settings("\\\\.\\DISPLAY1", SettingsMode::Current).is_none());
    }

    #[test]
    fn test_rejection_is_scoped_to_resolution() {
        let mut os = SimulatedOs::new();
        os.add_adapter("\\\\.\\DISPLAY1", "GPU", "PCI\\1");
        os.add_monitor("\\\\.\\DISPLAY1", "MON\\A", "\\Registry\\Machine\\a", true);
        os.reject_resolution("\\\\.\\DISPLAY1", Size::new(640, 480), ChangeStatus::BadMode);

        let rejected = full_mode("\\\\.\\DISPLAY1", Size::new(640, 480), Point::default(), 60, 32);
        let accepted = full_mode("\\\\.\\DISPLAY1", Size::new(1920, 1080), Point::default(), 60, 32);
        assert_eq!(
            os.change_display_settings(Some("\\\\.\\DISPLAY1"), Some(&rejected), change_flags::NO_RESET),
            ChangeStatus::BadMode
        );
        assert_eq!(
            os.change_display_settings(Some("\\\\.\\DISPLAY1"), Some(&accepted), change_flags::NO_RESET),
            ChangeStatus::Successful
        );
    }
}
