//! Capability interfaces to the OS display subsystem
//!
//! The crate never calls a platform display API directly; everything it
//! needs is expressed as the narrow traits below plus the raw record types
//! they exchange. Production collaborators wrap the real OS calls, the
//! simulator backs tests and the sample binary.
//!
//! All calls are synchronous, blocking round-trips. Enumeration follows the
//! OS contract of iterate-by-index until the call reports no more records.

use serde::{Deserialize, Serialize};

use crate::constants::{display_flags, state_flags};
use crate::error::DisplayResult;
use crate::gamma::GammaRamp;
use crate::identity::{Luid, Rational};
use crate::registry::RegistryAddress;
use crate::scale::ScaleSteps;
use crate::types::{FixedOutput, Orientation, PixelFormat, Point, Rotation, Scaling, Size, TopologyId};

/// Raw record of the legacy per-adapter/per-monitor enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// OS device name (`\\.\DISPLAY1`, `\\.\DISPLAY1\Monitor0`)
    pub device_name: String,
    /// Human-readable device description
    pub device_string: String,
    /// Device path: hardware id for adapters, interface path for monitors
    pub device_id: String,
    /// Registry address of the device driver and configuration
    pub device_key: String,
    pub state_flags: u32,
}

impl DeviceRecord {
    /// Device is attached to the desktop right now
    pub fn is_attached(&self) -> bool {
        self.state_flags & state_flags::ATTACHED_TO_DESKTOP != 0
    }
}

/// Legacy device-mode record: resolution, color depth, refresh, position,
/// orientation for one output. `fields` marks which members carry data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMode {
    pub device_name: String,
    pub fields: u32,
    pub position: Point,
    pub orientation: Orientation,
    pub fixed_output: FixedOutput,
    pub bits_per_pixel: u32,
    pub width: u32,
    pub height: u32,
    pub display_flags: u32,
    pub frequency: u32,
}

impl DeviceMode {
    pub fn resolution(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_interlaced(&self) -> bool {
        self.display_flags & display_flags::INTERLACED != 0
    }
}

/// Which mode record a settings enumeration should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsMode {
    /// The mode currently driving the screen
    Current,
    /// The mode stored in the registry
    Registry,
    /// The n-th supported mode
    Index(u32),
}

/// Result codes of a mode-change submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    Successful,
    Restart,
    Failed,
    BadMode,
    NotUpdated,
    BadFlags,
    BadParam,
    BadDualView,
}

impl ChangeStatus {
    pub fn is_success(self) -> bool {
        self == Self::Successful
    }
}

/// Scope of a path enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScope {
    /// Active and merely-possible paths
    All,
    /// Paths currently driving desktop pixels
    Active,
}

/// One source-to-targets binding as reported by the path enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDescriptor {
    pub source_adapter: Luid,
    pub source_id: u32,
    /// Present when the source has a mode assigned (active paths)
    pub source_mode: Option<SourceModeDescriptor>,
    pub targets: Vec<TargetDescriptor>,
    pub active: bool,
}

/// Source mode of an active path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceModeDescriptor {
    pub position: Point,
    pub resolution: Size,
    pub pixel_format: PixelFormat,
}

/// One target leg of a path descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub adapter: Luid,
    pub target_id: u32,
    pub rotation: Rotation,
    pub scaling: Scaling,
    pub refresh_rate: Rational,
    /// Target connector is usable right now
    pub available: bool,
}

/// Device information of a path target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDeviceInfo {
    pub friendly_name: String,
    /// Interface-form device path, comparable with monitor device ids from
    /// the legacy enumeration
    pub device_path: String,
}

/// Full timing description of a video signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalMode {
    pub active_size: Size,
    pub total_size: Size,
    pub pixel_rate: u64,
    pub h_sync_freq: Rational,
    pub v_sync_freq: Rational,
}

/// Preferred mode of a target as reported by the path API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferredMode {
    pub resolution: Size,
    pub signal: SignalMode,
}

/// Legacy display subsystem surface: per-device enumeration, mode records,
/// mode-change submission, gamma ramp access.
pub trait DeviceContextApi {
    /// Returns the record at `index`, or `None` past the end. With a device
    /// name, enumerates that adapter's monitors; without, the adapters.
    fn enum_display_devices(&self, device_name: Option<&str>, index: u32, flags: u32) -> Option<DeviceRecord>;

    /// Returns the requested mode record, or `None` when the device has no
    /// such mode (or no mode-capable device matches the name).
    fn enum_display_settings(&self, device_name: &str, mode: SettingsMode) -> Option<DeviceMode>;

    /// Submits a mode change. A `None` mode with the reset flag applies all
    /// staged changes; a `None` device addresses the whole desktop.
    fn change_display_settings(&self, device_name: Option<&str>, mode: Option<&DeviceMode>, flags: u32) -> ChangeStatus;

    /// Reads the gamma ramp currently applied to a source.
    fn gamma_ramp(&self, device_name: &str) -> DisplayResult<GammaRamp>;

    /// Writes a gamma ramp to a source.
    fn set_gamma_ramp(&self, device_name: &str, ramp: &GammaRamp) -> DisplayResult<()>;
}

/// Path-based display configuration surface.
///
/// Failed device-info calls report `DisplayError::ConfigCallFailed` carrying
/// the raw status code.
pub trait DisplayConfigApi {
    fn query_paths(&self, scope: PathScope) -> DisplayResult<Vec<PathDescriptor>>;

    fn adapter_device_path(&self, adapter: Luid) -> DisplayResult<String>;

    fn source_device_name(&self, adapter: Luid, source_id: u32) -> DisplayResult<String>;

    fn target_device(&self, adapter: Luid, target_id: u32) -> DisplayResult<TargetDeviceInfo>;

    fn target_preferred_mode(&self, adapter: Luid, target_id: u32) -> DisplayResult<PreferredMode>;

    fn source_dpi_scale(&self, adapter: Luid, source_id: u32) -> DisplayResult<ScaleSteps>;

    /// Submits a DPI scale change as a signed step count relative to the
    /// recommended step.
    fn set_source_dpi_scale(&self, adapter: Luid, source_id: u32, relative_steps: i32) -> DisplayResult<()>;

    /// Submits a full desired path set with the given set-configuration
    /// flags. Atomic or fails atomically; no client-side rollback exists on
    /// this surface.
    fn set_paths(&self, paths: &[PathDescriptor], flags: u32) -> DisplayResult<()>;

    /// Applies a well-known topology, optionally from the saved database.
    fn set_topology(&self, topology: TopologyId, use_saved_database: bool) -> DisplayResult<()>;
}

/// Read-only registry access for informational device lookups.
pub trait RegistryApi {
    fn read_string(&self, address: &RegistryAddress, value_name: &str) -> DisplayResult<Option<String>>;
}
