//! Display settings and the transaction engine
//!
//! A setting is an immutable description of what one output should do;
//! applying a batch of them is a small state machine over live hardware.
//! Changes are staged against the OS without touching the screen, a cleanup
//! pass disables every display the batch does not mention, and a single
//! commit applies the whole topology at once. When the OS rejects any staged
//! change the engine restores the pre-batch state and still surfaces the
//! failure to the caller.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{change_flags, display_flags, fields};
use crate::device::{Display, DisplayDevice, UnattachedDisplay};
use crate::error::{DisplayError, DisplayResult};
use crate::identity::Rational;
use crate::os::{DeviceMode, SettingsMode};
use crate::reader::DisplayTopologyReader;
use crate::types::{ColorDepth, FixedOutput, Orientation, Point, Size};

/// A display configuration the OS reports as constructible on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossibleSetting {
    pub resolution: Size,
    pub frequency: Rational,
    pub color_depth: ColorDepth,
    pub interlaced: bool,
}

impl PossibleSetting {
    pub(crate) fn from_mode(mode: &DeviceMode) -> Self {
        Self {
            resolution: mode.resolution(),
            frequency: Rational::new(mode.frequency as u64, 1, false),
            color_depth: ColorDepth::from_bits_per_pixel(mode.bits_per_pixel).unwrap_or_default(),
            interlaced: mode.is_interlaced(),
        }
    }
}

impl std::fmt::Display for PossibleSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}hz @ {:?}",
            self.resolution,
            if self.interlaced { "Interlaced" } else { "Progressive" },
            self.frequency.to_value(1),
            self.color_depth
        )
    }
}

/// A full applied configuration for one output.
///
/// The disabled sentinel means "detach this output" and is carried as an
/// explicit flag; a zeroed resolution and position read back from the OS is
/// its own signal for disabled and maps to the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySetting {
    pub resolution: Size,
    pub position: Point,
    pub frequency: Rational,
    pub color_depth: ColorDepth,
    pub interlaced: bool,
    pub orientation: Orientation,
    pub output_scaling: FixedOutput,
    pub enabled: bool,
}

impl DisplaySetting {
    pub fn new(resolution: Size, position: Point, frequency_hz: u32) -> Self {
        Self {
            resolution,
            position,
            frequency: Rational::new(frequency_hz as u64, 1, false),
            color_depth: ColorDepth::default(),
            interlaced: false,
            orientation: Orientation::default(),
            output_scaling: FixedOutput::default(),
            enabled: true,
        }
    }

    /// Places a possible setting on the desktop.
    pub fn from_possible(setting: &PossibleSetting, position: Point) -> Self {
        Self {
            resolution: setting.resolution,
            position,
            frequency: setting.frequency,
            color_depth: setting.color_depth,
            interlaced: setting.interlaced,
            orientation: Orientation::default(),
            output_scaling: FixedOutput::default(),
            enabled: true,
        }
    }

    /// The unique sentinel that detaches an output.
    pub fn disabled() -> Self {
        Self {
            resolution: Size::default(),
            position: Point::default(),
            frequency: Rational::new(0, 1, false),
            color_depth: ColorDepth::default(),
            interlaced: false,
            orientation: Orientation::default(),
            output_scaling: FixedOutput::default(),
            enabled: false,
        }
    }

    pub(crate) fn from_mode(mode: &DeviceMode) -> Self {
        let resolution = mode.resolution();
        let position = mode.position;
        Self {
            resolution,
            position,
            frequency: Rational::new(mode.frequency as u64, 1, false),
            color_depth: ColorDepth::from_bits_per_pixel(mode.bits_per_pixel).unwrap_or_default(),
            interlaced: mode.is_interlaced(),
            orientation: mode.orientation,
            output_scaling: mode.fixed_output,
            // Zeroed geometry is how the OS reports a detached output
            enabled: !(resolution.is_empty() && position.is_origin()),
        }
    }

    /// Builds the device-mode record this setting submits. A disabled
    /// setting requests clearing width, height and position only.
    pub(crate) fn to_device_mode(&self, device: &DisplayDevice) -> DisplayResult<DeviceMode> {
        if device.display_name.trim().is_empty() {
            return Err(DisplayError::MissingDisplay(device.identity.path.clone()));
        }
        if !self.enabled {
            return Ok(DeviceMode {
                device_name: device.display_name.clone(),
                fields: fields::PELS_WIDTH | fields::PELS_HEIGHT | fields::POSITION,
                ..DeviceMode::default()
            });
        }
        Ok(DeviceMode {
            device_name: device.display_name.clone(),
            fields: fields::POSITION
                | fields::ORIENTATION
                | fields::FIXED_OUTPUT
                | fields::BITS_PER_PIXEL
                | fields::PELS_WIDTH
                | fields::PELS_HEIGHT
                | fields::DISPLAY_FLAGS
                | fields::FREQUENCY,
            position: self.position,
            orientation: self.orientation,
            fixed_output: self.output_scaling,
            bits_per_pixel: self.color_depth.bits_per_pixel(),
            width: self.resolution.width,
            height: self.resolution.height,
            display_flags: if self.interlaced { display_flags::INTERLACED } else { 0 },
            frequency: self.frequency.to_value(1) as u32,
        })
    }
}

impl std::fmt::Display for DisplaySetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.enabled {
            return write!(f, "Disabled");
        }
        write!(
            f,
            "{} {} {}hz @ {:?} @ ({}, {})",
            self.resolution,
            if self.interlaced { "Interlaced" } else { "Progressive" },
            self.frequency.to_value(1),
            self.color_depth,
            self.position.x,
            self.position.y
        )
    }
}

impl<'a> DisplayTopologyReader<'a> {
    /// The setting currently driving a display.
    pub fn current_setting(&self, display: &Display) -> DisplaySetting {
        self.device_setting(&display.device, SettingsMode::Current)
    }

    /// The setting stored in the registry for a display.
    pub fn saved_setting(&self, display: &Display) -> DisplaySetting {
        self.device_setting(&display.device, SettingsMode::Registry)
    }

    fn device_setting(&self, device: &DisplayDevice, mode: SettingsMode) -> DisplaySetting {
        if device.display_name.trim().is_empty() {
            return DisplaySetting::disabled();
        }
        match self.device_context.enum_display_settings(&device.display_name, mode) {
            Some(record) => DisplaySetting::from_mode(&record),
            None => DisplaySetting::disabled(),
        }
    }

    /// Every setting the OS reports as constructible on a device.
    pub fn possible_settings(&self, device: &DisplayDevice) -> Vec<PossibleSetting> {
        let mut settings = Vec::new();
        for index in 0u32.. {
            let Some(mode) = self
                .device_context
                .enum_display_settings(&device.display_name, SettingsMode::Index(index))
            else {
                break;
            };
            settings.push(PossibleSetting::from_mode(&mode));
        }
        settings
    }

    /// The best constructible setting: deepest color, then largest
    /// resolution, then highest frequency. First seen wins ties.
    pub fn preferred_setting(&self, device: &DisplayDevice) -> Option<PossibleSetting> {
        self.possible_settings(device).into_iter().reduce(|best, candidate| {
            let best_key = (best.color_depth, best.resolution.area(), best.frequency.to_value(1));
            let candidate_key = (
                candidate.color_depth,
                candidate.resolution.area(),
                candidate.frequency.to_value(1),
            );
            if candidate_key > best_key { candidate } else { best }
        })
    }

    /// A display is the GDI primary iff its current setting is enabled and
    /// positioned at the desktop origin.
    pub fn is_gdi_primary(&self, display: &Display) -> bool {
        let setting = self.current_setting(display);
        setting.enabled && setting.position.is_origin()
    }

    /// Changes one display's settings. With `apply` the screen changes
    /// immediately; otherwise the change is staged until
    /// [`apply_saved_settings`](Self::apply_saved_settings).
    pub fn set_display_settings(&self, display: &Display, setting: &DisplaySetting, apply: bool) -> DisplayResult<()> {
        if !self.is_display_valid(display) {
            return Err(DisplayError::InvalidDisplay(display.identity().path.clone()));
        }
        self.save_setting(setting, &display.device, apply)
    }

    /// Enables an unattached display with the given settings.
    pub fn enable_display(
        &self,
        display: &UnattachedDisplay,
        setting: &DisplaySetting,
        apply: bool,
    ) -> DisplayResult<()> {
        if !self.is_unattached_valid(display) {
            return Err(DisplayError::InvalidDisplay(display.identity().path.clone()));
        }
        self.save_setting(setting, &display.device, apply)
    }

    /// Disables and detaches a display.
    pub fn disable_display(&self, display: &Display, apply: bool) -> DisplayResult<()> {
        self.set_display_settings(display, &DisplaySetting::disabled(), apply)
    }

    /// Applies every staged change to the screen in one commit.
    pub fn apply_saved_settings(&self) -> DisplayResult<()> {
        let status = self.device_context.change_display_settings(None, None, change_flags::RESET);
        if status.is_success() {
            Ok(())
        } else {
            Err(DisplayError::ModeChangeFailed { status, device: None })
        }
    }

    /// Applies a whole desired topology transactionally.
    ///
    /// Each requested `(device, setting)` pair is staged, every display
    /// present before the call but absent from the batch is staged disabled,
    /// and with `apply_now` a single commit lands everything flicker-free.
    /// If the OS rejects any staged change, one automatic rollback re-runs
    /// the procedure with the pre-batch snapshot as the desired state and
    /// immediate application, so the screen is restored synchronously. The
    /// original failure reaches the caller either way.
    pub fn save_display_settings(
        &self,
        new_settings: &[(DisplayDevice, DisplaySetting)],
        apply_now: bool,
    ) -> DisplayResult<()> {
        let mut desired: Vec<(DisplayDevice, DisplaySetting)> = new_settings.to_vec();
        let mut apply = apply_now;
        let mut rolling_back: Option<DisplayError> = None;

        loop {
            // The rollback target is the pre-batch state, fixed at attempt
            // start.
            let snapshot: Vec<(DisplayDevice, DisplaySetting)> = self
                .displays()
                .into_iter()
                .map(|display| {
                    let setting = self.current_setting(&display);
                    (display.device, setting)
                })
                .collect();

            let attempt = self.stage_batch(&desired, &snapshot, apply);

            match attempt {
                Ok(()) => {
                    return match rolling_back {
                        // Rolled back; the caller still handles the failure.
                        Some(original) => Err(original),
                        None => Ok(()),
                    };
                }
                Err(failure @ DisplayError::ModeChangeFailed { .. }) if rolling_back.is_none() => {
                    warn!(%failure, "mode change rejected, rolling back to pre-batch state");
                    desired = snapshot;
                    apply = true;
                    rolling_back = Some(failure);
                }
                Err(failure) => {
                    // A failed rollback never hides the original error.
                    return Err(rolling_back.unwrap_or(failure));
                }
            }
        }
    }

    fn stage_batch(
        &self,
        desired: &[(DisplayDevice, DisplaySetting)],
        snapshot: &[(DisplayDevice, DisplaySetting)],
        apply_now: bool,
    ) -> DisplayResult<()> {
        let mut untouched: Vec<&DisplayDevice> = snapshot.iter().map(|(device, _)| device).collect();

        for (device, setting) in desired {
            untouched.retain(|snapshot_device| snapshot_device.identity.path != device.identity.path);
            self.save_setting(setting, device, false)?;
        }

        // Any display not mentioned in the new topology is turned off;
        // ones that already went invalid are skipped.
        for device in untouched {
            let display = Display { device: device.clone() };
            if !self.is_display_valid(&display) {
                continue;
            }
            debug!(device = %device.display_full_name, "staging disable for display absent from batch");
            self.save_setting(&DisplaySetting::disabled(), device, false)?;
        }

        if apply_now {
            self.apply_saved_settings()?;
        }
        Ok(())
    }

    fn save_setting(&self, setting: &DisplaySetting, device: &DisplayDevice, reset: bool) -> DisplayResult<()> {
        let mode = setting.to_device_mode(device)?;
        let mut flags = change_flags::UPDATE_REGISTRY | change_flags::GLOBAL;
        flags |= if reset { change_flags::RESET } else { change_flags::NO_RESET };
        if setting.enabled && setting.position.is_origin() {
            flags |= change_flags::SET_PRIMARY;
        }
        let status = self
            .device_context
            .change_display_settings(Some(&device.display_name), Some(&mode), flags);
        if status.is_success() {
            Ok(())
        } else {
            Err(DisplayError::ModeChangeFailed {
                status,
                device: Some(device.identity.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::ChangeStatus;
    use crate::sim::SimulatedOs;

    fn machine() -> SimulatedOs {
        let mut os = SimulatedOs::new();
        os.add_adapter("\\\\.\\DISPLAY1", "GPU A", "PCI\\VEN_10DE\\1");
        os.add_adapter("\\\\.\\DISPLAY2", "GPU A", "PCI\\VEN_10DE\\1");
        os.add_adapter("\\\\.\\DISPLAY3", "GPU A", "PCI\\VEN_10DE\\1");
        os.add_monitor("\\\\.\\DISPLAY1", "MON\\A", "\\Registry\\Machine\\a", true);
        os.add_monitor("\\\\.\\DISPLAY2", "MON\\B", "\\Registry\\Machine\\b", true);
        os.add_monitor("\\\\.\\DISPLAY3", "MON\\C", "\\Registry\\Machine\\c", true);
        os.set_current_mode("\\\\.\\DISPLAY1", Size::new(2560, 1440), Point::new(0, 0), 144);
        os.set_current_mode("\\\\.\\DISPLAY2", Size::new(1920, 1080), Point::new(2560, 0), 60);
        os.set_current_mode("\\\\.\\DISPLAY3", Size::new(1920, 1080), Point::new(4480, 0), 60);
        os
    }

    fn settings_of(os: &SimulatedOs) -> Vec<(String, DisplaySetting)> {
        let reader = DisplayTopologyReader::new(os, os, os);
        reader
            .displays()
            .into_iter()
            .map(|display| {
                let setting = reader.current_setting(&display);
                (display.device.display_name.clone(), setting)
            })
            .collect()
    }

    #[test]
    fn test_disabled_sentinel_on_zeroed_mode() {
        let mode = DeviceMode::default();
        let setting = DisplaySetting::from_mode(&mode);
        assert!(!setting.enabled);
        assert_eq!(setting.to_string(), "Disabled");

        let enabled = DisplaySetting::new(Size::new(1920, 1080), Point::new(0, 0), 60);
        assert!(enabled.enabled);
    }

    #[test]
    fn test_device_mode_for_disable_clears_geometry_only() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let display = reader.displays().remove(0);
        let mode = DisplaySetting::disabled().to_device_mode(&display.device).unwrap();
        assert_eq!(mode.fields, fields::PELS_WIDTH | fields::PELS_HEIGHT | fields::POSITION);
        assert_eq!(mode.width, 0);
        assert_eq!(mode.height, 0);
    }

    #[test]
    fn test_missing_display_fails_before_submission() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let mut device = reader.displays().remove(0).device;
        device.display_name = String::new();
        let err = DisplaySetting::new(Size::new(1920, 1080), Point::new(0, 0), 60)
            .to_device_mode(&device)
            .unwrap_err();
        assert!(matches!(err, DisplayError::MissingDisplay(_)));
        assert!(os.submissions().is_empty());
    }

    #[test]
    fn test_origin_position_sets_primary_flag() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let display = reader.displays().remove(0);
        let setting = DisplaySetting::new(Size::new(2560, 1440), Point::new(0, 0), 144);
        reader.set_display_settings(&display, &setting, false).unwrap();

        let submissions = os.submissions();
        assert_eq!(submissions.len(), 1);
        assert_ne!(submissions[0].flags & change_flags::SET_PRIMARY, 0);
        assert_ne!(submissions[0].flags & change_flags::NO_RESET, 0);

        // Off-origin placement must not claim primary
        os.clear_submissions();
        let moved = DisplaySetting::new(Size::new(2560, 1440), Point::new(2560, 0), 144);
        reader.set_display_settings(&display, &moved, false).unwrap();
        assert_eq!(os.submissions()[0].flags & change_flags::SET_PRIMARY, 0);
    }

    #[test]
    fn test_invalid_display_fails_fast() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let display = reader.displays().remove(0);
        os.detach_monitor("MON\\A");

        let setting = DisplaySetting::new(Size::new(1920, 1080), Point::new(0, 0), 60);
        let err = reader.set_display_settings(&display, &setting, false).unwrap_err();
        assert!(matches!(err, DisplayError::InvalidDisplay(_)));
        assert!(os.submissions().is_empty());
    }

    #[test]
    fn test_cleanup_stages_exactly_one_disable_for_unmentioned_display() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let displays = reader.displays();
        let batch = vec![
            (displays[0].device.clone(), reader.current_setting(&displays[0])),
            (displays[1].device.clone(), reader.current_setting(&displays[1])),
        ];

        reader.save_display_settings(&batch, false).unwrap();

        let disables: Vec<_> = os.submissions().into_iter().filter(|s| s.is_disable()).collect();
        assert_eq!(disables.len(), 1);
        assert_eq!(disables[0].device_name, "\\\\.\\DISPLAY3");
    }

    #[test]
    fn test_batch_commit_applies_staged_changes() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let displays = reader.displays();
        let batch: Vec<_> = displays
            .iter()
            .map(|display| {
                let mut setting = reader.current_setting(display);
                setting.frequency = Rational::new(120, 1, false);
                (display.device.clone(), setting)
            })
            .collect();

        reader.save_display_settings(&batch, true).unwrap();

        for (_, setting) in settings_of(&os) {
            assert_eq!(setting.frequency.to_value(1), 120);
        }
    }

    #[test]
    fn test_batch_rollback_restores_pre_call_state() {
        let os = machine();
        let before = settings_of(&os);

        // Only the requested new mode is rejected, so the rollback's
        // restore of the old modes goes through
        os.reject_resolution("\\\\.\\DISPLAY2", Size::new(1024, 768), ChangeStatus::BadMode);
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let displays = reader.displays();
        let batch = vec![
            (
                displays[0].device.clone(),
                DisplaySetting::new(Size::new(1024, 768), Point::new(0, 0), 60),
            ),
            (
                displays[1].device.clone(),
                DisplaySetting::new(Size::new(1024, 768), Point::new(1024, 0), 60),
            ),
        ];

        let err = reader.save_display_settings(&batch, true).unwrap_err();
        assert!(matches!(
            err,
            DisplayError::ModeChangeFailed {
                status: ChangeStatus::BadMode,
                ..
            }
        ));

        assert_eq!(settings_of(&os), before);
    }

    #[test]
    fn test_rollback_failure_surfaces_original_error() {
        let os = machine();
        // The batch fails on the requested mode, and the rollback then
        // fails on a different display with a different status
        os.reject_resolution("\\\\.\\DISPLAY2", Size::new(1024, 768), ChangeStatus::Failed);
        os.reject_mode_changes_for("\\\\.\\DISPLAY1", ChangeStatus::BadMode);

        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let displays = reader.displays();
        let batch = vec![(
            displays[1].device.clone(),
            DisplaySetting::new(Size::new(1024, 768), Point::new(0, 0), 60),
        )];

        // The original failure surfaces, not the rollback's BadMode
        let err = reader.save_display_settings(&batch, true).unwrap_err();
        match err {
            DisplayError::ModeChangeFailed { status, device } => {
                assert_eq!(status, ChangeStatus::Failed);
                assert_eq!(device.unwrap().path, "MON\\B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_enable_and_disable_round_trip() {
        let os = machine();
        os.detach_monitor("MON\\C");
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        assert_eq!(reader.displays().len(), 2);

        let unattached = reader.unattached_displays().remove(0);
        let setting = DisplaySetting::new(Size::new(1920, 1080), Point::new(4480, 0), 60);
        reader.enable_display(&unattached, &setting, true).unwrap();
        reader.apply_saved_settings().unwrap();
        assert_eq!(reader.displays().len(), 3);

        let display = reader
            .to_display(&unattached)
            .expect("enabled display resolves to its attached counterpart");
        reader.disable_display(&display, true).unwrap();
        assert_eq!(reader.displays().len(), 2);
    }

    #[test]
    fn test_preferred_setting_ordering() {
        let mut os = machine();
        os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(2560, 1440), 144, 32);
        os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(2560, 1440), 60, 32);
        os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(3840, 2160), 30, 16);
        os.add_supported_mode("\\\\.\\DISPLAY1", Size::new(1920, 1080), 240, 32);

        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let display = reader.displays().remove(0);
        let preferred = reader.preferred_setting(&display.device).unwrap();
        // Color depth beats the larger 16-bit mode, area beats frequency
        assert_eq!(preferred.resolution, Size::new(2560, 1440));
        assert_eq!(preferred.frequency.to_value(1), 144);
    }

    #[test]
    fn test_gdi_primary_is_derived_from_current_setting() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let displays = reader.displays();
        assert!(reader.is_gdi_primary(&displays[0]));
        assert!(!reader.is_gdi_primary(&displays[1]));
    }
}
