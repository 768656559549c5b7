//! Path-based configuration read models
//!
//! The path API describes the machine as source → targets bindings keyed by
//! adapter LUID instead of device path. Entities here are snapshots extracted
//! from one path enumeration; names, device paths and DPI scale are resolved
//! through the configuration capability on demand.
//!
//! Topology submissions on this surface have no client-side rollback: the OS
//! call applies atomically or fails atomically, unlike the staged legacy
//! engine in [`settings`](crate::settings).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{set_config, win32};
use crate::device::{DisplayAdapter, DisplayDevice};
use crate::error::{DisplayError, DisplayResult};
use crate::identity::{Luid, Rational};
use crate::os::{
    PathDescriptor, PathScope, PreferredMode, SourceModeDescriptor, TargetDescriptor, TargetDeviceInfo,
};
use crate::reader::DisplayTopologyReader;
use crate::scale::{DpiScale, ScaleSteps};
use crate::types::{PixelFormat, Point, Rotation, Scaling, Size, TopologyId};

/// A display adapter as identified by the path API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathDisplayAdapter {
    pub adapter_id: Luid,
}

impl PathDisplayAdapter {
    pub fn new(adapter_id: Luid) -> Self {
        Self { adapter_id }
    }

    /// An empty LUID carries no adapter; check before any device-path lookup.
    pub fn is_invalid(&self) -> bool {
        self.adapter_id.is_empty()
    }
}

/// A scan-out source slot on a path adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathDisplaySource {
    pub adapter: PathDisplayAdapter,
    pub source_id: u32,
}

impl PathDisplaySource {
    pub fn new(adapter: PathDisplayAdapter, source_id: u32) -> Self {
        Self { adapter, source_id }
    }
}

/// A physical output connector on a path adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathDisplayTarget {
    pub adapter: PathDisplayAdapter,
    pub target_id: u32,
}

impl PathDisplayTarget {
    pub fn new(adapter: PathDisplayAdapter, target_id: u32) -> Self {
        Self { adapter, target_id }
    }
}

/// One target leg of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathTargetInfo {
    pub target: PathDisplayTarget,
    pub rotation: Rotation,
    pub scaling: Scaling,
    pub refresh_rate: Rational,
}

impl PathTargetInfo {
    pub fn new(target: PathDisplayTarget) -> Self {
        Self {
            target,
            rotation: Rotation::default(),
            scaling: Scaling::default(),
            refresh_rate: Rational::new(0, 1, false),
        }
    }
}

/// A source bound to one or more targets, with the desktop placement of the
/// source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathInfo {
    pub source: PathDisplaySource,
    pub targets: Vec<PathTargetInfo>,
    pub position: Point,
    pub resolution: Size,
    pub pixel_format: PixelFormat,
    pub active: bool,
}

impl PathInfo {
    /// Builds an active path for submission.
    pub fn new(
        source: PathDisplaySource,
        targets: Vec<PathTargetInfo>,
        position: Point,
        resolution: Size,
        pixel_format: PixelFormat,
    ) -> Self {
        Self {
            source,
            targets,
            position,
            resolution,
            pixel_format,
            active: true,
        }
    }

    /// GDI primary: enabled and placed exactly at the desktop origin.
    /// Derived, never stored.
    pub fn is_gdi_primary(&self) -> bool {
        self.active && self.position.is_origin()
    }

    pub(crate) fn from_descriptor(descriptor: &PathDescriptor) -> Self {
        let source_mode = descriptor.source_mode.unwrap_or(SourceModeDescriptor {
            position: Point::default(),
            resolution: Size::default(),
            pixel_format: PixelFormat::default(),
        });
        Self {
            source: PathDisplaySource::new(
                PathDisplayAdapter::new(descriptor.source_adapter),
                descriptor.source_id,
            ),
            targets: descriptor
                .targets
                .iter()
                .map(|target| PathTargetInfo {
                    target: PathDisplayTarget::new(PathDisplayAdapter::new(target.adapter), target.target_id),
                    rotation: target.rotation,
                    scaling: target.scaling,
                    refresh_rate: target.refresh_rate,
                })
                .collect(),
            position: source_mode.position,
            resolution: source_mode.resolution,
            pixel_format: source_mode.pixel_format,
            active: descriptor.active,
        }
    }

    pub(crate) fn to_descriptor(&self) -> PathDescriptor {
        PathDescriptor {
            source_adapter: self.source.adapter.adapter_id,
            source_id: self.source.source_id,
            source_mode: Some(SourceModeDescriptor {
                position: self.position,
                resolution: self.resolution,
                pixel_format: self.pixel_format,
            }),
            targets: self
                .targets
                .iter()
                .map(|info| TargetDescriptor {
                    adapter: info.target.adapter.adapter_id,
                    target_id: info.target.target_id,
                    rotation: info.rotation,
                    scaling: info.scaling,
                    refresh_rate: info.refresh_rate,
                    available: true,
                })
                .collect(),
            active: self.active,
        }
    }
}

/// True when a path-API device path refers to the same hardware as a legacy
/// device path. Legacy paths use `\` separators; the path API reports
/// `#`-escaped interface paths under a `\\?\` prefix. This is best-effort
/// string matching over OS-formatted identifiers, not a typed join.
fn matches_legacy_path(config_path: &str, legacy_path: &str) -> bool {
    let converted = format!("\\\\?\\{}", legacy_path.replace('\\', "#"));
    config_path.starts_with(&converted)
}

impl<'a> DisplayTopologyReader<'a> {
    /// Paths in the given scope, as read models.
    pub fn path_infos(&self, scope: PathScope) -> DisplayResult<Vec<PathInfo>> {
        let descriptors = self.display_config.query_paths(scope)?;
        debug!(count = descriptors.len(), "enumerated display paths");
        Ok(descriptors.iter().map(PathInfo::from_descriptor).collect())
    }

    /// Adapters referenced by any path, source or target side, deduplicated
    /// by LUID with first-seen winning. Empty LUIDs are dropped.
    pub fn path_adapters(&self) -> DisplayResult<Vec<PathDisplayAdapter>> {
        let mut seen: HashSet<Luid> = HashSet::new();
        let mut adapters = Vec::new();
        for descriptor in self.display_config.query_paths(PathScope::All)? {
            let mut luids = vec![descriptor.source_adapter];
            luids.extend(descriptor.targets.iter().map(|target| target.adapter));
            for luid in luids {
                if !luid.is_empty() && seen.insert(luid) {
                    adapters.push(PathDisplayAdapter::new(luid));
                }
            }
        }
        Ok(adapters)
    }

    /// Sources referenced by any path, deduplicated by `(adapter, source id)`.
    pub fn path_sources(&self) -> DisplayResult<Vec<PathDisplaySource>> {
        let mut seen: HashSet<(Luid, u32)> = HashSet::new();
        let mut sources = Vec::new();
        for descriptor in self.display_config.query_paths(PathScope::All)? {
            if descriptor.source_adapter.is_empty() {
                continue;
            }
            if seen.insert((descriptor.source_adapter, descriptor.source_id)) {
                sources.push(PathDisplaySource::new(
                    PathDisplayAdapter::new(descriptor.source_adapter),
                    descriptor.source_id,
                ));
            }
        }
        Ok(sources)
    }

    /// Targets referenced by any path, deduplicated by `(adapter, target id)`.
    pub fn path_targets(&self) -> DisplayResult<Vec<PathDisplayTarget>> {
        let mut seen: HashSet<(Luid, u32)> = HashSet::new();
        let mut targets = Vec::new();
        for descriptor in self.display_config.query_paths(PathScope::All)? {
            for target in &descriptor.targets {
                if target.adapter.is_empty() {
                    continue;
                }
                if seen.insert((target.adapter, target.target_id)) {
                    targets.push(PathDisplayTarget::new(
                        PathDisplayAdapter::new(target.adapter),
                        target.target_id,
                    ));
                }
            }
        }
        Ok(targets)
    }

    /// Sources belonging to one adapter, filtered from a fresh path
    /// enumeration.
    pub fn adapter_sources(&self, adapter: &PathDisplayAdapter) -> DisplayResult<Vec<PathDisplaySource>> {
        Ok(self
            .path_sources()?
            .into_iter()
            .filter(|source| source.adapter == *adapter)
            .collect())
    }

    /// The path bound to a source, preferring an active binding over a
    /// merely-possible one. `None` when no enumerated path references the
    /// source.
    pub fn source_path_info(&self, source: &PathDisplaySource) -> DisplayResult<Option<PathInfo>> {
        let paths = self.path_infos(PathScope::All)?;
        Ok(paths
            .iter()
            .find(|path| path.active && path.source == *source)
            .or_else(|| paths.iter().find(|path| path.source == *source))
            .cloned())
    }

    /// Device path of a path adapter.
    pub fn path_adapter_device_path(&self, adapter: &PathDisplayAdapter) -> DisplayResult<String> {
        if adapter.is_invalid() {
            return Err(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER));
        }
        self.display_config.adapter_device_path(adapter.adapter_id)
    }

    /// GDI display name of a path source (`\\.\DISPLAY1`).
    pub fn path_source_display_name(&self, source: &PathDisplaySource) -> DisplayResult<String> {
        self.display_config
            .source_device_name(source.adapter.adapter_id, source.source_id)
    }

    /// Friendly name and interface device path of a path target.
    pub fn path_target_device(&self, target: &PathDisplayTarget) -> DisplayResult<TargetDeviceInfo> {
        self.display_config
            .target_device(target.adapter.adapter_id, target.target_id)
    }

    /// Preferred signal mode and resolution of a path target.
    pub fn path_target_preferred_mode(&self, target: &PathDisplayTarget) -> DisplayResult<PreferredMode> {
        self.display_config
            .target_preferred_mode(target.adapter.adapter_id, target.target_id)
    }

    /// DPI scale state of a path source.
    pub fn source_scale_steps(&self, source: &PathDisplaySource) -> DisplayResult<ScaleSteps> {
        self.display_config
            .source_dpi_scale(source.adapter.adapter_id, source.source_id)
    }

    /// Scales a path source to a named percentage. The submission is the
    /// signed step distance from the recommended scale.
    pub fn set_source_scale(&self, source: &PathDisplaySource, desired: DpiScale) -> DisplayResult<()> {
        let steps = self.source_scale_steps(source)?;
        let Some(relative) = steps.steps_to(desired) else {
            return Err(DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER));
        };
        debug!(source = source.source_id, %desired, relative, "submitting dpi scale change");
        self.display_config
            .set_source_dpi_scale(source.adapter.adapter_id, source.source_id, relative)
    }

    /// Resolves a path adapter to its legacy counterpart by matching the
    /// converted legacy device path as a prefix of the path-API device path.
    /// Inherently fuzzy; `None` means no legacy adapter matched.
    pub fn to_display_adapter(&self, adapter: &PathDisplayAdapter) -> DisplayResult<Option<DisplayAdapter>> {
        let device_path = self.path_adapter_device_path(adapter)?;
        Ok(self
            .display_adapters()
            .into_iter()
            .find(|legacy| matches_legacy_path(&device_path, &legacy.identity.path)))
    }

    /// Resolves a legacy adapter to its path-API counterpart. `None` when no
    /// enumerated path references matching hardware.
    pub fn to_path_adapter(&self, adapter: &DisplayAdapter) -> DisplayResult<Option<PathDisplayAdapter>> {
        for candidate in self.path_adapters()? {
            let device_path = self.path_adapter_device_path(&candidate)?;
            if matches_legacy_path(&device_path, &adapter.identity.path) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Legacy display devices driven by a path source, matched by GDI
    /// display name.
    pub fn source_display_devices(&self, source: &PathDisplaySource) -> DisplayResult<Vec<DisplayDevice>> {
        let display_name = self.path_source_display_name(source)?;
        Ok(self
            .display_adapters()
            .iter()
            .flat_map(|adapter| self.display_devices(adapter, None))
            .filter(|device| device.display_name == display_name)
            .collect())
    }

    /// The path source driving a legacy display device, matched by GDI
    /// display name.
    pub fn to_path_source(&self, device: &DisplayDevice) -> DisplayResult<Option<PathDisplaySource>> {
        for source in self.path_sources()? {
            if self.path_source_display_name(&source)? == device.display_name {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }

    /// The path target behind a legacy display device, matched by interface
    /// device path.
    pub fn to_path_target(&self, device: &DisplayDevice) -> DisplayResult<Option<PathDisplayTarget>> {
        for target in self.path_targets()? {
            if self.path_target_device(&target)?.device_path == device.identity.path {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    /// Submits a full desired path set, saving it to the connectivity
    /// database and applying it. `allow_changes` lets the OS adjust the
    /// supplied modes to make the set work.
    pub fn apply_path_infos(&self, paths: &[PathInfo], allow_changes: bool) -> DisplayResult<()> {
        let descriptors: Vec<PathDescriptor> = paths.iter().map(PathInfo::to_descriptor).collect();
        let mut flags = set_config::USE_SUPPLIED_DISPLAY_CONFIG | set_config::SAVE_TO_DATABASE | set_config::APPLY;
        if allow_changes {
            flags |= set_config::ALLOW_CHANGES;
        }
        info!(count = descriptors.len(), "applying display path set");
        self.display_config.set_paths(&descriptors, flags)
    }

    /// Applies a well-known topology (clone, extend, internal, external),
    /// optionally preferring the saved database entry for the current
    /// device set.
    pub fn apply_topology(&self, topology: TopologyId, use_saved_database: bool) -> DisplayResult<()> {
        info!(?topology, use_saved_database, "applying display topology");
        self.display_config.set_topology(topology, use_saved_database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedOs;

    const GPU: Luid = Luid { low: 0x1A2B, high: 0 };

    fn machine() -> SimulatedOs {
        let mut os = SimulatedOs::new();
        os.add_adapter("\\\\.\\DISPLAY1", "GPU A", "PCI\\VEN_10DE&DEV_2206\\4&12ab");
        os.add_monitor("\\\\.\\DISPLAY1", "MONITOR\\DEL40A9\\uid0", "\\Registry\\Machine\\a", true);
        os.set_adapter_device_path(GPU, "\\\\?\\PCI#VEN_10DE&DEV_2206#4&12ab#{5b45201d-f2f2-4f3b-85bb-30ff1f953599}");
        os.set_source_name(GPU, 0, "\\\\.\\DISPLAY1");
        os.set_target_device(
            GPU,
            1,
            TargetDeviceInfo {
                friendly_name: "Dell U2719D".to_string(),
                device_path: "MONITOR\\DEL40A9\\uid0".to_string(),
            },
        );
        os.add_path(PathDescriptor {
            source_adapter: GPU,
            source_id: 0,
            source_mode: Some(SourceModeDescriptor {
                position: Point::new(0, 0),
                resolution: Size::new(2560, 1440),
                pixel_format: PixelFormat::Bpp32,
            }),
            targets: vec![TargetDescriptor {
                adapter: GPU,
                target_id: 1,
                rotation: Rotation::Identity,
                scaling: Scaling::Identity,
                refresh_rate: Rational::new(144, 1, false),
                available: true,
            }],
            active: true,
        });
        // A merely-possible path on the same source slot
        os.add_path(PathDescriptor {
            source_adapter: GPU,
            source_id: 0,
            source_mode: None,
            targets: vec![TargetDescriptor {
                adapter: GPU,
                target_id: 2,
                rotation: Rotation::Identity,
                scaling: Scaling::Identity,
                refresh_rate: Rational::new(0, 1, false),
                available: false,
            }],
            active: false,
        });
        os
    }

    #[test]
    fn test_active_and_possible_paths_enumerate_separately() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        assert_eq!(reader.path_infos(PathScope::All).unwrap().len(), 2);

        let active = reader.path_infos(PathScope::Active).unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].active);
        assert_eq!(active[0].resolution, Size::new(2560, 1440));
    }

    #[test]
    fn test_adapter_dedup_skips_empty_luids() {
        let mut os = machine();
        os.add_path(PathDescriptor {
            source_adapter: Luid::default(),
            source_id: 9,
            source_mode: None,
            targets: Vec::new(),
            active: false,
        });
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        // GPU appears on both the source and target side of two paths
        let adapters = reader.path_adapters().unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].adapter_id, GPU);
    }

    #[test]
    fn test_source_and_target_dedup() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        // One source slot shared by both paths, two distinct targets
        assert_eq!(reader.path_sources().unwrap().len(), 1);
        assert_eq!(reader.path_targets().unwrap().len(), 2);
    }

    #[test]
    fn test_graph_accessors_filter_fresh_collections() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let adapter = reader.path_adapters().unwrap().remove(0);

        let sources = reader.adapter_sources(&adapter).unwrap();
        assert_eq!(sources.len(), 1);

        // Both an active and a possible path reference the source slot;
        // the active binding wins
        let path = reader.source_path_info(&sources[0]).unwrap().unwrap();
        assert!(path.active);
        assert_eq!(path.targets[0].target.target_id, 1);

        let stranger = PathDisplaySource::new(PathDisplayAdapter::new(Luid::new(9, 9)), 7);
        assert_eq!(reader.source_path_info(&stranger).unwrap(), None);
    }

    #[test]
    fn test_cross_reference_by_device_path_prefix() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let path_adapter = reader.path_adapters().unwrap().remove(0);

        let legacy = reader.to_display_adapter(&path_adapter).unwrap().unwrap();
        assert_eq!(legacy.identity.path, "PCI\\VEN_10DE&DEV_2206\\4&12ab");

        let back = reader.to_path_adapter(&legacy).unwrap().unwrap();
        assert_eq!(back, path_adapter);
    }

    #[test]
    fn test_cross_reference_tolerates_no_match() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let foreign = DisplayAdapter {
            identity: crate::identity::DeviceIdentity::new("PCI\\VEN_8086\\9", "iGPU", "\\Registry\\Machine\\i"),
        };
        assert_eq!(reader.to_path_adapter(&foreign).unwrap(), None);
    }

    #[test]
    fn test_source_resolves_to_display_devices_and_back() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let source = reader.path_sources().unwrap().remove(0);

        let devices = reader.source_display_devices(&source).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].identity.path, "MONITOR\\DEL40A9\\uid0");

        assert_eq!(reader.to_path_source(&devices[0]).unwrap(), Some(source));
        let target = reader.to_path_target(&devices[0]).unwrap().unwrap();
        assert_eq!(target.target_id, 1);
    }

    #[test]
    fn test_invalid_adapter_lookup_fails_before_the_call() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let empty = PathDisplayAdapter::new(Luid::default());
        let err = reader.path_adapter_device_path(&empty).unwrap_err();
        assert_eq!(err, DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER));
    }

    #[test]
    fn test_gdi_primary_requires_active_at_origin() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let paths = reader.path_infos(PathScope::All).unwrap();
        assert!(paths[0].is_gdi_primary());
        assert!(!paths[1].is_gdi_primary());

        let mut moved = paths[0].clone();
        moved.position = Point::new(2560, 0);
        assert!(!moved.is_gdi_primary());
    }

    #[test]
    fn test_apply_path_infos_saves_and_applies() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let paths = reader.path_infos(PathScope::Active).unwrap();
        reader.apply_path_infos(&paths, true).unwrap();

        let (descriptors, flags) = os.last_path_submission().unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_ne!(flags & set_config::APPLY, 0);
        assert_ne!(flags & set_config::SAVE_TO_DATABASE, 0);
        assert_ne!(flags & set_config::USE_SUPPLIED_DISPLAY_CONFIG, 0);
        assert_ne!(flags & set_config::ALLOW_CHANGES, 0);
    }

    #[test]
    fn test_apply_topology_forwards_identifier() {
        let os = machine();
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        reader.apply_topology(TopologyId::Extend, false).unwrap();
        assert_eq!(os.last_topology(), Some((TopologyId::Extend, false)));
    }

    #[test]
    fn test_source_scale_submission_is_relative_steps() {
        let mut os = machine();
        os.set_source_scale(GPU, 0, ScaleSteps::new(-2, 0, 2));
        let reader = DisplayTopologyReader::new(&os, &os, &os);
        let source = reader.path_sources().unwrap().remove(0);

        assert_eq!(
            reader.source_scale_steps(&source).unwrap().current_scale(),
            Some(DpiScale::Percent150)
        );

        reader.set_source_scale(&source, DpiScale::Percent200).unwrap();
        let steps = reader.source_scale_steps(&source).unwrap();
        assert_eq!(steps.current, 2);
        assert_eq!(steps.current_scale(), Some(DpiScale::Percent200));

        // Outside the supported range the step count cannot be expressed
        let err = reader.set_source_scale(&source, DpiScale::Percent500).unwrap_err();
        assert_eq!(err, DisplayError::ConfigCallFailed(win32::ERROR_INVALID_PARAMETER));
    }
}
