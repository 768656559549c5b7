//! Native constants shared across the crate
//!
//! Bit masks and magic values of the display subsystem wire records, kept in
//! one place so the capability traits and the engine agree on them.

/// Device-mode field bits (which members of a mode record carry data)
pub mod fields {
    /// Desktop position is set
    pub const POSITION: u32 = 0x0000_0020;

    /// Display orientation is set
    pub const ORIENTATION: u32 = 0x0000_0080;

    /// Fixed-output scaling mode is set
    pub const FIXED_OUTPUT: u32 = 0x0000_0100;

    /// Color depth (bits per pixel) is set
    pub const BITS_PER_PIXEL: u32 = 0x0004_0000;

    /// Horizontal resolution is set
    pub const PELS_WIDTH: u32 = 0x0008_0000;

    /// Vertical resolution is set
    pub const PELS_HEIGHT: u32 = 0x0010_0000;

    /// Display flags (interlacing) are set
    pub const DISPLAY_FLAGS: u32 = 0x0020_0000;

    /// Refresh frequency is set
    pub const FREQUENCY: u32 = 0x0040_0000;
}

/// Display flags inside a device-mode record
pub mod display_flags {
    /// Interlaced scan-out
    pub const INTERLACED: u32 = 0x0000_0002;
}

/// Flags for submitting a mode change
pub mod change_flags {
    /// Persist the change in the registry
    pub const UPDATE_REGISTRY: u32 = 0x0000_0001;

    /// Save the change under the global settings key
    pub const GLOBAL: u32 = 0x0000_0008;

    /// Make this device the primary display
    pub const SET_PRIMARY: u32 = 0x0000_0010;

    /// Stage the change without applying it to the screen
    pub const NO_RESET: u32 = 0x1000_0000;

    /// Apply the change (and any staged changes) immediately
    pub const RESET: u32 = 0x4000_0000;
}

/// State flags reported for an enumerated display device
pub mod state_flags {
    /// Device is part of the desktop
    pub const ATTACHED_TO_DESKTOP: u32 = 0x0000_0001;

    /// Device is the primary desktop device
    pub const PRIMARY_DEVICE: u32 = 0x0000_0004;

    /// Device is a mirroring pseudo-device
    pub const MIRRORING_DRIVER: u32 = 0x0000_0008;
}

/// Flags for the legacy device enumeration call
pub mod enum_flags {
    /// Report the device interface path instead of the hardware id
    pub const GET_DEVICE_INTERFACE_NAME: u32 = 0x0000_0001;
}

/// Flags for submitting a path configuration
pub mod set_config {
    pub const TOPOLOGY_INTERNAL: u32 = 0x0000_0001;
    pub const TOPOLOGY_CLONE: u32 = 0x0000_0002;
    pub const TOPOLOGY_EXTEND: u32 = 0x0000_0004;
    pub const TOPOLOGY_EXTERNAL: u32 = 0x0000_0008;

    /// Pick the most recent saved configuration for the current device set
    pub const USE_DATABASE_CURRENT: u32 = 0x0000_000F;

    /// Use the caller-supplied path array
    pub const USE_SUPPLIED_DISPLAY_CONFIG: u32 = 0x0000_0020;

    /// Validate without applying
    pub const VALIDATE: u32 = 0x0000_0040;

    /// Apply the configuration
    pub const APPLY: u32 = 0x0000_0080;

    /// Persist the configuration in the connectivity database
    pub const SAVE_TO_DATABASE: u32 = 0x0000_0200;

    /// Let the OS tweak the supplied configuration to make it work
    pub const ALLOW_CHANGES: u32 = 0x0000_0400;
}

/// Raw status codes reused from the platform error space
pub mod win32 {
    pub const ERROR_INVALID_PARAMETER: i32 = 87;
}

/// Gamma lookup-table dimensions
pub mod gamma {
    /// Entries per color channel
    pub const DATA_POINTS: usize = 256;
}
