use serde::{Deserialize, Serialize};

/// A desktop-space position in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True when both coordinates are zero (the desktop origin)
    pub fn is_origin(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// A pixel extent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Color depth of a display mode, in bits per pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColorDepth {
    Depth8 = 8,
    Depth16 = 16,
    Depth24 = 24,
    #[default]
    Depth32 = 32,
}

impl ColorDepth {
    pub fn bits_per_pixel(self) -> u32 {
        self as u32
    }

    pub fn from_bits_per_pixel(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::Depth8),
            16 => Some(Self::Depth16),
            24 => Some(Self::Depth24),
            32 => Some(Self::Depth32),
            _ => None,
        }
    }
}

/// Rotation of the desktop image on a display, relative to its natural
/// orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Identity = 0,
    Rotate90 = 1,
    Rotate180 = 2,
    Rotate270 = 3,
}

/// Output behavior when presenting a low-resolution mode on a
/// higher-resolution display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixedOutput {
    /// Whatever the display decides
    #[default]
    Default = 0,
    /// Stretch the image to the panel
    Stretch = 1,
    /// Center the image at native pixel scale
    Center = 2,
}

/// Pixel format of a path source mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Bpp8 = 1,
    Bpp16 = 2,
    Bpp24 = 3,
    #[default]
    Bpp32 = 4,
    NonGdi = 5,
}

/// Rotation applied by a path target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Identity = 1,
    Rotate90 = 2,
    Rotate180 = 3,
    Rotate270 = 4,
}

/// Scaling applied by a path target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scaling {
    #[default]
    Identity = 1,
    Centered = 2,
    Stretched = 3,
    AspectRatioCenteredMax = 4,
    Custom = 5,
    Preferred = 128,
}

/// A well-known whole-machine path assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyId {
    /// Internal panel only
    Internal,
    /// Same image on every display
    Clone,
    /// Desktop spread across displays
    Extend,
    /// External displays only
    External,
}

impl TopologyId {
    /// The set-configuration flag bit selecting this topology
    pub fn as_flag(self) -> u32 {
        use crate::constants::set_config;
        match self {
            Self::Internal => set_config::TOPOLOGY_INTERNAL,
            Self::Clone => set_config::TOPOLOGY_CLONE,
            Self::Extend => set_config::TOPOLOGY_EXTEND,
            Self::External => set_config::TOPOLOGY_EXTERNAL,
        }
    }
}
