//! Identity value types
//!
//! Device identity as the OS reports it, the 64-bit locally-unique adapter
//! id used by the path-based configuration API, and the exact rational used
//! for refresh-rate representation.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identity of a display-related device as seen by the legacy enumeration.
///
/// Two identities name the same logical device iff `path` and `registry_key`
/// are equal. The device name is excluded on purpose: it is not stable
/// across reattachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// OS device path (hardware id or interface path)
    pub path: String,
    /// Human-readable device name
    pub name: String,
    /// Registry address of the device driver and configuration
    pub registry_key: String,
}

impl DeviceIdentity {
    pub fn new(path: impl Into<String>, name: impl Into<String>, registry_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            registry_key: registry_key.into(),
        }
    }

    /// Structural identity on `(path, registry_key)`
    pub fn same_device(&self, other: &DeviceIdentity) -> bool {
        self.path == other.path && self.registry_key == other.registry_key
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.same_device(other)
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.registry_key.hash(state);
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Locally-unique identifier, a 64-bit value unique only on the machine
/// that generated it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Luid {
    pub low: u32,
    pub high: i32,
}

impl Luid {
    pub fn new(low: u32, high: i32) -> Self {
        Self { low, high }
    }

    /// True when this id holds no real data ("no adapter"). Must be checked
    /// before using the id for device-path lookups.
    pub fn is_empty(&self) -> bool {
        self.low == 0 && self.high == 0
    }
}

impl std::fmt::Display for Luid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ {:X} - {:X} }}", self.low, self.high)
    }
}

/// An exact rational number as carried by path signal descriptors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    /// Builds a rational, optionally reducing both terms by their greatest
    /// common divisor. A zero numerator skips reduction; avoiding a zero
    /// denominator is the caller's responsibility.
    pub fn new(numerator: u64, denominator: u64, simplify: bool) -> Self {
        let gcd = if simplify && numerator != 0 {
            euclidean(numerator, denominator)
        } else {
            1
        };
        Self {
            numerator: (numerator / gcd) as u32,
            denominator: (denominator / gcd) as u32,
        }
    }

    /// Whole-unit value of the scaled ratio using integer arithmetic; this
    /// is how a refresh-rate rational becomes whole hertz.
    pub fn to_value(&self, multiplier: u64) -> u64 {
        if self.numerator == 0 {
            return 0;
        }
        self.numerator as u64 * multiplier / self.denominator as u64
    }
}

/// Equality compares the integer-divided ratio of both sides. For non-exact
/// ratios this is intentionally lossy (3/2 and 4/3 both divide to 1); it is
/// a known approximation, not something to fix.
impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.numerator / self.denominator == other.numerator / other.denominator
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

fn euclidean(mut a: u64, mut b: u64) -> u64 {
    while a != 0 && b != 0 {
        if a > b {
            a %= b;
        } else {
            b %= a;
        }
    }
    if a == 0 { b } else { a }
}
