#![forbid(unsafe_code)]

//! Display output configuration: discovery, topology, transactional apply.
//!
//! The crate models the directed graph of display paths on a machine
//! (adapters → sources → targets), reconciles the legacy per-device and the
//! path-based enumeration families into identity-stable read models, and
//! applies settings and topology changes with snapshot/rollback semantics.
//! The OS display subsystem is consumed through the capability traits in
//! [`os`]; nothing here links a platform API. [`sim`] provides an in-memory
//! subsystem for tests and experimentation.
//!
//! Every query is a fresh, blocking snapshot of live OS state. Entities are
//! plain data and are never cached across calls; mutation happens only by
//! submitting a new desired [`DisplaySetting`] batch or [`PathInfo`] set.

pub mod constants;
pub mod device;
pub mod error;
pub mod gamma;
pub mod identity;
pub mod os;
pub mod path;
pub mod reader;
pub mod registry;
pub mod scale;
pub mod settings;
pub mod sim;
pub mod types;

pub use device::{Display, DisplayAdapter, DisplayDevice, UnattachedDisplay};
pub use error::{DisplayError, DisplayResult};
pub use gamma::GammaRamp;
pub use identity::{DeviceIdentity, Luid, Rational};
pub use path::{PathDisplayAdapter, PathDisplaySource, PathDisplayTarget, PathInfo, PathTargetInfo};
pub use reader::DisplayTopologyReader;
pub use registry::{RegistryAddress, RegistryHive};
pub use scale::{DpiScale, ScaleSteps};
pub use settings::{DisplaySetting, PossibleSetting};
pub use types::{ColorDepth, FixedOutput, Orientation, PixelFormat, Point, Rotation, Scaling, Size, TopologyId};
