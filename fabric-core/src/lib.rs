//! Fabric Core Library
//!
//! Command orchestration for a remote VM fabric: option sets, the controller
//! workflows that turn one intent into an ordered command sequence, and the
//! decoding of tabular responses into typed VMs and captures.

pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod observability;
pub mod options;
pub mod paths;
pub mod transport;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use controller::{Fabric, FabricController, RedeployStep};
pub use decode::DecodeAnomaly;
pub use error::{FabricError, Result};
pub use observability::init as init_observability;
pub use options::{Opt, Options};
pub use transport::{Command, CommandTransport, MinimegaCli, Row};
pub use types::{Capture, Vm, VmKind};
