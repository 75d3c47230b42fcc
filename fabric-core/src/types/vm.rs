//! VM domain types.
//!
//! These are read-only projections of what the fabric reported at query time.
//! Nothing here is cached; every query rebuilds them from a fresh response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual machine as reported by the fabric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    /// Physical node running the VM
    pub host: String,

    /// VM name, unique within a namespace
    pub name: String,

    /// True only when the fabric reports the state as exactly `RUNNING`
    pub running: bool,

    /// Uptime in seconds (zero when the fabric value is absent or unparsable)
    pub uptime: f64,

    /// VLAN names, one per interface, ordered by interface index
    pub networks: Vec<String>,

    /// Tap device names, same ordering as `networks`
    pub taps: Vec<String>,

    /// Active packet captures bound to this VM
    pub captures: Vec<Capture>,
}

/// Active packet-capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Owning VM name
    pub vm: String,

    /// Zero-based interface index on the VM
    pub interface: usize,

    /// Output path on the capture node
    pub filepath: String,
}

/// VM type requested when scheduling a launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmKind {
    /// Hardware-virtualized VM
    #[default]
    Kvm,

    /// Container
    Container,
}

impl fmt::Display for VmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kvm => write!(f, "kvm"),
            Self::Container => write!(f, "container"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_kind_names() {
        assert_eq!(VmKind::default(), VmKind::Kvm);
        assert_eq!(VmKind::Container.to_string(), "container");
        assert_eq!(serde_json::to_string(&VmKind::Kvm).unwrap(), "\"kvm\"");
    }
}
