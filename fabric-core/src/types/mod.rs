//! Domain types projected from fabric state.

pub mod vm;

pub use vm::{Capture, Vm, VmKind};
