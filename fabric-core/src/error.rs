//! Error types for the fabric control plane.
//!
//! All errors use `thiserror` so each layer can wrap the one below it and keep
//! the full chain available through `source()`.

use crate::controller::RedeployStep;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fabric operations.
pub type Result<T> = std::result::Result<T, FabricError>;

/// Main error type for fabric operations.
#[derive(Error, Debug)]
pub enum FabricError {
    // Transport errors
    #[error("fabric command '{command}' failed: {reason}")]
    Transport { command: String, reason: String },

    #[error("{action}: {source}")]
    Command {
        action: String,
        #[source]
        source: Box<FabricError>,
    },

    // Workflow errors
    #[error("redeploying VM {vm} in namespace {namespace} failed at step '{step}': {source}")]
    RedeployFailed {
        vm: String,
        namespace: String,
        step: RedeployStep,
        #[source]
        source: Box<FabricError>,
    },

    #[error("disk config not found for VM {vm} in namespace {namespace}")]
    DiskConfigNotFound { vm: String, namespace: String },

    // Caller errors
    #[error("{operation} requires the {option} option")]
    MissingOption { option: &'static str, operation: &'static str },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FabricError {
    /// Wrap a lower-level failure with a description of the action being attempted.
    pub fn command(action: impl Into<String>, source: FabricError) -> Self {
        Self::Command { action: action.into(), source: Box::new(source) }
    }

    /// The redeploy step that failed, if this is a redeploy failure.
    pub fn failed_step(&self) -> Option<RedeployStep> {
        match self {
            Self::RedeployFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}
