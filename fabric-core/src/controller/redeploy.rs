//! Redeploy workflow.
//!
//! A redeploy runs as a strictly sequential state machine:
//!
//! ```text
//! Clone → ClearMigrate → Kill → Flush → [ApplyCpu] → [ApplyMemory] → [ApplyDisk]
//!       → Schedule → LaunchPending → Start → Done
//! ```
//!
//! Bracketed steps only run when the matching override was supplied. The first
//! failing step moves the machine to `Failed` and nothing after it runs. There
//! is no rollback.

use super::{require, FabricController};
use crate::error::{FabricError, Result};
use crate::observability::metrics;
use crate::options::Options;
use crate::transport::Command;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Marker in a disk file name identifying a copy-on-write snapshot.
const SNAPSHOT_MARKER: &str = "_snapshot";

/// One step of the redeploy workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedeployStep {
    /// Clone the VM's current config into the working config
    Clone,
    /// Drop any stale migration directive from the cloned config
    ClearMigrate,
    /// Kill the running instance
    Kill,
    /// Release the killed VM from the scheduler
    Flush,
    ApplyCpu,
    ApplyMemory,
    /// Resolve and set the disk, snapshotting and injecting files when possible
    ApplyDisk,
    /// Schedule the working config under the original VM name
    Schedule,
    /// Launch every scheduled VM
    LaunchPending,
    Start,
}

impl RedeployStep {
    /// All steps in execution order.
    pub const ALL: [RedeployStep; 10] = [
        Self::Clone,
        Self::ClearMigrate,
        Self::Kill,
        Self::Flush,
        Self::ApplyCpu,
        Self::ApplyMemory,
        Self::ApplyDisk,
        Self::Schedule,
        Self::LaunchPending,
        Self::Start,
    ];
}

impl fmt::Display for RedeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clone => "clone",
            Self::ClearMigrate => "clear migrate config",
            Self::Kill => "kill",
            Self::Flush => "flush",
            Self::ApplyCpu => "apply cpu",
            Self::ApplyMemory => "apply memory",
            Self::ApplyDisk => "apply disk",
            Self::Schedule => "schedule",
            Self::LaunchPending => "launch pending",
            Self::Start => "start",
        };
        write!(f, "{}", name)
    }
}

/// Redeploy state machine.
#[derive(Debug)]
pub enum RedeployState {
    /// `step` is next to run
    Pending(RedeployStep),
    Done,
    Failed { step: RedeployStep, error: FabricError },
}

/// Validated inputs for one redeploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeployPlan {
    pub namespace: String,
    pub vm: String,
    pub cpu: Option<u32>,
    pub memory: Option<u64>,
    pub disk: Option<String>,
    pub injects: Vec<String>,
    pub inject_partition: u32,
}

impl RedeployPlan {
    /// Extract a plan from `opts`. Namespace and VM name are required.
    pub fn from_options(opts: &Options) -> Result<Self> {
        let namespace = require(opts.namespace(), "namespace", "redeploy_vm")?;
        let vm = require(opts.vm(), "vm", "redeploy_vm")?;

        Ok(Self {
            namespace: namespace.to_string(),
            vm: vm.to_string(),
            cpu: opts.cpu(),
            memory: opts.memory(),
            disk: opts.disk().map(str::to_string),
            injects: opts.injects().to_vec(),
            inject_partition: opts.inject_partition(),
        })
    }

    /// Whether `step` runs for this plan.
    pub fn includes(&self, step: RedeployStep) -> bool {
        match step {
            RedeployStep::ApplyCpu => self.cpu.is_some(),
            RedeployStep::ApplyMemory => self.memory.is_some(),
            RedeployStep::ApplyDisk => self.disk.is_some(),
            _ => true,
        }
    }

    /// Steps this plan runs, in order.
    pub fn steps(&self) -> Vec<RedeployStep> {
        RedeployStep::ALL.into_iter().filter(|&s| self.includes(s)).collect()
    }

    /// Initial state of the machine.
    pub fn start(&self) -> RedeployState {
        self.next(None)
    }

    /// State following a successful `step` (or the first state when `None`).
    pub fn next(&self, after: Option<RedeployStep>) -> RedeployState {
        let skip = match after {
            Some(step) => RedeployStep::ALL.iter().position(|&s| s == step).map_or(0, |i| i + 1),
            None => 0,
        };

        RedeployStep::ALL
            .into_iter()
            .skip(skip)
            .find(|&s| self.includes(s))
            .map_or(RedeployState::Done, RedeployState::Pending)
    }

    fn scope(&self) -> String {
        format!("VM {} in namespace {}", self.vm, self.namespace)
    }
}

impl FabricController {
    /// Drive `plan` to completion or to its first failing step.
    pub(crate) async fn redeploy(&self, plan: RedeployPlan) -> Result<()> {
        metrics::record_redeploy();
        let mut state = plan.start();

        loop {
            state = match state {
                RedeployState::Pending(step) => {
                    debug!(vm = %plan.vm, namespace = %plan.namespace, %step, "Running redeploy step");
                    match self.run_step(&plan, step).await {
                        Ok(()) => plan.next(Some(step)),
                        Err(error) => RedeployState::Failed { step, error },
                    }
                }
                RedeployState::Done => {
                    info!(vm = %plan.vm, namespace = %plan.namespace, "Redeployed VM");
                    return Ok(());
                }
                RedeployState::Failed { step, error } => {
                    warn!(vm = %plan.vm, namespace = %plan.namespace, %step, error = %error, "Redeploy aborted");
                    metrics::record_redeploy_failure(&step.to_string());
                    return Err(FabricError::RedeployFailed {
                        vm: plan.vm,
                        namespace: plan.namespace,
                        step,
                        source: Box::new(error),
                    });
                }
            };
        }
    }

    async fn run_step(&self, plan: &RedeployPlan, step: RedeployStep) -> Result<()> {
        let ns = plan.namespace.as_str();
        let vm = plan.vm.as_str();

        match step {
            RedeployStep::Clone => {
                self.mutate(
                    "config_clone",
                    Command::namespaced(ns, format!("vm config clone {}", vm)),
                    format!("cloning {}", plan.scope()),
                )
                .await
            }
            RedeployStep::ClearMigrate => {
                self.mutate(
                    "config_clear",
                    Command::namespaced(ns, "clear vm config migrate"),
                    format!("clearing migrate config for {}", plan.scope()),
                )
                .await
            }
            RedeployStep::Kill => {
                self.mutate(
                    "kill",
                    Command::namespaced(ns, format!("vm kill {}", vm)),
                    format!("killing {}", plan.scope()),
                )
                .await
            }
            RedeployStep::Flush => self.flush(ns).await,
            RedeployStep::ApplyCpu => match plan.cpu {
                Some(cpu) => {
                    self.mutate(
                        "config_vcpus",
                        Command::namespaced(ns, format!("vm config vcpus {}", cpu)),
                        format!("configuring VCPUs for {}", plan.scope()),
                    )
                    .await
                }
                None => Ok(()),
            },
            RedeployStep::ApplyMemory => match plan.memory {
                Some(mem) => {
                    self.mutate(
                        "config_mem",
                        Command::namespaced(ns, format!("vm config mem {}", mem)),
                        format!("configuring memory for {}", plan.scope()),
                    )
                    .await
                }
                None => Ok(()),
            },
            RedeployStep::ApplyDisk => match &plan.disk {
                Some(disk) => self.apply_disk(plan, disk).await,
                None => Ok(()),
            },
            RedeployStep::Schedule => {
                self.mutate(
                    "launch",
                    Command::namespaced(ns, format!("vm launch {} {}", self.vm_kind(), vm)),
                    format!("scheduling {}", plan.scope()),
                )
                .await
            }
            RedeployStep::LaunchPending => {
                self.mutate(
                    "launch",
                    Command::namespaced(ns, "vm launch"),
                    format!("launching scheduled VMs in namespace {}", ns),
                )
                .await
            }
            RedeployStep::Start => {
                self.mutate(
                    "start",
                    Command::namespaced(ns, format!("vm start {}", vm)),
                    format!("starting {}", plan.scope()),
                )
                .await
            }
        }
    }

    async fn apply_disk(&self, plan: &RedeployPlan, disk: &str) -> Result<()> {
        let resolved = if plan.injects.is_empty() {
            disk.to_string()
        } else {
            self.prepare_injected_disk(plan, disk).await?
        };

        self.mutate(
            "config_disk",
            Command::namespaced(&plan.namespace, format!("vm config disk {}", resolved)),
            format!("configuring disk for {}", plan.scope()),
        )
        .await
    }

    /// Snapshot `disk` onto the VM's current snapshot file and inject files into it.
    ///
    /// Returns the disk the VM should use. When the current disk is not a
    /// snapshot, `disk` is returned unchanged and no files are injected.
    async fn prepare_injected_disk(&self, plan: &RedeployPlan, disk: &str) -> Result<String> {
        let ns = plan.namespace.as_str();

        let cmd = Command::namespaced(ns, "vm config disk")
            .with_columns(["disks"])
            .with_filter("name", &plan.vm);
        let rows = self.exec("config_disk", cmd).await.map_err(|e| {
            FabricError::command(format!("querying disk config for {}", plan.scope()), e)
        })?;

        // Filtered by VM name, so at most one row is expected.
        let Some(config) = rows.first() else {
            return Err(FabricError::DiskConfigNotFound {
                vm: plan.vm.clone(),
                namespace: plan.namespace.clone(),
            });
        };

        let current = config.get("disks").map(String::as_str).map(base_name).unwrap_or_default();

        if !current.contains(SNAPSHOT_MARKER) {
            warn!(
                vm = %plan.vm,
                namespace = ns,
                current_disk = %current,
                "Current disk is not a snapshot; using {} directly without injecting files",
                disk
            );
            return Ok(disk.to_string());
        }

        self.mutate(
            "disk_snapshot",
            Command::namespaced(ns, format!("disk snapshot {} {}", disk, current)),
            format!("snapshotting disk for {}", plan.scope()),
        )
        .await?;

        self.mutate(
            "disk_inject",
            Command::new(format!(
                "disk inject {}:{} files {}",
                current,
                plan.inject_partition,
                plan.injects.join(" ")
            )),
            format!("injecting files into disk {}", current),
        )
        .await?;

        Ok(current)
    }
}

fn base_name(path: &str) -> String {
    Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
