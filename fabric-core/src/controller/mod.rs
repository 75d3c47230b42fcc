//! Fabric controller: VM lifecycle operations as ordered command sequences.
//!
//! Every operation is expressed against the [`Fabric`] trait so callers can
//! depend on the capability rather than the concrete controller. The single
//! production implementation, [`FabricController`], holds no state between
//! calls beyond its transport handle. It issues commands one at a time and
//! awaits each before issuing the next.
//!
//! Concurrent calls are only as isolated as the namespaces they target. There
//! is no per-VM lock, so two redeploys of the same VM in the same namespace
//! may interleave.

use crate::config::Config;
use crate::decode::{self, DecodeAnomaly, Decoded, CAPTURE_COLUMNS, VM_COLUMNS};
use crate::error::{FabricError, Result};
use crate::observability::metrics;
use crate::options::Options;
use crate::transport::{Command, CommandTransport, MinimegaCli, Row};
use crate::types::{Capture, Vm, VmKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

mod redeploy;

pub use redeploy::{RedeployPlan, RedeployState, RedeployStep};

/// VM lifecycle capability exposed by the control plane.
#[async_trait]
pub trait Fabric: Send + Sync {
    /// Have the fabric read and execute a command script at `path`.
    async fn read_script(&self, path: &str) -> Result<()>;

    /// Remove a namespace and everything in it.
    async fn clear_namespace(&self, namespace: &str) -> Result<()>;

    /// Launch every scheduled VM in `namespace`, then start them all.
    async fn launch_vms(&self, namespace: &str) -> Result<()>;

    /// Query VMs (optionally filtered to one name) with their captures attached.
    async fn vm_info(&self, opts: Options) -> Result<Vec<Vm>>;

    async fn start_vm(&self, opts: Options) -> Result<()>;

    async fn stop_vm(&self, opts: Options) -> Result<()>;

    /// Kill a VM and flush it from the scheduler.
    async fn kill_vm(&self, opts: Options) -> Result<()>;

    /// Rebuild a VM from its cloned config with optional resource overrides.
    ///
    /// Not atomic: a failing step aborts the workflow and leaves the fabric in
    /// whatever state the last successful step produced.
    async fn redeploy_vm(&self, opts: Options) -> Result<()>;

    async fn connect_interface(&self, opts: Options) -> Result<()>;

    async fn disconnect_interface(&self, opts: Options) -> Result<()>;

    async fn start_capture(&self, opts: Options) -> Result<()>;

    /// Stop every capture on a VM.
    async fn stop_capture(&self, opts: Options) -> Result<()>;

    /// All active captures in a namespace.
    async fn experiment_captures(&self, opts: Options) -> Result<Vec<Capture>>;

    /// Active captures in a namespace owned by one VM.
    async fn vm_captures(&self, opts: Options) -> Result<Vec<Capture>>;
}

/// Controller driving the fabric through a [`CommandTransport`].
#[derive(Clone)]
pub struct FabricController {
    transport: Arc<dyn CommandTransport>,
    vm_kind: VmKind,
    diagnostics: Option<mpsc::UnboundedSender<DecodeAnomaly>>,
}

impl FabricController {
    /// Create a controller on top of `transport`.
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self { transport, vm_kind: VmKind::default(), diagnostics: None }
    }

    /// Create a controller using the fabric CLI transport described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let transport = MinimegaCli::new(&config.minimega_binary, &config.base_dir);
        Self::new(Arc::new(transport)).with_vm_kind(config.vm_kind)
    }

    /// VM type used when a redeploy schedules its launch.
    pub fn with_vm_kind(mut self, kind: VmKind) -> Self {
        self.vm_kind = kind;
        self
    }

    /// Forward decode anomalies to `sink` in addition to logging them.
    pub fn with_diagnostics(mut self, sink: mpsc::UnboundedSender<DecodeAnomaly>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn vm_kind(&self) -> VmKind {
        self.vm_kind
    }

    /// Execute one command, recording it and its outcome.
    async fn exec(&self, op: &'static str, cmd: Command) -> Result<Vec<Row>> {
        debug!(transport = self.transport.name(), command = %cmd, "Issuing fabric command");
        metrics::record_command(op);

        self.transport.run(&cmd).await.map_err(|e| {
            warn!(command = %cmd, error = %e, "Fabric command failed");
            metrics::record_command_failure(op);
            e
        })
    }

    /// Execute a mutating command, wrapping any failure with `action`.
    async fn mutate(&self, op: &'static str, cmd: Command, action: String) -> Result<()> {
        self.exec(op, cmd).await.map(drop).map_err(|e| FabricError::command(action, e))
    }

    /// Release killed VMs from the scheduler.
    async fn flush(&self, namespace: &str) -> Result<()> {
        self.mutate(
            "flush",
            Command::namespaced(namespace, "vm flush"),
            format!("flushing VMs in namespace {}", namespace),
        )
        .await
    }

    fn report(&self, anomalies: Vec<DecodeAnomaly>) {
        for anomaly in anomalies {
            warn!(kind = anomaly.kind(), "Decode anomaly: {}", anomaly);
            metrics::record_decode_anomaly(anomaly.kind());

            if let Some(sink) = &self.diagnostics {
                // Ignore send errors (receiver dropped)
                let _ = sink.send(anomaly);
            }
        }
    }

    async fn captures_in(&self, namespace: &str) -> Result<Vec<Capture>> {
        let cmd = Command::namespaced(namespace, "capture").with_columns(CAPTURE_COLUMNS);
        let rows = self.exec("captures", cmd).await.map_err(|e| {
            FabricError::command(format!("querying captures in namespace {}", namespace), e)
        })?;

        let Decoded { items, anomalies } = decode::decode_captures(&rows);
        self.report(anomalies);
        Ok(items)
    }

    async fn captures_of(&self, namespace: &str, vm: &str) -> Result<Vec<Capture>> {
        let captures = self.captures_in(namespace).await?;
        Ok(captures.into_iter().filter(|c| c.vm == vm).collect())
    }
}

fn require<'a>(
    value: Option<&'a str>,
    option: &'static str,
    operation: &'static str,
) -> Result<&'a str> {
    value.ok_or(FabricError::MissingOption { option, operation })
}

/// Namespace and VM name, both required by per-VM operations.
fn target<'a>(opts: &'a Options, operation: &'static str) -> Result<(&'a str, &'a str)> {
    let ns = require(opts.namespace(), "namespace", operation)?;
    let vm = require(opts.vm(), "vm", operation)?;
    Ok((ns, vm))
}

#[async_trait]
impl Fabric for FabricController {
    #[instrument(skip(self))]
    async fn read_script(&self, path: &str) -> Result<()> {
        self.mutate(
            "read_script",
            Command::new(format!("read {}", path)),
            format!("reading command script {}", path),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn clear_namespace(&self, namespace: &str) -> Result<()> {
        self.mutate(
            "clear_namespace",
            Command::new(format!("clear namespace {}", namespace)),
            format!("clearing namespace {}", namespace),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn launch_vms(&self, namespace: &str) -> Result<()> {
        self.mutate(
            "launch",
            Command::namespaced(namespace, "vm launch"),
            format!("launching VMs in namespace {}", namespace),
        )
        .await?;

        self.mutate(
            "start",
            Command::namespaced(namespace, "vm start all"),
            format!("starting VMs in namespace {}", namespace),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn vm_info(&self, opts: Options) -> Result<Vec<Vm>> {
        let ns = require(opts.namespace(), "namespace", "vm_info")?;

        let mut cmd = Command::namespaced(ns, "vm info").with_columns(VM_COLUMNS);
        if let Some(vm) = opts.vm() {
            cmd = cmd.with_filter("name", vm);
        }

        let rows = self
            .exec("vm_info", cmd)
            .await
            .map_err(|e| FabricError::command(format!("querying VMs in namespace {}", ns), e))?;

        let Decoded { items: mut vms, anomalies } = decode::decode_vms(&rows);
        self.report(anomalies);

        // Captures are re-fetched for every VM rather than joined once.
        for vm in &mut vms {
            vm.captures = self.captures_of(ns, &vm.name).await?;
        }

        Ok(vms)
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn start_vm(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "start_vm")?;
        self.mutate(
            "start",
            Command::namespaced(ns, format!("vm start {}", vm)),
            format!("starting VM {} in namespace {}", vm, ns),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn stop_vm(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "stop_vm")?;
        self.mutate(
            "stop",
            Command::namespaced(ns, format!("vm stop {}", vm)),
            format!("stopping VM {} in namespace {}", vm, ns),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn kill_vm(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "kill_vm")?;
        self.mutate(
            "kill",
            Command::namespaced(ns, format!("vm kill {}", vm)),
            format!("killing VM {} in namespace {}", vm, ns),
        )
        .await?;

        self.flush(ns).await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn redeploy_vm(&self, opts: Options) -> Result<()> {
        let plan = RedeployPlan::from_options(&opts)?;
        self.redeploy(plan).await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn connect_interface(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "connect_interface")?;
        let vlan = require(opts.vlan(), "vlan", "connect_interface")?;
        let iface = opts.interface();

        self.mutate(
            "net_connect",
            Command::namespaced(ns, format!("vm net connect {} {} {}", vm, iface, vlan)),
            format!(
                "connecting interface {} on VM {} to VLAN {} in namespace {}",
                iface, vm, vlan, ns
            ),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn disconnect_interface(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "disconnect_interface")?;
        let iface = opts.interface();

        self.mutate(
            "net_disconnect",
            Command::namespaced(ns, format!("vm net disconnect {} {}", vm, iface)),
            format!("disconnecting interface {} on VM {} in namespace {}", iface, vm, ns),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn start_capture(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "start_capture")?;
        let file = require(opts.capture_file(), "capture file", "start_capture")?;
        let iface = opts.interface();

        self.mutate(
            "capture_start",
            Command::namespaced(ns, format!("capture pcap vm {} {} {}", vm, iface, file)),
            format!(
                "starting VM capture for interface {} on VM {} in namespace {}",
                iface, vm, ns
            ),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn stop_capture(&self, opts: Options) -> Result<()> {
        let (ns, vm) = target(&opts, "stop_capture")?;
        self.mutate(
            "capture_stop",
            Command::namespaced(ns, format!("capture pcap delete vm {}", vm)),
            format!("deleting VM captures for VM {} in namespace {}", vm, ns),
        )
        .await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace()))]
    async fn experiment_captures(&self, opts: Options) -> Result<Vec<Capture>> {
        let ns = require(opts.namespace(), "namespace", "experiment_captures")?;
        self.captures_in(ns).await
    }

    #[instrument(skip(self, opts), fields(namespace = ?opts.namespace(), vm = ?opts.vm()))]
    async fn vm_captures(&self, opts: Options) -> Result<Vec<Capture>> {
        let (ns, vm) = target(&opts, "vm_captures")?;
        self.captures_of(ns, vm).await
    }
}
