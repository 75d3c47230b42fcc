//! CLI command implementations

use crate::{CaptureCommands, Commands};
use anyhow::{Context, Result};
use fabric_core::{Fabric, Opt, Options};

pub mod captures;
pub mod info;

/// Namespace is required by every command except `read`.
fn require_namespace(namespace: Option<String>) -> Result<String> {
    namespace.context("no namespace given; pass --namespace or set one in the config file")
}

/// Options targeting `vm` in `namespace`, plus `extra`.
fn target(namespace: &str, vm: String, extra: Vec<Opt>) -> Options {
    let mut opts = vec![Opt::Namespace(namespace.to_string()), Opt::Vm(vm)];
    opts.extend(extra);
    Options::new(opts)
}

/// Run one parsed command against `fabric`.
pub(crate) async fn dispatch(
    fabric: &dyn Fabric,
    namespace: Option<String>,
    command: Commands,
) -> Result<()> {
    if let Commands::Read { path } = &command {
        fabric.read_script(path).await?;
        println!("Script read: {}", path);
        return Ok(());
    }

    let ns = require_namespace(namespace)?;

    match command {
        Commands::Info { vm } => info::info(fabric, &ns, vm).await?,

        Commands::Start { vm } => {
            fabric.start_vm(target(&ns, vm.clone(), vec![])).await?;
            println!("VM started: {}", vm);
        }

        Commands::Stop { vm } => {
            fabric.stop_vm(target(&ns, vm.clone(), vec![])).await?;
            println!("VM stopped: {}", vm);
        }

        Commands::Kill { vm } => {
            fabric.kill_vm(target(&ns, vm.clone(), vec![])).await?;
            println!("VM killed: {}", vm);
        }

        Commands::Redeploy { vm, cpus, memory, disk, inject, partition } => {
            let mut extra = Vec::new();
            extra.extend(cpus.map(Opt::Cpu));
            extra.extend(memory.map(Opt::Memory));
            extra.extend(disk.map(Opt::Disk));
            extra.push(Opt::Injects(inject));
            extra.extend(partition.map(Opt::InjectPartition));

            fabric.redeploy_vm(target(&ns, vm.clone(), extra)).await?;
            println!("VM redeployed: {}", vm);
        }

        Commands::Connect { vm, interface, vlan } => {
            let extra = vec![Opt::Interface(interface), Opt::Vlan(vlan.clone())];
            fabric.connect_interface(target(&ns, vm.clone(), extra)).await?;
            println!("Interface {} on {} connected to {}", interface, vm, vlan);
        }

        Commands::Disconnect { vm, interface } => {
            fabric
                .disconnect_interface(target(&ns, vm.clone(), vec![Opt::Interface(interface)]))
                .await?;
            println!("Interface {} on {} disconnected", interface, vm);
        }

        Commands::Capture(CaptureCommands::Ls { vm }) => captures::captures(fabric, &ns, vm).await?,

        Commands::Capture(CaptureCommands::Start { vm, interface, file }) => {
            let extra = vec![Opt::Interface(interface), Opt::CaptureFile(file.clone())];
            fabric.start_capture(target(&ns, vm.clone(), extra)).await?;
            println!("Capturing interface {} on {} to {}", interface, vm, file);
        }

        Commands::Capture(CaptureCommands::Stop { vm }) => {
            fabric.stop_capture(target(&ns, vm.clone(), vec![])).await?;
            println!("Captures stopped on {}", vm);
        }

        Commands::Launch => {
            fabric.launch_vms(&ns).await?;
            println!("Scheduled VMs launched in {}", ns);
        }

        Commands::Clear => {
            fabric.clear_namespace(&ns).await?;
            println!("Namespace cleared: {}", ns);
        }

        // Handled before the namespace check
        Commands::Read { .. } => {}
    }

    Ok(())
}
