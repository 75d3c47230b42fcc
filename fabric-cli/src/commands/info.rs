//! `fabric info` command

use anyhow::Result;
use fabric_core::{Fabric, Opt, Options, Vm};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct VmRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "UPTIME")]
    uptime: String,
    #[tabled(rename = "NETWORKS")]
    networks: String,
    #[tabled(rename = "TAPS")]
    taps: String,
    #[tabled(rename = "CAPTURES")]
    captures: usize,
}

impl From<Vm> for VmRow {
    fn from(vm: Vm) -> Self {
        Self {
            host: vm.host,
            name: vm.name,
            state: if vm.running { "running" } else { "not running" }.to_string(),
            uptime: format!("{}s", vm.uptime.round() as u64),
            networks: vm.networks.join(", "),
            taps: vm.taps.join(", "),
            captures: vm.captures.len(),
        }
    }
}

/// Show VMs in a namespace
pub async fn info(fabric: &dyn Fabric, namespace: &str, vm: Option<String>) -> Result<()> {
    let mut opts = vec![Opt::Namespace(namespace.to_string())];
    opts.extend(vm.map(Opt::Vm));

    let vms = fabric.vm_info(Options::new(opts)).await?;

    if vms.is_empty() {
        println!("No VMs in namespace {}", namespace);
        return Ok(());
    }

    let rows: Vec<VmRow> = vms.into_iter().map(VmRow::from).collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);

    Ok(())
}
