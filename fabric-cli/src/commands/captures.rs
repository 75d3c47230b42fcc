//! `fabric capture ls` command

use anyhow::Result;
use fabric_core::{Capture, Fabric, Opt, Options};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct CaptureRow {
    #[tabled(rename = "VM")]
    vm: String,
    #[tabled(rename = "INTERFACE")]
    interface: usize,
    #[tabled(rename = "FILE")]
    filepath: String,
}

impl From<Capture> for CaptureRow {
    fn from(c: Capture) -> Self {
        Self { vm: c.vm, interface: c.interface, filepath: c.filepath }
    }
}

/// List captures in a namespace, optionally for one VM
pub async fn captures(fabric: &dyn Fabric, namespace: &str, vm: Option<String>) -> Result<()> {
    let ns = Opt::Namespace(namespace.to_string());

    let captures = match vm {
        Some(vm) => fabric.vm_captures(Options::new([ns, Opt::Vm(vm)])).await?,
        None => fabric.experiment_captures(Options::new([ns])).await?,
    };

    if captures.is_empty() {
        println!("No active captures");
        return Ok(());
    }

    let rows: Vec<CaptureRow> = captures.into_iter().map(CaptureRow::from).collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);

    Ok(())
}
