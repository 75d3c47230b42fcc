use anyhow::Result;
use clap::{Parser, Subcommand};
use fabric_core::{Config, FabricController};
use std::path::PathBuf;
use tracing::debug;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "fabric")]
#[command(about = "VM fabric control-plane CLI", long_about = None)]
struct Cli {
    /// Namespace to operate in (defaults to the configured namespace)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show VMs in the namespace
    Info {
        /// Only show this VM
        vm: Option<String>,
    },

    /// Start a VM
    Start {
        vm: String,
    },

    /// Stop a VM
    Stop {
        vm: String,
    },

    /// Kill a VM and flush it from the scheduler
    Kill {
        vm: String,
    },

    /// Redeploy a VM with optional new resources
    Redeploy {
        vm: String,

        /// Number of vCPUs
        #[arg(short, long)]
        cpus: Option<u32>,

        /// Memory in MB
        #[arg(short, long)]
        memory: Option<u64>,

        /// Disk image to boot from
        #[arg(short, long)]
        disk: Option<String>,

        /// File to inject into the disk (SRC:DST, repeatable)
        #[arg(short, long, requires = "disk")]
        inject: Vec<String>,

        /// Disk partition receiving injected files
        #[arg(short, long, requires = "inject")]
        partition: Option<u32>,
    },

    /// Connect a VM interface to a VLAN
    Connect {
        vm: String,
        interface: usize,
        vlan: String,
    },

    /// Disconnect a VM interface
    Disconnect {
        vm: String,
        interface: usize,
    },

    /// Manage packet captures
    #[command(subcommand)]
    Capture(CaptureCommands),

    /// Launch all scheduled VMs and start them
    Launch,

    /// Clear the namespace
    Clear,

    /// Have the fabric read a command script
    Read {
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum CaptureCommands {
    /// List active captures (optionally for one VM)
    Ls {
        vm: Option<String>,
    },

    /// Start capturing packets on a VM interface
    Start {
        vm: String,
        interface: usize,
        file: String,
    },

    /// Stop all captures on a VM
    Stop {
        vm: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    fabric_core::init_observability(&config.log_level)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let fabric = FabricController::from_config(&config);
    let namespace = cli.namespace.or(config.namespace);
    debug!(?namespace, command = ?cli.command, "Dispatching command");

    commands::dispatch(&fabric, namespace, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeploy_args() {
        let cli = Cli::try_parse_from([
            "fabric", "-n", "exp", "redeploy", "web1", "--cpus", "4", "--disk", "base.qc2",
            "--inject", "/tmp/a:/etc/a", "--inject", "/tmp/b:/etc/b", "--partition", "1",
        ])
        .unwrap();

        assert_eq!(cli.namespace.as_deref(), Some("exp"));
        match cli.command {
            Commands::Redeploy { vm, cpus, memory, disk, inject, partition } => {
                assert_eq!(vm, "web1");
                assert_eq!(cpus, Some(4));
                assert_eq!(memory, None);
                assert_eq!(disk.as_deref(), Some("base.qc2"));
                assert_eq!(inject, vec!["/tmp/a:/etc/a", "/tmp/b:/etc/b"]);
                assert_eq!(partition, Some(1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_inject_requires_disk() {
        assert!(Cli::try_parse_from(["fabric", "redeploy", "web1", "--inject", "/a:/b"]).is_err());
    }

    #[test]
    fn test_namespace_after_subcommand() {
        let cli = Cli::try_parse_from(["fabric", "capture", "ls", "web1", "--namespace", "exp"])
            .unwrap();

        assert_eq!(cli.namespace.as_deref(), Some("exp"));
        assert!(matches!(cli.command, Commands::Capture(CaptureCommands::Ls { vm: Some(_) })));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
