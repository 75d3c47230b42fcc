//! Transport backed by the fabric's own command-line client.
//!
//! Each [`Command`] becomes one `minimega -base <dir> -e ...` invocation with
//! JSON output enabled. Column projection, filters and namespace scoping are
//! expressed as the client's command prefixes:
//!
//! ```text
//! .json true .columns host,name .filter name=web1 namespace exp vm info
//! ```
//!
//! The client prints one JSON array of per-host responses. Tabular responses
//! are flattened into rows; a non-empty per-host `Error` fails the command.

use crate::error::{FabricError, Result};
use crate::transport::{Command, CommandTransport, Row};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command as Process;
use tracing::{debug, instrument};

/// Per-host response as printed by the fabric client in JSON mode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostResponse {
    #[serde(rename = "Host")]
    host: String,

    #[serde(rename = "Header")]
    header: Option<Vec<String>>,

    #[serde(rename = "Tabular")]
    tabular: Option<Vec<Vec<String>>>,

    #[serde(rename = "Error")]
    error: String,
}

/// Production transport that shells out to the fabric client binary.
#[derive(Debug, Clone)]
pub struct MinimegaCli {
    /// Path to the client binary
    binary: PathBuf,
    /// Base directory of the running fabric instance (holds its control socket)
    base_dir: PathBuf,
}

impl MinimegaCli {
    /// Create a transport using `binary` against the instance rooted at `base_dir`.
    pub fn new(binary: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), base_dir: base_dir.into() }
    }

    /// Arguments passed after `-e` for `cmd`.
    fn command_args(cmd: &Command) -> Vec<String> {
        let mut args = vec![".json".to_string(), "true".to_string()];

        if !cmd.columns.is_empty() {
            args.push(".columns".to_string());
            args.push(cmd.columns.join(","));
        }

        for filter in &cmd.filters {
            args.push(".filter".to_string());
            args.push(filter.clone());
        }

        if let Some(ns) = &cmd.namespace {
            args.push("namespace".to_string());
            args.push(ns.clone());
        }

        args.extend(cmd.action.split_whitespace().map(str::to_string));
        args
    }

    /// Turn the client's JSON output into rows, failing on any per-host error.
    fn parse_output(cmd: &Command, stdout: &str) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut errors = Vec::new();

        let stream = serde_json::Deserializer::from_str(stdout).into_iter::<Vec<HostResponse>>();
        for batch in stream {
            let batch = batch.map_err(|e| FabricError::Transport {
                command: cmd.to_string(),
                reason: format!("unreadable response: {}", e),
            })?;

            for resp in batch {
                if !resp.error.is_empty() {
                    if resp.host.is_empty() {
                        errors.push(resp.error);
                    } else {
                        errors.push(format!("{}: {}", resp.host, resp.error));
                    }
                    continue;
                }

                let (Some(header), Some(tabular)) = (resp.header, resp.tabular) else {
                    continue;
                };

                for values in tabular {
                    rows.push(header.iter().cloned().zip(values).collect());
                }
            }
        }

        if !errors.is_empty() {
            return Err(FabricError::Transport {
                command: cmd.to_string(),
                reason: errors.join("; "),
            });
        }

        Ok(rows)
    }
}

impl Default for MinimegaCli {
    fn default() -> Self {
        Self::new("minimega", "/tmp/minimega/")
    }
}

#[async_trait]
impl CommandTransport for MinimegaCli {
    #[instrument(skip(self, cmd), fields(command = %cmd))]
    async fn run(&self, cmd: &Command) -> Result<Vec<Row>> {
        let args = Self::command_args(cmd);
        debug!(binary = %self.binary.display(), ?args, "Invoking fabric client");

        let output = Process::new(&self.binary)
            .arg("-base")
            .arg(&self.base_dir)
            .arg("-e")
            .args(&args)
            .output()
            .await
            .map_err(|e| FabricError::Transport {
                command: cmd.to_string(),
                reason: format!("failed to run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FabricError::Transport {
                command: cmd.to_string(),
                reason: format!("client exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Self::parse_output(cmd, &String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &str {
        "minimega"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_prefixes() {
        let cmd = Command::namespaced("exp", "vm info")
            .with_columns(["host", "name"])
            .with_filter("name", "web1");

        assert_eq!(
            MinimegaCli::command_args(&cmd),
            vec![
                ".json", "true", ".columns", "host,name", ".filter", "name=web1", "namespace",
                "exp", "vm", "info"
            ]
        );
    }

    #[test]
    fn test_command_args_global() {
        let cmd = Command::new("clear namespace exp");

        assert_eq!(
            MinimegaCli::command_args(&cmd),
            vec![".json", "true", "clear", "namespace", "exp"]
        );
    }

    #[test]
    fn test_parse_tabular_output() {
        let cmd = Command::namespaced("exp", "capture");
        let stdout = r#"[
            {"Host": "node1", "Response": "", "Header": ["interface", "path"],
             "Tabular": [["web1:0", "/tmp/a.pcap"], ["db1:1", "/tmp/b.pcap"]], "Error": ""},
            {"Host": "node2", "Response": "", "Header": ["interface", "path"],
             "Tabular": [["web2:0", "/tmp/c.pcap"]], "Error": ""}
        ]"#;

        let rows = MinimegaCli::parse_output(&cmd, stdout).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["interface"], "web1:0");
        assert_eq!(rows[1]["path"], "/tmp/b.pcap");
        assert_eq!(rows[2]["interface"], "web2:0");
    }

    #[test]
    fn test_parse_output_without_table() {
        let cmd = Command::namespaced("exp", "vm start web1");
        let stdout = r#"[{"Host": "node1", "Response": "", "Header": null, "Tabular": null, "Error": ""}]"#;

        assert!(MinimegaCli::parse_output(&cmd, stdout).unwrap().is_empty());
    }

    #[test]
    fn test_parse_output_error_is_surfaced_verbatim() {
        let cmd = Command::namespaced("exp", "vm start web1");
        let stdout = r#"[{"Host": "node1", "Response": "", "Error": "vm not found: web1"}]"#;

        let err = MinimegaCli::parse_output(&cmd, stdout).unwrap_err();

        match err {
            FabricError::Transport { command, reason } => {
                assert_eq!(command, "[exp] vm start web1");
                assert_eq!(reason, "node1: vm not found: web1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        let cmd = Command::new("read /tmp/x.mm");

        assert!(matches!(
            MinimegaCli::parse_output(&cmd, "not json"),
            Err(FabricError::Transport { .. })
        ));
    }
}
