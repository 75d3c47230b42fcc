//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//!
//! Label values are bounded: operation names, step names and anomaly kinds,
//! never VM or namespace names.

use metrics::{counter, describe_counter};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!("fabric_commands_total", "Total fabric commands issued (by operation)");
    describe_counter!(
        "fabric_command_failures_total",
        "Total fabric commands that failed at the transport (by operation)"
    );
    describe_counter!("fabric_redeploy_total", "Total redeploy workflows started");
    describe_counter!(
        "fabric_redeploy_failures_total",
        "Total redeploy workflows aborted (by failed step)"
    );
    describe_counter!(
        "fabric_decode_anomalies_total",
        "Total malformed response fields degraded to zero values (by kind)"
    );
}

pub fn record_command(op: &'static str) {
    counter!("fabric_commands_total", "operation" => op).increment(1);
}

pub fn record_command_failure(op: &'static str) {
    counter!("fabric_command_failures_total", "operation" => op).increment(1);
}

pub fn record_redeploy() {
    counter!("fabric_redeploy_total").increment(1);
}

pub fn record_redeploy_failure(step: &str) {
    counter!("fabric_redeploy_failures_total", "step" => step.to_string()).increment(1);
}

pub fn record_decode_anomaly(kind: &'static str) {
    counter!("fabric_decode_anomalies_total", "kind" => kind).increment(1);
}
