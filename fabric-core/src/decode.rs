//! Decoding of tabular fabric responses into domain types.
//!
//! Decoding is best-effort per field: a malformed value degrades that field to
//! its zero value and is reported as a [`DecodeAnomaly`], while the rest of the
//! row and all other rows decode normally.

use crate::transport::Row;
use crate::types::{Capture, Vm};
use thiserror::Error;

/// Columns requested for VM queries.
pub const VM_COLUMNS: [&str; 6] = ["host", "name", "state", "uptime", "vlan", "tap"];

/// Columns requested for capture queries.
pub const CAPTURE_COLUMNS: [&str; 2] = ["interface", "path"];

/// State string the fabric uses for a running VM.
const RUNNING_STATE: &str = "RUNNING";

/// A malformed field encountered while decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeAnomaly {
    #[error("column {column} is not a bracketed list: {value:?}")]
    UnbracketedList { column: String, value: String },

    #[error("uptime of VM {vm} is not a valid duration: {value:?}")]
    InvalidUptime { vm: String, value: String },

    #[error("capture key {key:?} has no interface separator")]
    MissingInterfaceSeparator { key: String },

    #[error("capture key {key:?} has a non-numeric interface index")]
    InvalidInterfaceIndex { key: String },
}

impl DecodeAnomaly {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnbracketedList { .. } => "unbracketed_list",
            Self::InvalidUptime { .. } => "invalid_uptime",
            Self::MissingInterfaceSeparator { .. } => "missing_interface_separator",
            Self::InvalidInterfaceIndex { .. } => "invalid_interface_index",
        }
    }
}

/// Decoded entities plus the anomalies met along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub anomalies: Vec<DecodeAnomaly>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self { items: Vec::new(), anomalies: Vec::new() }
    }
}

/// Split a fabric list value of the form `[a, b, c]`.
///
/// An empty list `[]` decodes to a single empty string, matching how the
/// fabric itself formats lists.
pub fn parse_list(value: &str) -> Vec<String> {
    let inner = value.strip_prefix('[').unwrap_or(value);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    inner.split(", ").map(str::to_string).collect()
}

fn is_bracketed(value: &str) -> bool {
    value.starts_with('[') && value.ends_with(']') && value.len() >= 2
}

/// Split a capture key of the form `<vm>:<interface>` on the first `:`.
///
/// A missing separator or non-numeric index yields interface 0.
pub fn split_capture_key(key: &str) -> (String, usize, Option<DecodeAnomaly>) {
    let Some((vm, idx)) = key.split_once(':') else {
        let anomaly = DecodeAnomaly::MissingInterfaceSeparator { key: key.to_string() };
        return (key.to_string(), 0, Some(anomaly));
    };

    match idx.parse::<usize>() {
        Ok(idx) => (vm.to_string(), idx, None),
        Err(_) => {
            let anomaly = DecodeAnomaly::InvalidInterfaceIndex { key: key.to_string() };
            (vm.to_string(), 0, Some(anomaly))
        }
    }
}

/// Parse a fabric duration (`1h2m3.5s`, `250ms`, `1.5h`, `-3s`, `0`) into seconds.
///
/// Valid units are `ns`, `us`, `µs`, `μs`, `ms`, `s`, `m` and `h`. Every number
/// needs a unit except a bare `0`.
pub fn parse_duration_secs(input: &str) -> Option<f64> {
    let (negative, mut rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    if rest == "0" {
        return Some(0.0);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_end);
        if num.is_empty() || num == "." {
            return None;
        }
        let value: f64 = num.parse().ok()?;

        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };

        total += value * scale;
        rest = tail;
    }

    Some(if negative { -total } else { total })
}

fn column<'a>(row: &'a Row, name: &str) -> &'a str {
    row.get(name).map(String::as_str).unwrap_or("")
}

fn list_column(row: &Row, name: &str, anomalies: &mut Vec<DecodeAnomaly>) -> Vec<String> {
    let value = column(row, name);
    if !value.is_empty() && !is_bracketed(value) {
        anomalies.push(DecodeAnomaly::UnbracketedList {
            column: name.to_string(),
            value: value.to_string(),
        });
    }
    parse_list(value)
}

/// Decode one `vm info` row. Captures are attached separately by the caller.
pub fn decode_vm(row: &Row, anomalies: &mut Vec<DecodeAnomaly>) -> Vm {
    let name = column(row, "name").to_string();

    let uptime = match column(row, "uptime") {
        "" => 0.0,
        value => parse_duration_secs(value).unwrap_or_else(|| {
            anomalies
                .push(DecodeAnomaly::InvalidUptime { vm: name.clone(), value: value.to_string() });
            0.0
        }),
    };

    Vm {
        host: column(row, "host").to_string(),
        running: column(row, "state") == RUNNING_STATE,
        uptime,
        networks: list_column(row, "vlan", anomalies),
        taps: list_column(row, "tap", anomalies),
        captures: Vec::new(),
        name,
    }
}

/// Decode `vm info` rows, preserving row order.
pub fn decode_vms(rows: &[Row]) -> Decoded<Vm> {
    let mut decoded = Decoded::default();
    for row in rows {
        let vm = decode_vm(row, &mut decoded.anomalies);
        decoded.items.push(vm);
    }
    decoded
}

/// Decode one `capture` row.
pub fn decode_capture(row: &Row, anomalies: &mut Vec<DecodeAnomaly>) -> Capture {
    let (vm, interface, anomaly) = split_capture_key(column(row, "interface"));
    anomalies.extend(anomaly);

    Capture { vm, interface, filepath: column(row, "path").to_string() }
}

/// Decode `capture` rows, preserving row order.
pub fn decode_captures(rows: &[Row]) -> Decoded<Capture> {
    let mut decoded = Decoded::default();
    for row in rows {
        let capture = decode_capture(row, &mut decoded.anomalies);
        decoded.items.push(capture);
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_list_round_trip() {
        for value in ["[a]", "[a, b]", "[EXP_1, EXP_2, MGMT]"] {
            let items = parse_list(value);
            assert_eq!(format!("[{}]", items.join(", ")), value);
        }
    }

    #[test]
    fn test_parse_list_single_element() {
        assert_eq!(parse_list("[mgmt]"), vec!["mgmt"]);
    }

    #[test]
    fn test_parse_list_empty_brackets_yield_one_empty_string() {
        assert_eq!(parse_list("[]"), vec![""]);
        assert_eq!(parse_list(""), vec![""]);
    }

    #[test]
    fn test_parse_list_strips_only_one_bracket() {
        assert_eq!(parse_list("[[a], b]]"), vec!["[a]", "b]"]);
    }

    #[test]
    fn test_split_capture_key() {
        assert_eq!(split_capture_key("vmname:3"), ("vmname".to_string(), 3, None));
    }

    #[test]
    fn test_split_capture_key_splits_on_first_colon() {
        let (vm, idx, anomaly) = split_capture_key("web:1:2");

        assert_eq!(vm, "web");
        assert_eq!(idx, 0);
        assert_eq!(anomaly, Some(DecodeAnomaly::InvalidInterfaceIndex { key: "web:1:2".to_string() }));
    }

    #[test]
    fn test_split_capture_key_non_numeric_index() {
        let (vm, idx, anomaly) = split_capture_key("vmname:eth0");

        assert_eq!(vm, "vmname");
        assert_eq!(idx, 0);
        assert_eq!(anomaly.map(|a| a.kind()), Some("invalid_interface_index"));
    }

    #[test]
    fn test_split_capture_key_missing_separator() {
        let (vm, idx, anomaly) = split_capture_key("vmname");

        assert_eq!(vm, "vmname");
        assert_eq!(idx, 0);
        assert_eq!(anomaly.map(|a| a.kind()), Some("missing_interface_separator"));
    }

    #[test]
    fn test_parse_duration_secs() {
        let cases = [
            ("0", 0.0),
            ("3s", 3.0),
            ("1h2m3.5s", 3723.5),
            ("1.5h", 5400.0),
            ("250ms", 0.25),
            ("10us", 0.00001),
            ("10µs", 0.00001),
            ("-2m", -120.0),
            ("+1m", 60.0),
        ];

        for (input, expected) in cases {
            let secs = parse_duration_secs(input).unwrap();
            assert!((secs - expected).abs() < 1e-9, "{input}: got {secs}, want {expected}");
        }
    }

    #[test]
    fn test_parse_duration_secs_rejects_invalid() {
        for input in ["", "5", "s", "1x", "1..2s", "1h 2m", "-", "abc"] {
            assert_eq!(parse_duration_secs(input), None, "{input}");
        }
    }

    #[test]
    fn test_decode_vm_row() {
        let rows = vec![row(&[
            ("host", "node1"),
            ("name", "web1"),
            ("state", "RUNNING"),
            ("uptime", "1m30s"),
            ("vlan", "[EXP, MGMT]"),
            ("tap", "[mega_tap1, mega_tap2]"),
        ])];

        let decoded = decode_vms(&rows);

        assert!(decoded.anomalies.is_empty());
        let vm = &decoded.items[0];
        assert_eq!(vm.host, "node1");
        assert_eq!(vm.name, "web1");
        assert!(vm.running);
        assert_eq!(vm.uptime, 90.0);
        assert_eq!(vm.networks, vec!["EXP", "MGMT"]);
        assert_eq!(vm.taps, vec!["mega_tap1", "mega_tap2"]);
        assert_eq!(vm.networks.len(), vm.taps.len());
    }

    #[test]
    fn test_decode_vm_state_must_match_exactly() {
        for state in ["running", "PAUSED", "RUNNING ", "BUILDING"] {
            let vm = decode_vm(&row(&[("name", "a"), ("state", state)]), &mut Vec::new());
            assert!(!vm.running, "{state}");
        }
    }

    #[test]
    fn test_decode_vm_bad_uptime_degrades_to_zero() {
        let rows = vec![
            row(&[("name", "a"), ("state", "RUNNING"), ("uptime", "forever"), ("vlan", "[X]")]),
            row(&[("name", "b"), ("state", "RUNNING"), ("uptime", "5s"), ("vlan", "[Y]")]),
        ];

        let decoded = decode_vms(&rows);

        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.items[0].uptime, 0.0);
        assert!(decoded.items[0].running);
        assert_eq!(decoded.items[0].networks, vec!["X"]);
        assert_eq!(decoded.items[1].uptime, 5.0);
        assert_eq!(
            decoded.anomalies,
            vec![DecodeAnomaly::InvalidUptime { vm: "a".to_string(), value: "forever".to_string() }]
        );
    }

    #[test]
    fn test_decode_vm_missing_uptime_is_not_an_anomaly() {
        let decoded = decode_vms(&[row(&[("name", "a")])]);

        assert_eq!(decoded.items[0].uptime, 0.0);
        assert!(decoded.anomalies.is_empty());
    }

    #[test]
    fn test_decode_vm_unbracketed_list_is_reported() {
        let decoded = decode_vms(&[row(&[("name", "a"), ("vlan", "EXP, MGMT"), ("tap", "[t1, t2]")])]);

        assert_eq!(decoded.items[0].networks, vec!["EXP", "MGMT"]);
        assert_eq!(decoded.anomalies.len(), 1);
        assert_eq!(decoded.anomalies[0].kind(), "unbracketed_list");
    }

    #[test]
    fn test_decode_captures_keeps_order() {
        let rows = vec![
            row(&[("interface", "vm2:1"), ("path", "/tmp/b.pcap")]),
            row(&[("interface", "vm1:0"), ("path", "/tmp/a.pcap")]),
            row(&[("interface", "broken"), ("path", "/tmp/c.pcap")]),
        ];

        let decoded = decode_captures(&rows);

        assert_eq!(
            decoded.items,
            vec![
                Capture { vm: "vm2".to_string(), interface: 1, filepath: "/tmp/b.pcap".to_string() },
                Capture { vm: "vm1".to_string(), interface: 0, filepath: "/tmp/a.pcap".to_string() },
                Capture {
                    vm: "broken".to_string(),
                    interface: 0,
                    filepath: "/tmp/c.pcap".to_string()
                },
            ]
        );
        assert_eq!(decoded.anomalies.len(), 1);
    }
}
