//! Shared test helpers: a recording mock transport.

#![allow(dead_code)]

use async_trait::async_trait;
use fabric_core::{Command, CommandTransport, FabricController, FabricError, Opt, Result, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock transport that records every command and replays scripted results.
///
/// Responses and failures are keyed by the exact action string. Unscripted
/// actions succeed with no rows.
#[derive(Default)]
pub struct MockTransport {
    commands: Mutex<Vec<Command>>,
    responses: Mutex<HashMap<String, Vec<Row>>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return `rows` whenever `action` is issued.
    pub fn respond(&self, action: &str, rows: Vec<Row>) {
        self.responses.lock().unwrap().insert(action.to_string(), rows);
    }

    /// Fail whenever `action` is issued, with `reason` as the remote error text.
    pub fn fail_on(&self, action: &str, reason: &str) {
        self.failures.lock().unwrap().insert(action.to_string(), reason.to_string());
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.actions().iter().filter(|a| a.as_str() == action).count()
    }
}

#[async_trait]
impl CommandTransport for MockTransport {
    async fn run(&self, cmd: &Command) -> Result<Vec<Row>> {
        self.commands.lock().unwrap().push(cmd.clone());

        if let Some(reason) = self.failures.lock().unwrap().get(&cmd.action) {
            return Err(FabricError::Transport { command: cmd.to_string(), reason: reason.clone() });
        }

        Ok(self.responses.lock().unwrap().get(&cmd.action).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn controller(transport: &Arc<MockTransport>) -> FabricController {
    FabricController::new(transport.clone())
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Namespace `exp` and VM `web1` plus `extra`.
pub fn target(extra: Vec<Opt>) -> Vec<Opt> {
    let mut opts = vec![Opt::Namespace("exp".to_string()), Opt::Vm("web1".to_string())];
    opts.extend(extra);
    opts
}
