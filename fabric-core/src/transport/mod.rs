//! Command transport abstraction.
//!
//! The controller never talks to the fabric directly. It composes [`Command`]
//! values and hands them to a [`CommandTransport`], which executes each one
//! synchronously and returns the tabular response rows.
//!
//! - [`MinimegaCli`]: production transport delegating to the fabric's own CLI
//! - Tests inject their own implementation through the same trait

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

pub mod minimega;

pub use minimega::MinimegaCli;

/// One response row, keyed by column name.
pub type Row = HashMap<String, String>;

/// A structured fabric command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Free-text action, e.g. `vm start web1`
    pub action: String,

    /// Namespace scope (None for global commands)
    pub namespace: Option<String>,

    /// Output column projection (empty = all columns)
    pub columns: Vec<String>,

    /// Equality filters in `field=value` form
    pub filters: Vec<String>,
}

impl Command {
    /// Create a command outside of any namespace.
    pub fn new(action: impl Into<String>) -> Self {
        Self { action: action.into(), ..Default::default() }
    }

    /// Create a command scoped to `namespace`.
    pub fn namespaced(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self { action: action.into(), namespace: Some(namespace.into()), ..Default::default() }
    }

    /// Project the response onto `columns`.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only rows where `field` equals `value`.
    pub fn with_filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push(format!("{}={}", field, value));
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "[{}] ", ns)?;
        }
        write!(f, "{}", self.action)
    }
}

/// Transport that executes fabric commands.
///
/// Implementations return [`crate::FabricError::Transport`] when the command
/// could not be executed or the fabric reported an error for it.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Execute `cmd` and return its response rows.
    ///
    /// Mutating commands usually return no rows; callers only check for errors.
    async fn run(&self, cmd: &Command) -> Result<Vec<Row>>;

    /// Transport name (for logging).
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builders() {
        let cmd = Command::namespaced("exp", "vm info")
            .with_columns(["name", "state"])
            .with_filter("name", "web1");

        assert_eq!(cmd.action, "vm info");
        assert_eq!(cmd.namespace.as_deref(), Some("exp"));
        assert_eq!(cmd.columns, vec!["name", "state"]);
        assert_eq!(cmd.filters, vec!["name=web1"]);
    }

    #[test]
    fn test_display_includes_namespace() {
        assert_eq!(Command::namespaced("exp", "vm flush").to_string(), "[exp] vm flush");
        assert_eq!(Command::new("read /tmp/x.mm").to_string(), "read /tmp/x.mm");
    }
}
