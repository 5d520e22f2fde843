//! Node State
//!
//! The result of a node's last compute: an ordered list of messages and an
//! aggregate error flag. Compute callbacks return a `State`; a failing
//! callback is turned into a `State` holding a single error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Something looks wrong but the result is usable.
    Warning,
    /// The compute failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Messages produced by the last compute of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    messages: Vec<(Severity, String)>,
    errored: bool,
}

impl State {
    /// An empty, successful state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A state holding a single error message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.add_error(message);
        state
    }

    /// Append an informational message.
    pub fn add_info(&mut self, message: impl Into<String>) {
        self.add(Severity::Info, message);
    }

    /// Append a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.add(Severity::Warning, message);
    }

    /// Append an error. This also sets the error flag.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.add(Severity::Error, message);
    }

    /// Append a message of any severity.
    pub fn add(&mut self, severity: Severity, message: impl Into<String>) {
        if severity == Severity::Error {
            self.errored = true;
        }
        self.messages.push((severity, message.into()));
    }

    /// Whether any error was recorded.
    pub fn errored(&self) -> bool {
        self.errored
    }

    /// Whether there are no messages at all.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in the order they were added.
    pub fn messages(&self) -> impl Iterator<Item = (Severity, &str)> {
        self.messages.iter().map(|(sev, msg)| (*sev, msg.as_str()))
    }

    /// Append all messages of another state.
    pub fn append(&mut self, other: State) {
        for (severity, message) in other.messages {
            self.add(severity, message);
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (severity, message)) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", severity, message)?;
        }
        Ok(())
    }
}
