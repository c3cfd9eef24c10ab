//! Explicit configuration (SPEC_FULL.md §2.3). No process-wide state: every
//! spawn or attach call takes one of these.

use serde_json::Value;

/// Configuration for the parent side: which program to launch as the
/// worker and the header to hand it.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub header: Value,
}

impl WorkerConfig {
    pub fn new(program: impl Into<String>, header: Value) -> Self {
        Self { program: program.into(), args: Vec::new(), header }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// The command-line argument name spec.md §6 reserves for the serialised
/// header: `__m_pArgs`.
pub const HEADER_ARGUMENT_NAME: &str = "__m_pArgs";
