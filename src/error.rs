use std::fmt;

use thiserror::Error;

use crate::ironic::ClientError;
use crate::state_machine::{ProvisionState, TransitionAction};

#[derive(Debug, Error)]
pub enum IronwrightError {
    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Ironic client error: {0}")]
    Client(#[from] ClientError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// What the driver last knew about a node when it gave up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeContext {
    pub node: String,
    pub state: Option<ProvisionState>,
    pub last_error: Option<String>,
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.node)?;
        match self.state {
            Some(state) => write!(f, " in state '{state}'")?,
            None => write!(f, " in unknown state")?,
        }
        if let Some(last_error) = &self.last_error {
            write!(f, ", last error was '{last_error}'")?;
        }
        Ok(())
    }
}

/// Why a provisioning workflow stopped without reaching its goal.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("terminal failure ({context}): {reason}")]
    TerminalFailure { context: NodeContext, reason: String },

    #[error("no valid transition toward '{goal}' ({context})")]
    NoValidTransition {
        context: NodeContext,
        goal: TransitionAction,
    },

    #[error("request '{action}' rejected ({context}): {source}")]
    RequestRejected {
        context: NodeContext,
        action: TransitionAction,
        #[source]
        source: ClientError,
    },

    #[error("ironic request failed ({context}): {source}")]
    Client {
        context: NodeContext,
        #[source]
        source: ClientError,
    },

    #[error("timed out waiting for '{goal}' after {attempts} attempt(s) ({context})")]
    Timeout {
        context: NodeContext,
        goal: TransitionAction,
        attempts: u32,
    },

    #[error("cancelled ({context})")]
    Cancelled { context: NodeContext },

    #[error("'{0}' is not a supported provisioning target")]
    UnsupportedTarget(TransitionAction),
}

impl WorkflowError {
    pub fn context(&self) -> Option<&NodeContext> {
        match self {
            WorkflowError::TerminalFailure { context, .. }
            | WorkflowError::NoValidTransition { context, .. }
            | WorkflowError::RequestRejected { context, .. }
            | WorkflowError::Client { context, .. }
            | WorkflowError::Timeout { context, .. }
            | WorkflowError::Cancelled { context } => Some(context),
            WorkflowError::UnsupportedTarget(_) => None,
        }
    }
}
