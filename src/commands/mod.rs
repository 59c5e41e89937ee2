//! Command implementations

pub mod apply;
pub mod describe;

use serde_json::Value;

/// Failure of a command, split by where it happened
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The reconciliation itself failed
    #[error(transparent)]
    Reconcile(#[from] reconcile::Error),

    /// Configuration, input or output plumbing failed
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

impl CommandError {
    /// Process exit code
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Reconcile(e) => e.exit_code() as u8,
            Self::Setup(_) => 1,
        }
    }

    /// Structured detail for stderr, when there is any
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Reconcile(e) => Some(e.details()),
            Self::Setup(_) => None,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;
