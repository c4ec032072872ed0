//! Error types for chain operations.

use std::fmt;
use thiserror::Error;

/// Which chain of an activation an attach failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRole {
    Relay,
    Target,
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainRole::Relay => write!(f, "relay"),
            ChainRole::Target => write!(f, "target"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid chain spec for {chain}: {reason}")]
    InvalidChainSpec { chain: String, reason: String },

    #[error("Failed to spawn light client worker: {0}")]
    WorkerSpawn(String),

    #[error("Failed to attach {role} chain {chain}: {reason}")]
    ChainAttach {
        role: ChainRole,
        chain: String,
        reason: String,
    },

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Light client worker has been terminated")]
    WorkerTerminated,

    #[error("Session manager has shut down")]
    ManagerStopped,

    #[error("Failed to fetch chain spec: {0}")]
    SpecFetch(String),

    #[error("Storage query failed: {0}")]
    Storage(String),

    #[error("Subxt error: {0}")]
    Subxt(#[from] subxt::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] subxt::error::DecodeError),

    #[error("Light client error: {0}")]
    LightClient(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// Whether the error is one a session can end in.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidChainSpec { .. }
                | ChainError::WorkerSpawn(_)
                | ChainError::ChainAttach { .. }
        )
    }
}
