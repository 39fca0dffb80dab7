use thiserror::Error;
use tonic::Status;

/// The error kinds the core distinguishes. Everything crossing an RPC
/// boundary is carried as an explicit value, never as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Peer timeout or connection failure. Recovered internally by failing
    /// over within the successor list, never fatal.
    #[error("peer is unreachable")]
    Unreachable,

    /// The remote node denies ownership of the key.
    #[error("node is not responsible for this key")]
    NotResponsible,

    #[error("key not found")]
    KeyNotFound,

    /// This node is in the simulated-crash state.
    #[error("node is unavailable")]
    Unavailable,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A lookup exceeded the hop bound.
    #[error("ring is inconsistent, lookup exceeded the hop bound")]
    RingInconsistent,
}

impl From<NodeError> for Status {
    fn from(err: NodeError) -> Status {
        match err {
            NodeError::Unreachable => Status::unavailable("peer is unreachable"),
            NodeError::NotResponsible => Status::failed_precondition("node is not responsible for this key"),
            NodeError::KeyNotFound => Status::not_found("key not found"),
            NodeError::Unavailable => Status::unavailable("node is unavailable"),
            NodeError::InvalidRequest(message) => Status::invalid_argument(message),
            NodeError::RingInconsistent => Status::internal("ring is inconsistent"),
        }
    }
}
