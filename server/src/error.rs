//! Errors surfaced by server startup and the accept loop.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Player layouts exist for one or two players only.
    #[error("unsupported player capacity {0}, expected 1 or 2")]
    InvalidCapacity(usize),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}
