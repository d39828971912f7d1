use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// Only `ConfigInvalid` is fatal, and only at startup. Everything else is
/// absorbed into the error counter by the agent and the run continues.
#[derive(Debug, Error)]
pub enum AgentError {
    /// All pooled connections stayed borrowed for the whole acquire window.
    #[error("connection pool exhausted after waiting {waited:?}")]
    PoolExhausted { waited: Duration },

    /// A store operation failed. The transaction has already been rolled
    /// back and the connection discarded from the pool.
    #[error("store query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// The blocked-sites cache could not reload from the store. The cache
    /// keeps answering from its previous snapshot.
    #[error("blocklist refresh failed: {0}")]
    RefreshFailed(#[source] Box<AgentError>),

    /// A round task exceeded its deadline and was abandoned.
    #[error("task exceeded its {limit:?} deadline")]
    TaskTimeout { limit: Duration },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}
