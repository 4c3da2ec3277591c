//! Error types for the collection pipeline.
//!
//! Kind-level failures (`Enumeration`, `Retrieval`) carry the entity kind so the
//! driver can isolate them; everything else aborts the pass.

use std::time::Duration;
use thiserror::Error;

use crate::inventory::EntityKind;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("cannot establish a session with {endpoint}: {source}")]
    Auth {
        endpoint: String,
        #[source]
        source: VimError,
    },

    #[error("cannot resolve datacenter: {0}")]
    ScopeResolution(#[from] ScopeError),

    #[error("listing {kind} objects failed: {source}")]
    Enumeration {
        kind: EntityKind,
        #[source]
        source: VimError,
    },

    #[error("retrieving {kind} properties failed: {source}")]
    Retrieval {
        kind: EntityKind,
        #[source]
        source: VimError,
    },

    #[error("collection deadline of {}s exceeded", .timeout.as_secs())]
    DeadlineExceeded { timeout: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CollectError {
    /// Entity kind this error is confined to, if any.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            CollectError::Enumeration { kind, .. } | CollectError::Retrieval { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

/// Why the datacenter scope could not be resolved.
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("no datacenter found")]
    NotFound,

    #[error("{count} datacenters found and none designated; pass --datacenter")]
    Ambiguous { count: usize },

    #[error("datacenter '{name}' not found")]
    DesignatedNotFound { name: String },

    #[error("datacenter lookup failed: {0}")]
    Lookup(#[from] VimError),
}

/// Transport or protocol failure talking to the management endpoint.
#[derive(Error, Debug)]
pub enum VimError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server fault {type_name}: {message}")]
    Fault { type_name: String, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server did not return a session id")]
    MissingSession,

    #[error("run deadline of {}s spent before the request completed", .timeout.as_secs())]
    DeadlineExceeded { timeout: Duration },
}

impl CollectError {
    /// Lift a spent run deadline out of a transport failure; every other cause
    /// is wrapped by `wrap`.
    pub fn from_vim(source: VimError, wrap: impl FnOnce(VimError) -> CollectError) -> CollectError {
        match source {
            VimError::DeadlineExceeded { timeout } => CollectError::DeadlineExceeded { timeout },
            other => wrap(other),
        }
    }
}
