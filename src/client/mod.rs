//! Offline-aware client data layer.
//!
//! [`OfflineRepository`] composes a [`RemoteDataService`], a [`CacheStore`] and a
//! [`ConnectivityOracle`]: reads fall back to the last cached snapshot, trip creation is queued
//! while offline and replayed once connectivity returns.

mod cache;
mod connectivity;
mod favorites;
mod remote;
mod repository;

pub use cache::*;
pub use connectivity::*;
pub use favorites::*;
pub use remote::*;
pub use repository::*;

use thiserror::Error;

/// Errors surfaced by client writes and by the remote layer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("no active session")]
    NotAuthenticated,
}
