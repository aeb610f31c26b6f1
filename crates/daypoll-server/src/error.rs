//! Error types for the service binary.

/// Top-level error for the service binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: daypoll_core::ConfigError,
    },

    /// The live-poll store could not be reached.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: daypoll_db::StoreError,
    },

    /// The archive database could not be reached or migrated.
    #[error("archive error: {source}")]
    Archive {
        /// The underlying archive error.
        #[from]
        source: daypoll_db::ArchiveError,
    },

    /// The HTTP server failed to start or stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: daypoll_api::ServerError,
    },
}
