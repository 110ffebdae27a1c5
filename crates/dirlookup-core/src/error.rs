//! Error types for dirlookup

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a directory client while talking to the server.
///
/// These never reach callers on their own: the lookup engine wraps them in
/// an [`Error`] carrying the host, principal, or filter involved.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned result code {rc}: {message}")]
    Rejected { rc: u32, message: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Referral could not be followed: {0}")]
    Referral(String),

    #[error("Connection already closed")]
    Closed,
}

impl ClientError {
    /// Whether retrying the same operation later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Error connecting to {target}")]
    ConnectionFailure {
        target: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("Wrong credentials for {principal}")]
    AuthenticationFailure {
        principal: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("Error searching for {filter}")]
    SearchFailure {
        filter: String,
        #[source]
        source: ClientError,
    },

    #[error("Nothing found while searching for {filter}")]
    NotFound { filter: String },

    #[error("Group membership exceeds the limit of {limit} groups")]
    ResolutionLimit { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::ConnectionFailure { .. } => "ConnectionFailure",
            Error::AuthenticationFailure { .. } => "AuthenticationFailure",
            Error::SearchFailure { .. } => "SearchFailure",
            Error::NotFound { .. } => "NotFound",
            Error::ResolutionLimit { .. } => "ResolutionLimit",
            Error::Config(_) => "ConfigError",
        }
    }

    /// Whether the caller may reasonably retry the whole lookup.
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ConnectionFailure { source, .. } => {
                source.as_ref().map_or(true, ClientError::is_transient)
            }
            Error::SearchFailure { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
