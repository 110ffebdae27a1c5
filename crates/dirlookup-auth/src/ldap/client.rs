//! Directory client interface
//!
//! The lookup engine only needs connect, bind, search and close. Keeping
//! those behind traits lets the engine run against an in-memory directory
//! in tests.

use async_trait::async_trait;
use dirlookup_core::types::{DirectoryEntry, DirectoryHost};
use dirlookup_core::ClientError;

/// Opens connections to a directory server
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    type Connection: DirectoryConnection;

    /// Establish a transport connection (no bind yet)
    async fn connect(&self, host: &DirectoryHost) -> Result<Self::Connection, ClientError>;
}

/// An open connection to a directory server
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Whether the transport is established
    fn is_connected(&self) -> bool;

    /// Simple bind with the given principal
    async fn bind(&mut self, principal: &str, password: &str) -> Result<(), ClientError>;

    /// Whether the last bind left the connection authenticated
    fn is_bound(&self) -> bool;

    /// Subtree search returning entries with the requested attributes
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ClientError>;

    /// Release the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), ClientError>;
}
