//! Dirlookup Core Library
//!
//! Core types, errors, and configuration shared by the directory lookup
//! engine and its command-line front end.

pub mod config;
pub mod error;
pub mod types;

pub use config::LookupConfig;
pub use error::{ClientError, Error, Result};

/// Dirlookup version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Plain LDAP port of a domain controller
pub const LDAP_PORT: u16 = 389;

/// LDAPS port of a domain controller
pub const LDAPS_PORT: u16 = 636;

/// Global catalog port
pub const GLOBAL_CATALOG_PORT: u16 = 3268;

/// Global catalog port over TLS
pub const GLOBAL_CATALOG_TLS_PORT: u16 = 3269;
