//! Configuration for dirlookup
//!
//! Example `dirlookup.toml`:
//! ```toml
//! [directory]
//! host = "dc01.corp.example.com"
//! port = 636
//! connect_timeout_secs = 5
//! max_groups = 2000
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use crate::types::DirectoryHost;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LookupConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("DIRLOOKUP_HOST") {
            config.directory.host = host;
        }
        if let Ok(port) = std::env::var("DIRLOOKUP_PORT") {
            match port.parse() {
                Ok(p) => config.directory.port = p,
                Err(_) => warn!("Ignoring invalid DIRLOOKUP_PORT value: {}", port),
            }
        }
        if let Ok(security) = std::env::var("DIRLOOKUP_SECURITY") {
            match ConnectionSecurity::parse(&security) {
                Some(s) => config.directory.security = Some(s),
                None => warn!("Ignoring invalid DIRLOOKUP_SECURITY value: {}", security),
            }
        }
        if std::env::var("DIRLOOKUP_SKIP_TLS_VERIFY").map(|v| v == "true").unwrap_or(false) {
            config.directory.skip_tls_verify = true;
        }
        if std::env::var("DIRLOOKUP_NO_REFERRALS").map(|v| v == "true").unwrap_or(false) {
            config.directory.follow_referrals = false;
        }
        if let Ok(level) = std::env::var("DIRLOOKUP_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("DIRLOOKUP_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.directory.validate()?;
        self.logging.validate()
    }
}

/// Directory server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Domain controller or global catalog host name
    pub host: String,
    /// 389/636 for a domain controller, 3268/3269 for the global catalog
    pub port: u16,
    /// Transport security; inferred from the port when unset
    pub security: Option<ConnectionSecurity>,
    /// Skip TLS certificate verification (not recommended for production)
    pub skip_tls_verify: bool,
    pub connect_timeout_secs: u64,
    /// Timeout applied to each bind and search
    pub operation_timeout_secs: u64,
    /// Re-issue searches against servers named in referral results
    pub follow_referrals: bool,
    pub max_referral_hops: u8,
    /// Upper bound on the number of distinct groups in one closure
    pub max_groups: Option<usize>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: crate::LDAP_PORT,
            security: None,
            skip_tls_verify: false,
            connect_timeout_secs: 10,
            operation_timeout_secs: 30,
            follow_referrals: true,
            max_referral_hops: 4,
            max_groups: None,
        }
    }
}

impl DirectoryConfig {
    pub fn directory_host(&self) -> Result<DirectoryHost> {
        DirectoryHost::new(self.host.clone(), self.port)
    }

    pub fn effective_security(&self) -> ConnectionSecurity {
        self.security
            .unwrap_or_else(|| ConnectionSecurity::for_port(self.port))
    }

    pub fn validate(&self) -> Result<()> {
        self.directory_host()?;

        if self.connect_timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "connect_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "operation_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.max_groups == Some(0) {
            return Err(Error::InvalidArgument(
                "max_groups must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

/// Transport security for directory connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionSecurity {
    /// Plain LDAP
    Plain,
    /// LDAP over TLS
    Ldaps,
    /// Plain LDAP upgraded with STARTTLS
    StartTls,
}

impl ConnectionSecurity {
    /// Conventional security for a well-known directory port
    pub fn for_port(port: u16) -> Self {
        match port {
            crate::LDAPS_PORT | crate::GLOBAL_CATALOG_TLS_PORT => Self::Ldaps,
            _ => Self::Plain,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "plain" | "none" => Some(Self::Plain),
            "ldaps" | "tls" => Some(Self::Ldaps),
            "start_tls" | "starttls" => Some(Self::StartTls),
            _ => None,
        }
    }

    /// URL scheme used to reach the server
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Ldaps => "ldaps",
            Self::Plain | Self::StartTls => "ldap",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    pub fn validate(&self) -> Result<()> {
        match self.format.to_ascii_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(Error::InvalidArgument(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}
