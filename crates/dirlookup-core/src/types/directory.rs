//! Directory server, credential, and search entry types

use crate::{Error, Result};
use std::fmt;

/// Address of a directory server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryHost {
    host: String,
    port: u16,
}

impl DirectoryHost {
    /// Create a host, rejecting a blank name or port 0
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(Error::InvalidArgument("host".into()));
        }
        if port == 0 {
            return Err(Error::InvalidArgument("port".into()));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DirectoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Credentials for a single lookup.
///
/// Held only for the duration of one call and never serialized.
#[derive(Clone)]
pub struct Credentials {
    pub domain: String,
    pub username: String,
    password: String,
}

impl Credentials {
    /// Validate the domain and capture the credentials.
    ///
    /// The domain must be non-blank and every dot-separated label must be
    /// non-empty, since each label becomes a `dc=` component of the search base.
    pub fn new(
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let domain = domain.into();
        if domain.trim().is_empty() {
            return Err(Error::InvalidArgument("domain".into()));
        }
        if domain.split('.').any(|label| label.trim().is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "domain '{}' contains an empty label",
                domain
            )));
        }

        Ok(Self {
            domain,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Bind principal in `user@domain` form
    pub fn principal(&self) -> String {
        format!("{}@{}", self.username, self.domain)
    }

    /// Down-level account name in `domain\user` form
    pub fn account_name(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single entry returned by a directory search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    attributes: Vec<(String, Vec<String>)>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute with its values (builder style)
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Set an attribute, replacing any existing one with the same
    /// case-insensitive name
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = values,
            None => self.attributes.push((name, values)),
        }
    }

    /// Iterate over attribute names and their values
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Values of an attribute, looked up case-insensitively
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

impl FromIterator<(String, Vec<String>)> for DirectoryEntry {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut entry = DirectoryEntry::default();
        for (name, values) in iter {
            entry.insert(name, values);
        }
        entry
    }
}
