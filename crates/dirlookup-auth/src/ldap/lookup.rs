//! User lookup
//!
//! Binds as the user, reads the account entry, and resolves its nested group
//! memberships over a single connection owned by the call.

use super::client::{DirectoryConnection, DirectoryConnector};
use super::connection::LdapConnector;
use super::resolver::GroupResolver;
use crate::dn::{base_dn_from_domain, extract_common_name};
use crate::filter;
use crate::metrics::{record_lookup, record_search, SearchKind};
use dirlookup_core::config::DirectoryConfig;
use dirlookup_core::types::{Credentials, DirectoryEntry, DirectoryHost, UserProfile};
use dirlookup_core::{Error, Result};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Attributes requested for the user entry
pub const USER_ATTRIBUTES: &[&str] = &[
    "uid",
    "mail",
    "memberof",
    "samaccountname",
    "company",
    "displayname",
];

/// Separator for multi-valued profile attributes
const VALUE_SEPARATOR: &str = ";";

/// Looks up users and their nested groups on one directory server
pub struct UserLookupService<C = LdapConnector> {
    host: DirectoryHost,
    connector: C,
    resolver: GroupResolver,
}

impl UserLookupService<LdapConnector> {
    /// Service for `host:port` with default connection settings.
    ///
    /// Use 389/636 for a domain controller, 3268/3269 for the global catalog.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = DirectoryHost::new(host, port)?;
        Ok(Self::with_connector(host, LdapConnector::default()))
    }

    pub fn with_config(config: &DirectoryConfig) -> Result<Self> {
        config.validate()?;

        let resolver = match config.max_groups {
            Some(limit) => GroupResolver::with_limit(limit),
            None => GroupResolver::new(),
        };

        Ok(Self::with_connector(config.directory_host()?, LdapConnector::new(config))
            .with_resolver(resolver))
    }
}

impl<C: DirectoryConnector> UserLookupService<C> {
    pub fn with_connector(host: DirectoryHost, connector: C) -> Self {
        Self {
            host,
            connector,
            resolver: GroupResolver::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: GroupResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn host(&self) -> &DirectoryHost {
        &self.host
    }

    /// Authenticate `username` in `domain` and return its profile with the
    /// full set of direct and nested groups.
    ///
    /// The connection opened for the call is released on every path.
    pub async fn get_user(&self, domain: &str, username: &str, password: &str) -> Result<UserProfile> {
        let credentials = Credentials::new(domain, username, password)?;
        let base_dn = base_dn_from_domain(&credentials.domain);
        let started = Instant::now();

        debug!("Connecting to directory server: {}", self.host);
        let mut conn = self
            .connector
            .connect(&self.host)
            .await
            .map_err(|source| Error::ConnectionFailure {
                target: self.host.to_string(),
                source: Some(source),
            })?;

        let outcome = if conn.is_connected() {
            self.lookup(&mut conn, &credentials, &base_dn).await
        } else {
            Err(Error::ConnectionFailure {
                target: self.host.to_string(),
                source: None,
            })
        };

        if let Err(e) = conn.close().await {
            warn!("Failed to release connection to {}: {}", self.host, e);
        }

        record_lookup(&outcome, started.elapsed());
        match &outcome {
            Ok(profile) => info!(
                "Resolved {} with {} groups",
                profile.user_name,
                profile.group_names.len()
            ),
            Err(e) => debug!("Lookup of {} failed: {}", credentials.account_name(), e),
        }
        outcome
    }

    async fn lookup(
        &self,
        conn: &mut C::Connection,
        credentials: &Credentials,
        base_dn: &str,
    ) -> Result<UserProfile> {
        conn.bind(&credentials.principal(), credentials.password())
            .await
            .map_err(|source| Error::AuthenticationFailure {
                principal: credentials.account_name(),
                source: Some(source),
            })?;

        if !conn.is_bound() {
            return Err(Error::AuthenticationFailure {
                principal: credentials.account_name(),
                source: None,
            });
        }

        let filter = filter::user_filter(&credentials.username);
        debug!("Searching for user with filter: {}", filter);

        let entries = match conn.search(base_dn, &filter, USER_ATTRIBUTES).await {
            Ok(entries) => {
                record_search(SearchKind::User, true);
                entries
            }
            Err(source) => {
                record_search(SearchKind::User, false);
                return Err(Error::SearchFailure { filter, source });
            }
        };

        if entries.len() > 1 {
            warn!(
                "{} entries match {}, using {}",
                entries.len(),
                filter,
                entries[0].dn
            );
        }

        let entry = match entries.into_iter().next() {
            Some(entry) => entry,
            None => return Err(Error::NotFound { filter }),
        };

        let (mut profile, direct_groups) = profile_from_entry(credentials.account_name(), &entry);
        debug!(
            "Found user DN: {} with {} direct groups",
            entry.dn,
            direct_groups.len()
        );

        let nested = self
            .resolver
            .resolve_transitive_groups(conn, base_dn, &direct_groups)
            .await?;

        profile.group_names.extend(direct_groups);
        profile.group_names.extend(nested);
        Ok(profile)
    }
}

/// Build a profile from the user entry; also returns the direct group names
fn profile_from_entry(user_name: String, entry: &DirectoryEntry) -> (UserProfile, BTreeSet<String>) {
    let mut profile = UserProfile::new(user_name);
    let mut groups = BTreeSet::new();

    for (name, values) in entry.attributes() {
        if name.eq_ignore_ascii_case("company") {
            profile.company_name = Some(values.join(VALUE_SEPARATOR));
        } else if name.eq_ignore_ascii_case("mail") {
            profile.email = Some(values.join(VALUE_SEPARATOR));
        } else if name.eq_ignore_ascii_case("displayname") {
            profile.display_name = Some(values.join(VALUE_SEPARATOR));
        } else if name.eq_ignore_ascii_case("memberof") {
            groups.extend(values.iter().filter_map(|dn| extract_common_name(dn)));
        }
    }

    (profile, groups)
}
