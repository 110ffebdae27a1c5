//! `ldap3`-backed directory client
//!
//! Handles LDAP, LDAPS and STARTTLS connections, simple binds, and subtree
//! searches. Referral results and search continuation references are
//! followed to the referred servers, rebinding with the same principal.
//! A referred link is never less protected than the connection it came
//! from: `ldap://` referrals reached from LDAPS are upgraded to LDAPS, and
//! from STARTTLS to STARTTLS.

use super::client::{DirectoryConnection, DirectoryConnector};
use async_trait::async_trait;
use dirlookup_core::config::{ConnectionSecurity, DirectoryConfig};
use dirlookup_core::types::{DirectoryEntry, DirectoryHost};
use dirlookup_core::{ClientError, GLOBAL_CATALOG_PORT, GLOBAL_CATALOG_TLS_PORT, LDAPS_PORT, LDAP_PORT};
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, ResultEntry, Scope, SearchEntry,
    SearchResult,
};
use percent_encoding::percent_decode_str;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// LDAP result code for "referral"
const REFERRAL_RC: u32 = 10;

/// Settings shared by a connector and every connection it opens
#[derive(Debug, Clone)]
struct LinkSettings {
    security: Option<ConnectionSecurity>,
    skip_tls_verify: bool,
    connect_timeout: Duration,
    operation_timeout: Duration,
    follow_referrals: bool,
    max_referral_hops: u8,
}

/// Opens `ldap3` connections
#[derive(Debug, Clone)]
pub struct LdapConnector {
    link: Arc<LinkSettings>,
}

impl LdapConnector {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            link: Arc::new(LinkSettings {
                security: config.security,
                skip_tls_verify: config.skip_tls_verify,
                connect_timeout: Duration::from_secs(config.connect_timeout_secs),
                operation_timeout: Duration::from_secs(config.operation_timeout_secs),
                follow_referrals: config.follow_referrals,
                max_referral_hops: config.max_referral_hops,
            }),
        }
    }
}

impl Default for LdapConnector {
    fn default() -> Self {
        Self::new(&DirectoryConfig::default())
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    type Connection = LdapConnection;

    async fn connect(&self, host: &DirectoryHost) -> Result<LdapConnection, ClientError> {
        let security = self
            .link
            .security
            .unwrap_or_else(|| ConnectionSecurity::for_port(host.port()));
        let ldap = open(&self.link, security, host.host(), host.port()).await?;

        Ok(LdapConnection {
            ldap,
            link: self.link.clone(),
            security,
            identity: None,
            released: false,
            bound: false,
        })
    }
}

/// Principal used for the current bind, replayed on referred servers
struct BindIdentity {
    principal: String,
    password: String,
}

/// An open `ldap3` connection
pub struct LdapConnection {
    ldap: Ldap,
    link: Arc<LinkSettings>,
    security: ConnectionSecurity,
    identity: Option<BindIdentity>,
    released: bool,
    bound: bool,
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    /// Connected until released, and only while the driver task still
    /// holds the socket: a server that drops the link right after the
    /// handshake shows up here as not connected.
    fn is_connected(&self) -> bool {
        !self.released && !self.ldap.clone().is_closed()
    }

    async fn bind(&mut self, principal: &str, password: &str) -> Result<(), ClientError> {
        if self.released {
            return Err(ClientError::Closed);
        }
        self.bound = false;
        self.identity = None;

        let result = self
            .ldap
            .with_timeout(self.link.operation_timeout)
            .simple_bind(principal, password)
            .await
            .map_err(client_error)?;

        if result.rc != 0 {
            return Err(ClientError::Rejected {
                rc: result.rc,
                message: result.text,
            });
        }

        // An empty password is an unauthenticated bind: the server answers
        // success without checking anything.
        if password.is_empty() {
            warn!("Unauthenticated bind for {} treated as not bound", principal);
            return Ok(());
        }

        self.bound = true;
        self.identity = Some(BindIdentity {
            principal: principal.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ClientError> {
        if self.released {
            return Err(ClientError::Closed);
        }

        let page = search_once(
            &mut self.ldap,
            self.link.operation_timeout,
            base_dn,
            filter,
            attributes,
        )
        .await?;

        let mut entries = page.entries;
        let referrals = referrals_to_chase(&self.link, page.referrals, page.continuations)?;
        if !referrals.is_empty() {
            let referred = chase_referrals(
                &self.link,
                self.security,
                self.identity.as_ref(),
                referrals,
                base_dn,
                filter,
                attributes,
            )
            .await?;
            entries.extend(referred);
        }

        Ok(entries)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.bound = false;
        self.identity = None;

        self.ldap.unbind().await.map_err(client_error)
    }
}

async fn open(
    link: &LinkSettings,
    security: ConnectionSecurity,
    host: &str,
    port: u16,
) -> Result<Ldap, ClientError> {
    let url = server_url(security, host, port);
    let settings = LdapConnSettings::new()
        .set_conn_timeout(link.connect_timeout)
        .set_starttls(security == ConnectionSecurity::StartTls)
        .set_no_tls_verify(link.skip_tls_verify);

    debug!("Connecting to LDAP server: {}", url);

    let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
        .await
        .map_err(client_error)?;

    tokio::spawn(async move {
        if let Err(e) = conn.drive().await {
            warn!("LDAP connection driver error: {}", e);
        }
    });

    Ok(ldap)
}

/// Referral URLs a search page asks us to visit.
///
/// A referral result means the answer lives elsewhere, so with following
/// disabled it is an error. Continuation references only point at further
/// parts of the tree and are skipped in that case.
fn referrals_to_chase(
    link: &LinkSettings,
    referrals: Vec<String>,
    continuations: Vec<String>,
) -> Result<Vec<String>, ClientError> {
    if link.follow_referrals {
        let mut urls = referrals;
        urls.extend(continuations);
        return Ok(urls);
    }

    if !referrals.is_empty() {
        return Err(ClientError::Referral(format!(
            "referral to {} not followed",
            referrals.join(", ")
        )));
    }
    if !continuations.is_empty() {
        debug!(
            "Skipping {} continuation references, referral following is off",
            continuations.len()
        );
    }
    Ok(Vec::new())
}

/// Referral URLs still to visit, each visited once, within the hop limit
struct ReferralQueue {
    pending: VecDeque<(String, u8)>,
    seen: HashSet<String>,
    max_hops: u8,
}

impl ReferralQueue {
    fn new(max_hops: u8) -> Self {
        Self {
            pending: VecDeque::new(),
            seen: HashSet::new(),
            max_hops,
        }
    }

    fn push(&mut self, urls: Vec<String>, hop: u8) {
        self.pending.extend(urls.into_iter().map(|url| (url, hop)));
    }

    fn next_target(&mut self) -> Option<Result<(String, u8), ClientError>> {
        while let Some((url, hop)) = self.pending.pop_front() {
            if !self.seen.insert(url.clone()) {
                continue;
            }
            if hop > self.max_hops {
                return Some(Err(ClientError::Referral(format!(
                    "{} is more than {} referral hops away",
                    url, self.max_hops
                ))));
            }
            return Some(Ok((url, hop)));
        }
        None
    }
}

/// Re-issue a search against every server the referrals point at
async fn chase_referrals(
    link: &LinkSettings,
    origin: ConnectionSecurity,
    identity: Option<&BindIdentity>,
    referrals: Vec<String>,
    base_dn: &str,
    filter: &str,
    attributes: &[&str],
) -> Result<Vec<DirectoryEntry>, ClientError> {
    let mut queue = ReferralQueue::new(link.max_referral_hops);
    queue.push(referrals, 1);
    let mut found = Vec::new();

    while let Some(next) = queue.next_target() {
        let (url, hop) = next?;
        let target = Referral::parse(&url)?;
        let (security, port) = referral_link(&target, origin);
        debug!(
            "Following referral to {} over {}://{}:{} (hop {})",
            url,
            security.scheme(),
            target.host,
            port,
            hop
        );

        let mut ldap = open(link, security, &target.host, port).await?;
        let outcome = search_referred(
            &mut ldap, link, identity, &target, base_dn, filter, attributes,
        )
        .await;
        if let Err(e) = ldap.unbind().await {
            warn!("Failed to release referred connection to {}: {}", target.host, e);
        }

        let page = outcome?;
        found.extend(page.entries);
        let next = referrals_to_chase(link, page.referrals, page.continuations)?;
        queue.push(next, hop.saturating_add(1));
    }

    Ok(found)
}

/// Security and port used to reach a referral target from a connection
/// secured with `origin`.
///
/// Plain `ldap://` targets inherit the origin's protection, so a bind
/// replayed on the referred server never travels in clear text when the
/// first one did not.
fn referral_link(target: &Referral, origin: ConnectionSecurity) -> (ConnectionSecurity, u16) {
    match (target.security, origin) {
        (ConnectionSecurity::Plain, ConnectionSecurity::Ldaps) => {
            let port = match target.port {
                None | Some(LDAP_PORT) => LDAPS_PORT,
                Some(GLOBAL_CATALOG_PORT) => GLOBAL_CATALOG_TLS_PORT,
                Some(port) => port,
            };
            (ConnectionSecurity::Ldaps, port)
        }
        (ConnectionSecurity::Plain, ConnectionSecurity::StartTls) => {
            (ConnectionSecurity::StartTls, target.port.unwrap_or(LDAP_PORT))
        }
        (ConnectionSecurity::Ldaps, _) => {
            (ConnectionSecurity::Ldaps, target.port.unwrap_or(LDAPS_PORT))
        }
        (security, _) => (security, target.port.unwrap_or(LDAP_PORT)),
    }
}

async fn search_referred(
    ldap: &mut Ldap,
    link: &LinkSettings,
    identity: Option<&BindIdentity>,
    target: &Referral,
    base_dn: &str,
    filter: &str,
    attributes: &[&str],
) -> Result<SearchPage, ClientError> {
    if let Some(identity) = identity {
        let result = ldap
            .with_timeout(link.operation_timeout)
            .simple_bind(&identity.principal, &identity.password)
            .await
            .map_err(client_error)?;
        if result.rc != 0 {
            return Err(ClientError::Rejected {
                rc: result.rc,
                message: result.text,
            });
        }
    }

    let base = target.base_dn.as_deref().unwrap_or(base_dn);
    search_once(ldap, link.operation_timeout, base, filter, attributes).await
}

/// One server's answer to a subtree search
struct SearchPage {
    entries: Vec<DirectoryEntry>,
    /// URLs from a referral result
    referrals: Vec<String>,
    /// URLs from search continuation references
    continuations: Vec<String>,
}

async fn search_once(
    ldap: &mut Ldap,
    timeout: Duration,
    base_dn: &str,
    filter: &str,
    attributes: &[&str],
) -> Result<SearchPage, ClientError> {
    let SearchResult(results, result) = ldap
        .with_timeout(timeout)
        .search(base_dn, Scope::Subtree, filter, attributes.to_vec())
        .await
        .map_err(client_error)?;

    let mut entries = Vec::with_capacity(results.len());
    let mut continuations = Vec::new();
    for result_entry in results {
        if result_entry.is_ref() {
            continuations.extend(continuation_urls(result_entry));
        } else if !result_entry.is_intermediate() {
            entries.push(directory_entry(SearchEntry::construct(result_entry)));
        }
    }

    let referrals = match result.rc {
        0 => Vec::new(),
        REFERRAL_RC => result.refs,
        rc => {
            return Err(ClientError::Rejected {
                rc,
                message: result.text,
            })
        }
    };

    if !continuations.is_empty() {
        debug!(
            "{} continuation references while searching for {}",
            continuations.len(),
            filter
        );
    }

    Ok(SearchPage {
        entries,
        referrals,
        continuations,
    })
}

/// URLs carried by a search result reference; malformed values are dropped
fn continuation_urls(entry: ResultEntry) -> Vec<String> {
    entry
        .0
        .expect_constructed()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tag| tag.expect_primitive())
        .filter_map(|raw| String::from_utf8(raw).ok())
        .collect()
}

fn directory_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut converted: DirectoryEntry = entry.attrs.into_iter().collect();
    converted.dn = entry.dn;
    converted
}

fn client_error(err: LdapError) -> ClientError {
    match err {
        LdapError::Timeout { .. } => ClientError::Timeout(err.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

fn server_url(security: ConnectionSecurity, host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("{}://[{}]:{}", security.scheme(), host, port)
    } else {
        format!("{}://{}:{}", security.scheme(), host, port)
    }
}

/// Target of an LDAP referral URL (`ldap://host[:port]/[base dn]`)
#[derive(Debug, PartialEq, Eq)]
struct Referral {
    security: ConnectionSecurity,
    host: String,
    /// Port named in the URL, if any
    port: Option<u16>,
    base_dn: Option<String>,
}

impl Referral {
    fn parse(raw: &str) -> Result<Self, ClientError> {
        let url = Url::parse(raw)
            .map_err(|e| ClientError::Referral(format!("{}: {}", raw, e)))?;

        let security = match url.scheme() {
            "ldap" => ConnectionSecurity::Plain,
            "ldaps" => ConnectionSecurity::Ldaps,
            other => {
                return Err(ClientError::Referral(format!(
                    "unsupported scheme '{}' in {}",
                    other, raw
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::Referral(format!("no host in {}", raw)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let path = url.path().trim_start_matches('/');
        let base_dn = if path.is_empty() {
            None
        } else {
            let decoded = percent_decode_str(path)
                .decode_utf8()
                .map_err(|e| ClientError::Referral(format!("{}: {}", raw, e)))?;
            Some(decoded.into_owned())
        };

        Ok(Self {
            security,
            host,
            port: url.port(),
            base_dn,
        })
    }
}
