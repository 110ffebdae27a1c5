//! Directory authentication and group resolution for dirlookup

pub mod dn;
pub mod filter;
pub mod ldap;
pub mod metrics;

pub use ldap::{
    DirectoryConnection, DirectoryConnector, GroupResolver, LdapConnection, LdapConnector,
    UserLookupService,
};
