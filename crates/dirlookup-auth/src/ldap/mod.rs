//! LDAP/Active Directory user lookup
//!
//! Binds as the user being looked up, reads the account's profile
//! attributes, and expands its `memberOf` values into the full set of
//! nested groups.
//!
//! The directory protocol itself sits behind [`DirectoryConnector`] and
//! [`DirectoryConnection`]; [`LdapConnector`] is the `ldap3`-backed
//! implementation used in production.

mod client;
mod connection;
mod lookup;
mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DirectoryConnection, DirectoryConnector};
pub use connection::{LdapConnection, LdapConnector};
pub use lookup::{UserLookupService, USER_ATTRIBUTES};
pub use resolver::{GroupResolver, GROUP_ATTRIBUTES};
