//! Nested group resolution
//!
//! Expands group names into every group reachable through `memberOf`. The
//! membership graph may contain cycles, so expansion runs as a worklist over
//! a visited set: each distinct group name is searched at most once.

use super::client::DirectoryConnection;
use crate::dn::extract_common_name;
use crate::filter;
use crate::metrics::{record_search, SearchKind};
use dirlookup_core::{Error, Result};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::debug;

/// Attributes requested for group entries
pub const GROUP_ATTRIBUTES: &[&str] = &["uid", "memberof", "displayname"];

#[derive(Debug, Clone, Default)]
pub struct GroupResolver {
    max_groups: Option<usize>,
}

impl GroupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail resolution once more than `max_groups` distinct names are seen
    pub fn with_limit(max_groups: usize) -> Self {
        Self {
            max_groups: Some(max_groups),
        }
    }

    /// Resolve the groups reachable from `seed` by following `memberOf`.
    ///
    /// Returns the ancestor groups found; seed names only appear when a
    /// membership cycle leads back to them. Any failed search aborts the
    /// whole resolution.
    pub async fn resolve_transitive_groups<C>(
        &self,
        conn: &mut C,
        base_dn: &str,
        seed: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>>
    where
        C: DirectoryConnection + ?Sized,
    {
        let mut visited: HashSet<String> = HashSet::with_capacity(seed.len());
        let mut pending: VecDeque<String> = VecDeque::with_capacity(seed.len());
        for name in seed {
            if visited.insert(name.clone()) {
                pending.push_back(name.clone());
            }
        }
        self.check_limit(visited.len())?;

        let mut discovered = BTreeSet::new();
        while let Some(group) = pending.pop_front() {
            for parent in self.parents_of(conn, base_dn, &group).await? {
                if visited.insert(parent.clone()) {
                    self.check_limit(visited.len())?;
                    pending.push_back(parent.clone());
                }
                discovered.insert(parent);
            }
        }

        debug!(
            "Resolved {} nested groups from {} direct groups",
            discovered.len(),
            seed.len()
        );
        Ok(discovered)
    }

    async fn parents_of<C>(&self, conn: &mut C, base_dn: &str, group: &str) -> Result<BTreeSet<String>>
    where
        C: DirectoryConnection + ?Sized,
    {
        let filter = filter::group_filter(group);
        let entries = match conn.search(base_dn, &filter, GROUP_ATTRIBUTES).await {
            Ok(entries) => {
                record_search(SearchKind::Group, true);
                entries
            }
            Err(source) => {
                record_search(SearchKind::Group, false);
                return Err(Error::SearchFailure { filter, source });
            }
        };

        let mut parents = BTreeSet::new();
        for entry in &entries {
            for (name, values) in entry.attributes() {
                if name.eq_ignore_ascii_case("memberof") {
                    parents.extend(values.iter().filter_map(|dn| extract_common_name(dn)));
                }
            }
        }
        Ok(parents)
    }

    fn check_limit(&self, seen: usize) -> Result<()> {
        match self.max_groups {
            Some(limit) if seen > limit => Err(Error::ResolutionLimit { limit }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::testing::FakeDirectory;

    const BASE: &str = "dc=corp,dc=com";

    fn seed(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_chain_is_fully_resolved() {
        let directory = FakeDirectory::new();
        directory.add_group("A", &["B"]);
        directory.add_group("B", &["C"]);
        directory.add_group("C", &[]);

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap();

        assert_eq!(groups, seed(&["B", "C"]));
    }

    #[tokio::test]
    async fn test_cycle_terminates_with_one_search_per_group() {
        let directory = FakeDirectory::new();
        directory.add_group("A", &["B"]);
        directory.add_group("B", &["A"]);

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap();

        assert!(groups.contains("B"));
        assert!(groups.is_subset(&seed(&["A", "B"])));
        assert_eq!(directory.searches().len(), 2);
        assert_eq!(directory.search_count(&filter::group_filter("A")), 1);
        assert_eq!(directory.search_count(&filter::group_filter("B")), 1);
    }

    #[tokio::test]
    async fn test_shared_ancestor_searched_once() {
        // A -> B -> D, A -> C -> D, D -> E
        let directory = FakeDirectory::new();
        directory.add_group("A", &["B", "C"]);
        directory.add_group("B", &["D"]);
        directory.add_group("C", &["D"]);
        directory.add_group("D", &["E"]);

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap();

        assert_eq!(groups, seed(&["B", "C", "D", "E"]));
        assert_eq!(directory.search_count(&filter::group_filter("D")), 1);
        assert_eq!(directory.searches().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_seed_issues_no_searches() {
        let directory = FakeDirectory::new();
        let mut conn = directory.connect_sync();

        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &BTreeSet::new())
            .await
            .unwrap();

        assert!(groups.is_empty());
        assert!(directory.searches().is_empty());
    }

    #[tokio::test]
    async fn test_names_are_escaped_in_filters() {
        let directory = FakeDirectory::new();
        directory.add_group("Sales (EMEA)", &["R&D"]);

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["Sales (EMEA)"]))
            .await
            .unwrap();

        assert_eq!(groups, seed(&["R&D"]));
        assert_eq!(
            directory.searches(),
            vec![
                r"(&(objectClass=group)(cn=Sales \(EMEA\)))".to_string(),
                r"(&(objectClass=group)(cn=R\&D))".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_cn_parents_are_skipped() {
        let directory = FakeDirectory::new();
        directory.add_group_with_dns(
            "A",
            &["OU=Orphan,DC=corp,DC=com", "CN=B,OU=Groups,DC=corp,DC=com"],
        );

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap();

        assert_eq!(groups, seed(&["B"]));
    }

    #[tokio::test]
    async fn test_search_failure_aborts() {
        let directory = FakeDirectory::new();
        directory.add_group("A", &["B"]);
        directory.add_group("B", &["C"]);
        directory.fail_search(filter::group_filter("B"));

        let mut conn = directory.connect_sync();
        let err = GroupResolver::new()
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap_err();

        match err {
            Error::SearchFailure { filter, .. } => {
                assert_eq!(filter, "(&(objectClass=group)(cn=B))");
            }
            other => panic!("unexpected error: {other}"),
        }
        // C was never reached
        assert_eq!(directory.search_count(&filter::group_filter("C")), 0);
    }

    #[tokio::test]
    async fn test_limit_is_enforced() {
        let directory = FakeDirectory::new();
        directory.add_group("A", &["B"]);
        directory.add_group("B", &["C"]);
        directory.add_group("C", &["D"]);

        let mut conn = directory.connect_sync();
        let err = GroupResolver::with_limit(3)
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResolutionLimit { limit: 3 }));

        let mut conn = directory.connect_sync();
        let groups = GroupResolver::with_limit(4)
            .resolve_transitive_groups(&mut conn, BASE, &seed(&["A"]))
            .await
            .unwrap();
        assert_eq!(groups, seed(&["B", "C", "D"]));
    }
}
