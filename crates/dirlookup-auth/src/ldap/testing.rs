//! In-memory directory for exercising the lookup engine without a server

use super::client::{DirectoryConnection, DirectoryConnector};
use crate::filter;
use async_trait::async_trait;
use dirlookup_core::types::{DirectoryEntry, DirectoryHost};
use dirlookup_core::ClientError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn group_dn(name: &str) -> String {
    format!("CN={},OU=Groups,DC=corp,DC=com", name)
}

#[derive(Default)]
struct State {
    /// Entries keyed by the exact filter that finds them
    entries: HashMap<String, Vec<DirectoryEntry>>,
    passwords: HashMap<String, String>,
    failing_filters: Vec<String>,
    refuse_connections: bool,
    report_disconnected: bool,
    accept_bind_silently: bool,
    searches: Vec<String>,
    connects: usize,
    closes: usize,
}

#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user found by the user filter for `username`
    pub fn add_user(&self, username: &str, principal: &str, password: &str, entry: DirectoryEntry) {
        let mut state = self.state.lock().unwrap();
        state
            .entries
            .entry(filter::user_filter(username))
            .or_default()
            .push(entry);
        state
            .passwords
            .insert(principal.to_string(), password.to_string());
    }

    /// Register a group that is a member of the named parent groups
    pub fn add_group(&self, name: &str, parents: &[&str]) {
        let parent_dns: Vec<String> = parents.iter().map(|p| group_dn(p)).collect();
        let parent_dns: Vec<&str> = parent_dns.iter().map(String::as_str).collect();
        self.add_group_with_dns(name, &parent_dns);
    }

    /// Register a group whose `memberOf` holds the given raw values
    pub fn add_group_with_dns(&self, name: &str, parent_dns: &[&str]) {
        let entry = DirectoryEntry::new(group_dn(name))
            .with_attribute("memberOf", parent_dns.iter().copied());
        self.state
            .lock()
            .unwrap()
            .entries
            .entry(filter::group_filter(name))
            .or_default()
            .push(entry);
    }

    pub fn fail_search(&self, filter: String) {
        self.state.lock().unwrap().failing_filters.push(filter);
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub fn report_disconnected(&self) {
        self.state.lock().unwrap().report_disconnected = true;
    }

    /// Accept every bind without an error but never reach the bound state
    pub fn accept_bind_silently(&self) {
        self.state.lock().unwrap().accept_bind_silently = true;
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn search_count(&self, filter: &str) -> usize {
        self.searches().iter().filter(|f| f.as_str() == filter).count()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn connect_sync(&self) -> FakeConnection {
        self.state.lock().unwrap().connects += 1;
        FakeConnection {
            state: self.state.clone(),
            open: true,
            bound: false,
        }
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    type Connection = FakeConnection;

    async fn connect(&self, _host: &DirectoryHost) -> Result<FakeConnection, ClientError> {
        if self.state.lock().unwrap().refuse_connections {
            return Err(ClientError::Transport("connection refused".into()));
        }
        Ok(self.connect_sync())
    }
}

pub struct FakeConnection {
    state: Arc<Mutex<State>>,
    open: bool,
    bound: bool,
}

#[async_trait]
impl DirectoryConnection for FakeConnection {
    fn is_connected(&self) -> bool {
        self.open && !self.state.lock().unwrap().report_disconnected
    }

    async fn bind(&mut self, principal: &str, password: &str) -> Result<(), ClientError> {
        let state = self.state.lock().unwrap();
        if state.accept_bind_silently {
            return Ok(());
        }
        match state.passwords.get(principal) {
            Some(expected) if expected == password => {
                self.bound = true;
                Ok(())
            }
            _ => Err(ClientError::Rejected {
                rc: 49,
                message: "invalid credentials".into(),
            }),
        }
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    async fn search(
        &mut self,
        _base_dn: &str,
        filter: &str,
        _attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(filter.to_string());
        if state.failing_filters.iter().any(|f| f == filter) {
            return Err(ClientError::Rejected {
                rc: 1,
                message: "operations error".into(),
            });
        }
        Ok(state.entries.get(filter).cloned().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.open {
            self.open = false;
            self.state.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}
