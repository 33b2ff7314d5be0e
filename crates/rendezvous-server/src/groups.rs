use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rendezvous_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A named set of peers that discover each other through roster broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Group {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Append `user_key` unless it is already a member. Returns whether the
    /// roster changed.
    pub fn add_member(&mut self, user_key: &str) -> bool {
        if self.members.iter().any(|member| member == user_key) {
            return false;
        }
        self.members.push(user_key.to_string());
        true
    }
}

/// Group membership store.
///
/// Rosters keep insertion order and never hold a key twice. Groups live for
/// the lifetime of the process.
#[derive(Clone, Default)]
pub struct GroupStore {
    groups: Arc<RwLock<HashMap<String, Group>>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new group. Duplicate entries in `members` are dropped,
    /// keeping the first occurrence.
    pub fn create_group(&self, key: &str, name: &str, members: &[String]) -> Result<Group> {
        let mut guard = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(key) {
            return Err(Error::already_exists(key));
        }

        let mut group = Group::new(key, name);
        for member in members {
            group.add_member(member);
        }
        guard.insert(key.to_string(), group.clone());

        info!(
            "created group with key {}, name {} and members {}",
            key,
            name,
            group.members.join(", ")
        );
        Ok(group)
    }

    pub fn get_group(&self, key: &str) -> Result<Group> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("group {key}")))
    }

    /// Strict join: the group must already exist. Returns the group after
    /// the join.
    pub fn join_group(&self, user_key: &str, key: &str) -> Result<Group> {
        let mut guard = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let group = guard
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("group {key}")))?;
        if group.add_member(user_key) {
            info!("{} joined group {}", user_key, key);
        }
        Ok(group.clone())
    }

    /// Lenient join: an unknown key creates an empty, unnamed group first.
    /// Returns the group after the join.
    pub fn enter_group(&self, user_key: &str, key: &str) -> Group {
        let mut guard = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let group = guard.entry(key.to_string()).or_insert_with(|| {
            info!("group {} created on first enter", key);
            Group::new(key, "")
        });
        if group.add_member(user_key) {
            info!("{} entered group {}", user_key, key);
        }
        group.clone()
    }

    pub fn len(&self) -> usize {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
