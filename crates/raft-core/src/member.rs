//! # member
//!
//! why: name the members of a cluster and the set of their ids
//! relations: Member encodes into ConfChange contexts; MemberIdSet is rebuilt by raft-server
//! what: Member descriptor, MemberIdSet

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Attributes a member advertises about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub peer_urls: Vec<String>,
}

impl Member {
    pub fn new(id: u64, peer_urls: Vec<String>) -> Self {
        Self {
            id,
            name: String::new(),
            peer_urls,
        }
    }

    /// Encode as the context of an AddNode/UpdateNode change
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }
}

/// Ascending, duplicate-free set of member ids
///
/// never persisted on its own: always derived from a snapshot's conf state and
/// the config changes that follow it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberIdSet(BTreeSet<u64>);

impl MemberIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns false if the id was already present
    pub fn insert(&mut self, id: u64) -> bool {
        self.0.insert(id)
    }

    /// returns false if the id was absent
    pub fn remove(&mut self, id: u64) -> bool {
        self.0.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}

impl FromIterator<u64> for MemberIdSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MemberIdSet {
    type Item = u64;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, u64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}
