//! Serde data structures for the broadcaster's cache configuration file.
//!
//! Contains [`Config`] (the root), [`GroupConfig`] and [`CacheConfig`].
//! All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub groups: Vec<GroupConfig>,
}

impl Config {
    #[must_use]
    pub fn total_caches(&self) -> usize {
        self.groups.iter().map(|g| g.caches.len()).sum()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caches: Vec<CacheConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub name: String,
    pub address: String,
}
