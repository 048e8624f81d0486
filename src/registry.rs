//! Destination registry: the live set of cache groups.
//!
//! A [`RegistrySnapshot`] is built in one piece from a [`ConfigSource`]
//! and never mutated afterwards. [`Registry`] holds the snapshot in
//! effect behind a single exclusive lock and swaps it wholesale on
//! reload, so a request that captured a snapshot keeps a consistent view
//! of groups and caches even while a reload lands.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::model::Config;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BroadcasterError;

/// One backend cache, addressed by name and base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub address: String,
}

#[derive(Debug)]
pub struct RegistrySnapshot {
    groups: HashMap<String, Vec<Destination>>,
    all: Vec<Destination>,
    pub version: ConfigVersion,
    pub source_name: String,
}

impl RegistrySnapshot {
    /// Build a snapshot from an already validated config.
    #[must_use]
    pub fn from_config(config: Config, version: ConfigVersion, source_name: &str) -> Self {
        let mut groups = HashMap::with_capacity(config.groups.len());
        let mut all = Vec::with_capacity(config.total_caches());

        for group in config.groups {
            let destinations: Vec<Destination> = group
                .caches
                .into_iter()
                .map(|c| Destination {
                    name: c.name,
                    address: c.address,
                })
                .collect();
            all.extend(destinations.iter().cloned());
            groups.insert(group.name, destinations);
        }

        Self {
            groups,
            all,
            version,
            source_name: source_name.to_string(),
        }
    }

    /// Destinations targeted by a request.
    ///
    /// An empty group name selects every destination of every group, in
    /// config order and with duplicates kept.
    pub fn resolve(&self, group: &str) -> Result<&[Destination], BroadcasterError> {
        if group.is_empty() {
            return Ok(&self.all);
        }
        self.groups
            .get(group)
            .map(Vec::as_slice)
            .ok_or_else(|| BroadcasterError::GroupNotFound(group.to_string()))
    }

    /// Flattened list across all groups.
    #[must_use]
    pub fn destinations(&self) -> &[Destination] {
        &self.all
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Load and validate a fresh snapshot from `source`.
pub async fn load(source: &dyn ConfigSource) -> Result<RegistrySnapshot, BroadcasterError> {
    let (config, version) = source.load().await?;
    Ok(RegistrySnapshot::from_config(config, version, source.name()))
}

pub struct Registry {
    current: Mutex<Arc<RegistrySnapshot>>,
}

impl Registry {
    #[must_use]
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: Mutex::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot in effect right now. Cheap: one refcount bump.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.lock())
    }

    /// Resolve against the current snapshot, returning owned copies.
    pub fn resolve(&self, group: &str) -> Result<Vec<Destination>, BroadcasterError> {
        self.snapshot().resolve(group).map(<[Destination]>::to_vec)
    }

    /// Re-load from `source`, run `prepare` on the fresh snapshot, then swap.
    ///
    /// Nothing is published until both steps succeed; on error the
    /// previous snapshot stays in effect untouched.
    pub async fn reload<F>(
        &self,
        source: &dyn ConfigSource,
        prepare: F,
    ) -> Result<Arc<RegistrySnapshot>, BroadcasterError>
    where
        F: FnOnce(&RegistrySnapshot) -> Result<(), BroadcasterError>,
    {
        let fresh = Arc::new(load(source).await?);
        prepare(&fresh)?;
        *self.current.lock() = Arc::clone(&fresh);
        tracing::info!(
            source = source.name(),
            version = fresh.version.short(),
            groups = fresh.group_count(),
            caches = fresh.destinations().len(),
            "cache registry reloaded"
        );
        Ok(fresh)
    }
}
