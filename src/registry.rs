//! Object Type Registry
//!
//! Append-only registry of [`TypeDescriptor`]s. Registration happens once at
//! startup; [`TypeRegistry::complete`] then derives every cross-type
//! relationship in a single pass and the registry is read-only from there on,
//! apart from the per-type invalidation tables and event handler lists.
//!
//! Lookups are case-insensitive. Cross-type queries issued before the
//! registry is complete return declared-only or empty results.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{RegistryOptions, SystemTypes};
use crate::descriptor::TypeDescriptor;
use crate::error::{Result, TypeError};
use crate::events::TypeEvents;
use crate::graph::derive::{derive_index, DerivedIndex};
use crate::graph::DependencyGraph;
use crate::info::TypeInfo;
use crate::invalidation::{
    InvalidationBroadcaster, InvalidationTask, InvalidationTracker, MonotonicClock, NoopBroadcaster,
};

/// A registered type with its process-local runtime state
#[derive(Debug)]
pub struct TypeEntry {
    pub(crate) descriptor: TypeDescriptor,
    pub(crate) invalidation: InvalidationTracker,
    pub(crate) events: TypeEvents,
}

/// Fuzzy search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub object_type: String,
    pub class_name: String,
    pub score: i64,
}

/// The object type registry
pub struct TypeRegistry {
    options: RegistryOptions,
    clock: Arc<MonotonicClock>,
    broadcaster: Arc<dyn InvalidationBroadcaster>,
    entries: Vec<TypeEntry>,
    /// Lowercased object type -> index into `entries`
    by_name: HashMap<String, usize>,
    /// Present once the registry is complete
    derived: Option<DerivedIndex>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.entries.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl TypeRegistry {
    /// Create an empty registry; invalidations stay process-local
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_broadcaster(options, Arc::new(NoopBroadcaster))
    }

    /// Create an empty registry that forwards invalidations to `broadcaster`
    pub fn with_broadcaster(options: RegistryOptions, broadcaster: Arc<dyn InvalidationBroadcaster>) -> Self {
        let broadcaster: Arc<dyn InvalidationBroadcaster> = if options.broadcast {
            broadcaster
        } else {
            Arc::new(NoopBroadcaster)
        };
        Self {
            options,
            clock: Arc::new(MonotonicClock::new()),
            broadcaster,
            entries: Vec::new(),
            by_name: HashMap::new(),
            derived: None,
        }
    }

    // ========== Registration ==========

    /// Register one type. Fails once the registry is complete, and on
    /// duplicates when running strict.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        let key = descriptor.object_type().to_ascii_lowercase();

        if self.derived.is_some() {
            return Err(TypeError::RegistrySealed {
                object_type: descriptor.object_type().to_string(),
            });
        }

        if self.by_name.contains_key(&key) {
            if self.options.strict {
                return Err(TypeError::DuplicateType {
                    object_type: descriptor.object_type().to_string(),
                });
            }
            warn!(object_type = %descriptor.object_type(), "duplicate object type skipped");
            return Ok(());
        }

        debug!(
            object_type = %descriptor.object_type(),
            class_name = %descriptor.class_name(),
            "registering object type"
        );

        let invalidation = InvalidationTracker::new(
            descriptor.object_type(),
            Arc::clone(&self.clock),
            Arc::clone(&self.broadcaster),
        );
        self.by_name.insert(key, self.entries.len());
        self.entries.push(TypeEntry {
            descriptor,
            invalidation,
            events: TypeEvents::new(),
        });
        Ok(())
    }

    pub fn register_all(&mut self, descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Result<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Mark registration finished and derive every cross-type relationship
    pub fn complete(&mut self) {
        let index = derive_index(&self.entries, &self.by_name, &self.options.system_types);
        info!(
            types = self.entries.len(),
            edges = index.graph.edge_count(),
            cycles = index.graph.cycles().len(),
            "object type registry complete"
        );
        self.derived = Some(index);
    }

    /// Drop derived data (after a schema change) and reopen registration
    pub fn clear_derived(&mut self) {
        if self.derived.take().is_some() {
            info!("object type registry derived data cleared");
        }
    }

    /// All types registered and relationships derived
    pub fn is_ready(&self) -> bool {
        self.derived.is_some()
    }

    // ========== Lookup ==========

    /// Metadata for `object_type`; `None` when not registered
    pub fn get(&self, object_type: &str) -> Option<TypeInfo<'_>> {
        self.index_of(object_type)
            .map(|index| TypeInfo::new(self, index))
    }

    pub fn contains(&self, object_type: &str) -> bool {
        self.index_of(object_type).is_some()
    }

    /// Registered type names, in registration order
    pub fn all_object_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.descriptor.object_type())
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeInfo<'_>> {
        (0..self.entries.len()).map(move |index| TypeInfo::new(self, index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn system_types(&self) -> &SystemTypes {
        &self.options.system_types
    }

    /// Dependency graph over all types; `None` before completion
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.derived.as_ref().map(|d| &d.graph)
    }

    /// Apply an invalidation received from another process
    pub fn apply_remote_task(&self, task: &InvalidationTask) -> bool {
        match self.get(task.object_type()) {
            Some(info) => {
                info.invalidation().apply_remote(task);
                true
            }
            None => {
                debug!(object_type = %task.object_type(), "remote invalidation for unknown type ignored");
                false
            }
        }
    }

    /// Search types by name (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, &TypeDescriptor)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let d = &entry.descriptor;
                matcher
                    .fuzzy_match(d.object_type(), query)
                    .or_else(|| matcher.fuzzy_match(d.class_name(), query))
                    .map(|score| (score, d))
            })
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0));

        results
            .into_iter()
            .take(limit)
            .map(|(score, d)| SearchResult {
                object_type: d.object_type().to_string(),
                class_name: d.class_name().to_string(),
                score,
            })
            .collect()
    }

    // ========== Crate internals ==========

    pub(crate) fn index_of(&self, object_type: &str) -> Option<usize> {
        self.by_name.get(&object_type.to_ascii_lowercase()).copied()
    }

    pub(crate) fn entry(&self, index: usize) -> &TypeEntry {
        &self.entries[index]
    }

    pub(crate) fn derived(&self) -> Option<&DerivedIndex> {
        self.derived.as_ref()
    }
}
