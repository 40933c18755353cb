//! Object Type Registry
//!
//! Metadata describing every persistable object type: which columns hold
//! identity and bookkeeping data, how types relate to each other, and which
//! flags govern their behavior. Built once at startup, then read from
//! everywhere.
//!
//! ## Features
//!
//! - **Declarations**: columns, dependencies, `extends`, composites and flag
//!   overrides per type, in code or in TOML/JSON manifests
//! - **Derived relationships**: children, bindings, dependents, reference
//!   columns and resolved flags, computed in one pass on completion
//! - **Dependency graph**: closures, cycles and a dependency order
//! - **Invalidation**: per-object, per-parent and type-wide stale stamps,
//!   shareable with other processes
//! - **Deletion plans**: cascade/clear decisions executed through providers
//!
//! ## Lifecycle
//!
//! ```text
//! register(..)*  ->  complete()  ->  get(..) / graph() / delete_plan(..)
//!                        ^                 |
//!                        +- clear_derived -+
//! ```

pub mod binding;
pub mod cache_keys;
pub mod checksum;
pub mod column;
pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod flags;
pub mod graph;
pub mod info;
pub mod invalidation;
pub mod lint;
pub mod manifest;
pub mod plan;
pub mod provider;
pub mod registry;

pub use binding::{SqlValue, WhereCondition};
pub use cache_keys::{CacheInvalidator, NoopCache};
pub use checksum::Checksum;
pub use column::{Column, UNKNOWN_COLUMN};
pub use config::{ObjectTypesConfig, RegistryOptions, SystemTypes};
pub use dependency::{DependencyKind, DependencyTarget, ExtraColumn, ObjectDependency};
pub use descriptor::{
    CoreColumns, ExportSettings, FeatureColumns, IncludeToParent, SyncLogMode, SynchronizationSettings,
    TypeDescriptor,
};
pub use error::{Result, TypeError};
pub use events::{ChangeAction, LoadRelatedRequest, ObjectChange, TypeEvents};
pub use flags::{Flag, FlagOverrides, ResolvedFlags};
pub use graph::{ClosureNode, DependencyGraph, DependencyReference, EdgeKind, ReferenceKind};
pub use info::{CategoryInfo, ObjectScope, TypeInfo};
pub use invalidation::{InvalidationBroadcaster, InvalidationTask, InvalidationTracker, NoopBroadcaster};
pub use lint::{DeclarationLinter, LintResult};
pub use manifest::{load_registry, ManifestBundle, TypeManifest};
pub use plan::{DeletePlan, PlanAction, PlanStep};
pub use provider::{DataRow, MemorySettings, ObjectProvider, ProviderLookup, ProviderMap, SettingsStore};
pub use registry::{SearchResult, TypeRegistry};
