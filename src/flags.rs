//! Behavioral flags
//!
//! Each flag is either explicitly declared on a descriptor or defaulted from
//! other, already resolved, facts. [`derive_flags`] resolves all of them once
//! in a fixed order so no flag is ever read before the ones it depends on:
//!
//! 1. `is_binding`          - no identifier column
//! 2. `is_site_binding`     - binding + site column + no binding-kind dependency
//! 3. `is_multiple_binding` - binding, not a site binding, has site column
//! 4. `is_main_object`      - no parent column, or parent is a related type
//! 5. `supports_versioning`, `supports_locking`, `supports_cloning`
//! 6. `allow_restore`       - not a binding, versioned or logged for sync
//! 7. `contains_macros`, `supports_search` - not a binding
//! 8. `use_upsert`, `supports_invalidation`

use serde::{Deserialize, Serialize};

use crate::descriptor::{SyncLogMode, TypeDescriptor};

/// Overridable flag names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    IsBinding,
    IsSiteBinding,
    IsMultipleBinding,
    IsMainObject,
    SupportsVersioning,
    SupportsLocking,
    SupportsCloning,
    AllowRestore,
    SupportsSearch,
    ContainsMacros,
    UseUpsert,
    SupportsInvalidation,
}

/// Explicitly declared flag values; `None` means "use the derived default"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_binding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_site_binding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_multiple_binding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_main_object: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_versioning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_locking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_cloning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_restore: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains_macros: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_upsert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_invalidation: Option<bool>,
}

impl FlagOverrides {
    pub fn set(&mut self, flag: Flag, value: bool) {
        *self.slot(flag) = Some(value);
    }

    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::IsBinding => self.is_binding,
            Flag::IsSiteBinding => self.is_site_binding,
            Flag::IsMultipleBinding => self.is_multiple_binding,
            Flag::IsMainObject => self.is_main_object,
            Flag::SupportsVersioning => self.supports_versioning,
            Flag::SupportsLocking => self.supports_locking,
            Flag::SupportsCloning => self.supports_cloning,
            Flag::AllowRestore => self.allow_restore,
            Flag::SupportsSearch => self.supports_search,
            Flag::ContainsMacros => self.contains_macros,
            Flag::UseUpsert => self.use_upsert,
            Flag::SupportsInvalidation => self.supports_invalidation,
        }
    }

    fn slot(&mut self, flag: Flag) -> &mut Option<bool> {
        match flag {
            Flag::IsBinding => &mut self.is_binding,
            Flag::IsSiteBinding => &mut self.is_site_binding,
            Flag::IsMultipleBinding => &mut self.is_multiple_binding,
            Flag::IsMainObject => &mut self.is_main_object,
            Flag::SupportsVersioning => &mut self.supports_versioning,
            Flag::SupportsLocking => &mut self.supports_locking,
            Flag::SupportsCloning => &mut self.supports_cloning,
            Flag::AllowRestore => &mut self.allow_restore,
            Flag::SupportsSearch => &mut self.supports_search,
            Flag::ContainsMacros => &mut self.contains_macros,
            Flag::UseUpsert => &mut self.use_upsert,
            Flag::SupportsInvalidation => &mut self.supports_invalidation,
        }
    }
}

/// Cross-type facts the flag defaults need
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagContext {
    /// Some object dependency is of binding kind, so the type binds more
    /// than one object to the site
    pub has_binding_type_dependencies: bool,
    /// The declared parent type is this type or one of its related types
    pub parent_is_related: bool,
}

/// Fully resolved flags, immutable once computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResolvedFlags {
    pub is_binding: bool,
    pub is_site_binding: bool,
    pub is_multiple_binding: bool,
    pub is_main_object: bool,
    pub supports_versioning: bool,
    pub supports_locking: bool,
    pub supports_cloning: bool,
    pub allow_restore: bool,
    pub supports_search: bool,
    pub contains_macros: bool,
    pub use_upsert: bool,
    pub supports_invalidation: bool,
}

/// `is_binding` alone
pub fn derive_is_binding(descriptor: &TypeDescriptor) -> bool {
    descriptor
        .overrides()
        .is_binding
        .unwrap_or_else(|| descriptor.id_column().is_unknown())
}

/// Resolve every flag of `descriptor` in dependency order
pub fn derive_flags(descriptor: &TypeDescriptor, ctx: &FlagContext) -> ResolvedFlags {
    let ov = descriptor.overrides();
    let site_known = descriptor.site_id_column().is_known();

    let is_binding = derive_is_binding(descriptor);

    let is_site_binding = ov
        .is_site_binding
        .unwrap_or(is_binding && site_known && !ctx.has_binding_type_dependencies);

    let is_multiple_binding = ov
        .is_multiple_binding
        .unwrap_or(is_binding && !is_site_binding && site_known);

    let is_main_object = ov
        .is_main_object
        .unwrap_or(descriptor.parent_id_column().is_unknown() || ctx.parent_is_related);

    let supports_versioning = ov.supports_versioning.unwrap_or(false);
    let supports_locking = ov.supports_locking.unwrap_or(false);
    let supports_cloning = ov.supports_cloning.unwrap_or(true);

    let logs_synchronization = descriptor.synchronization().log == SyncLogMode::LogSynchronization;
    let allow_restore = ov
        .allow_restore
        .unwrap_or(!is_binding && (supports_versioning || logs_synchronization));

    let contains_macros = ov.contains_macros.unwrap_or(!is_binding);
    let supports_search = ov.supports_search.unwrap_or(!is_binding);

    ResolvedFlags {
        is_binding,
        is_site_binding,
        is_multiple_binding,
        is_main_object,
        supports_versioning,
        supports_locking,
        supports_cloning,
        allow_restore,
        supports_search,
        contains_macros,
        use_upsert: ov.use_upsert.unwrap_or(false),
        supports_invalidation: ov.supports_invalidation.unwrap_or(false),
    }
}
