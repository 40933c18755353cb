//! Type metadata view
//!
//! [`TypeInfo`] pairs a registered [`TypeDescriptor`] with the registry it
//! lives in. Declared data is reached through `Deref`; everything computed
//! from other types comes from the registry's derived index.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::column::Column;
use crate::dependency::ObjectDependency;
use crate::descriptor::{SyncLogMode, TypeDescriptor};
use crate::events::TypeEvents;
use crate::flags::{derive_flags, FlagContext, ResolvedFlags};
use crate::graph::derive::DerivedType;
use crate::invalidation::{InstanceHandle, InvalidationTracker};
use crate::provider::{SettingsStore, UPDATE_TIMESTAMP_SETTING};
use crate::registry::{TypeEntry, TypeRegistry};

/// Where objects of a type live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectScope {
    /// No site column
    Global,
    /// Always assigned to a site
    Site,
    /// Site column may be null for global objects
    SiteOrGlobal,
}

/// Category column and the type it points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo<'r> {
    pub column: &'r Column,
    pub object_type: &'r str,
}

/// Metadata for one registered object type
#[derive(Clone, Copy)]
pub struct TypeInfo<'r> {
    registry: &'r TypeRegistry,
    index: usize,
}

impl std::fmt::Debug for TypeInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypeInfo").field(&self.object_type()).finish()
    }
}

impl PartialEq for TypeInfo<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.registry, other.registry) && self.index == other.index
    }
}

impl Eq for TypeInfo<'_> {}

impl<'r> Deref for TypeInfo<'r> {
    type Target = TypeDescriptor;

    fn deref(&self) -> &TypeDescriptor {
        &self.entry().descriptor
    }
}

const EMPTY: &[String] = &[];

impl<'r> TypeInfo<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, index: usize) -> Self {
        Self { registry, index }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    pub fn descriptor(&self) -> &'r TypeDescriptor {
        &self.entry().descriptor
    }

    fn entry(&self) -> &'r TypeEntry {
        self.registry.entry(self.index)
    }

    fn derived(&self) -> Option<&'r DerivedType> {
        self.registry
            .derived()
            .and_then(|d| d.types.get(self.index))
    }

    fn derived_list(&self, pick: impl FnOnce(&'r DerivedType) -> &'r [String], what: &str) -> &'r [String] {
        match self.derived() {
            Some(derived) => pick(derived),
            None => {
                warn!(object_type = %self.object_type(), query = what, "registry not complete; returning empty result");
                EMPTY
            }
        }
    }

    // ========== Flags ==========

    /// Resolved flags. Before completion only this type's own declaration is
    /// considered.
    pub fn flags(&self) -> ResolvedFlags {
        match self.derived() {
            Some(derived) => derived.flags,
            None => {
                let d = self.descriptor();
                let ctx = FlagContext {
                    has_binding_type_dependencies: d.depends_on().iter().any(|dep| dep.kind.is_binding()),
                    parent_is_related: d.parent_object_type().is_some_and(|p| d.is_type(p)),
                };
                derive_flags(d, &ctx)
            }
        }
    }

    pub fn is_binding(&self) -> bool {
        self.flags().is_binding
    }

    pub fn is_site_binding(&self) -> bool {
        self.flags().is_site_binding
    }

    pub fn is_multiple_binding(&self) -> bool {
        self.flags().is_multiple_binding
    }

    pub fn is_main_object(&self) -> bool {
        self.flags().is_main_object
    }

    pub fn supports_versioning(&self) -> bool {
        self.flags().supports_versioning
    }

    pub fn supports_locking(&self) -> bool {
        self.flags().supports_locking
    }

    pub fn supports_cloning(&self) -> bool {
        self.flags().supports_cloning
    }

    pub fn allow_restore(&self) -> bool {
        self.flags().allow_restore
    }

    pub fn supports_search(&self) -> bool {
        self.flags().supports_search
    }

    pub fn contains_macros(&self) -> bool {
        self.flags().contains_macros
    }

    pub fn use_upsert(&self) -> bool {
        self.flags().use_upsert
    }

    pub fn supports_invalidation(&self) -> bool {
        self.flags().supports_invalidation
    }

    // ========== Related types ==========

    /// Same type, or the two types are a virtual/original pair
    pub fn is_related_to(&self, object_type: &str) -> bool {
        if self.is_type(object_type) {
            return true;
        }
        match self.derived() {
            Some(derived) => derived
                .related_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(object_type)),
            None => {
                self.original_object_type().eq_ignore_ascii_case(object_type)
                    || self
                        .registry
                        .get(object_type)
                        .is_some_and(|other| other.original_object_type().eq_ignore_ascii_case(self.object_type()))
            }
        }
    }

    pub fn related_object_types(&self) -> &'r [String] {
        self.derived_list(|d| d.related_types.as_slice(), "related_object_types")
    }

    pub fn related_type_infos(&self) -> Vec<TypeInfo<'r>> {
        self.related_object_types()
            .iter()
            .filter_map(|t| self.registry.get(t))
            .collect()
    }

    /// Info of the underlying type for virtual types, otherwise `self`
    pub fn original_type_info(&self) -> TypeInfo<'r> {
        self.registry
            .get(self.original_object_type())
            .unwrap_or(*self)
    }

    pub fn parent_type_info(&self) -> Option<TypeInfo<'r>> {
        self.parent_object_type().and_then(|p| self.registry.get(p))
    }

    // ========== Derived relationships ==========

    /// Declared dependencies plus those other types contribute through
    /// `extends`. Declared only before completion.
    pub fn object_dependencies(&self) -> &'r [ObjectDependency] {
        match self.derived() {
            Some(derived) => &derived.object_dependencies,
            None => self.descriptor().depends_on(),
        }
    }

    pub fn has_binding_type_dependencies(&self) -> bool {
        self.derived()
            .is_some_and(|d| d.has_binding_type_dependencies)
    }

    /// Non-binding types whose parent is this type
    pub fn child_object_types(&self) -> &'r [String] {
        self.derived_list(|d| d.child_object_types.as_slice(), "child_object_types")
    }

    /// Binding types whose parent is this type
    pub fn binding_object_types(&self) -> &'r [String] {
        self.derived_list(|d| d.binding_object_types.as_slice(), "binding_object_types")
    }

    /// Binding types referencing this type other than through their parent
    pub fn other_binding_object_types(&self) -> &'r [String] {
        self.derived_list(|d| d.other_binding_object_types.as_slice(), "other_binding_object_types")
    }

    /// The site binding type among this type's bindings
    pub fn site_binding_object_type(&self) -> Option<&'r str> {
        self.derived()
            .and_then(|d| d.site_binding_object_type.as_deref())
    }

    /// Composite type this type is a component of
    pub fn composite_object_type(&self) -> Option<&'r str> {
        self.derived()
            .and_then(|d| d.composite_object_type.as_deref())
    }

    /// Every column holding an ID of another object
    pub fn reference_column_names(&self) -> &'r [String] {
        self.derived_list(|d| d.reference_columns.as_slice(), "reference_column_names")
    }

    /// Types whose objects reference objects of this type. Components are
    /// reported as their composite.
    pub fn dependent_object_types(&self) -> &'r [String] {
        self.derived_list(|d| d.dependent_object_types.as_slice(), "dependent_object_types")
    }

    // ========== Presentation ==========

    /// Columns identifying one binding row
    pub fn binding_columns(&self) -> Vec<&'r str> {
        let d = self.descriptor();
        let mut columns: Vec<&'r str> = Vec::new();
        let declared = [d.parent_id_column(), d.site_id_column()];
        let binding_deps = self
            .object_dependencies()
            .iter()
            .filter(|dep| dep.kind.is_binding())
            .map(|dep| &dep.column);
        for name in declared.into_iter().chain(binding_deps).filter_map(Column::name) {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                columns.push(name);
            }
        }
        columns
    }

    /// Default sort expression: the order column, then display name, then
    /// code name; for bindings the binding columns; otherwise the first
    /// known of ID, parent ID, site ID and GUID.
    pub fn default_order_by(&self) -> String {
        let d = self.descriptor();
        let features = Column::first_known([d.order_column(), d.display_name_column(), d.code_name_column()]);
        if let Some(column) = features {
            return column.as_str().to_string();
        }

        if self.is_binding() {
            let columns = self.binding_columns();
            if !columns.is_empty() {
                return columns.join(", ");
            }
        }

        Column::first_known([d.id_column(), d.parent_id_column(), d.site_id_column(), d.guid_column()])
            .map(|c| c.as_str().to_string())
            .unwrap_or_default()
    }

    // ========== Scoping ==========

    pub fn is_site_object(&self) -> bool {
        self.site_id_column().is_known()
    }

    pub fn is_global_object(&self) -> bool {
        !self.is_site_object()
    }

    pub fn scope(&self) -> ObjectScope {
        match (self.is_site_object(), self.supports_global_objects()) {
            (false, _) => ObjectScope::Global,
            (true, false) => ObjectScope::Site,
            (true, true) => ObjectScope::SiteOrGlobal,
        }
    }

    /// Category column and type; `None` unless both are declared
    pub fn category_info(&self) -> Option<CategoryInfo<'r>> {
        let d = self.descriptor();
        let column = &d.features().category;
        match (column.is_known(), d.category_object_type()) {
            (true, Some(object_type)) => Some(CategoryInfo { column, object_type }),
            _ => None,
        }
    }

    // ========== Synchronization ==========

    pub fn supports_synchronization(&self) -> bool {
        self.synchronization().log != SyncLogMode::None
    }

    /// Logged as standalone synchronization tasks
    pub fn logs_synchronization(&self) -> bool {
        self.synchronization().log == SyncLogMode::LogSynchronization
    }

    /// Exportable on its own rather than only inside its parent
    pub fn supports_export(&self) -> bool {
        !self.export().include_to_parent || self.export().allow_single_export
    }

    /// Whether saving an object should bump its timestamp column
    pub fn update_timestamp(&self, settings: &dyn SettingsStore) -> bool {
        self.timestamp_column().is_known() && settings.get_bool(UPDATE_TIMESTAMP_SETTING).unwrap_or(true)
    }

    // ========== Runtime state ==========

    pub fn invalidation(&self) -> &'r InvalidationTracker {
        &self.entry().invalidation
    }

    pub fn events(&self) -> &'r TypeEvents {
        &self.entry().events
    }

    pub fn object_invalidated(&self, object_id: i64) -> DateTime<Utc> {
        self.invalidation().object_invalidated(object_id)
    }

    pub fn children_invalidated(&self, parent_id: i64) -> DateTime<Utc> {
        self.invalidation().children_invalidated(parent_id)
    }

    pub fn invalidate_all_objects(&self) -> DateTime<Utc> {
        self.invalidation().invalidate_all_objects()
    }

    pub fn is_object_invalid(&self, object_id: i64, last_valid: DateTime<Utc>) -> bool {
        self.invalidation().is_object_invalid(object_id, last_valid)
    }

    pub fn children_invalid(&self, parent_id: i64, last_valid: DateTime<Utc>) -> bool {
        self.invalidation().children_invalid(parent_id, last_valid)
    }

    pub fn track_instance(&self) -> InstanceHandle {
        self.invalidation().track_instance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CoreColumns;
    use crate::provider::MemorySettings;

    fn registry(descriptors: Vec<TypeDescriptor>) -> TypeRegistry {
        let mut registry = TypeRegistry::default();
        registry.register_all(descriptors).unwrap();
        registry.complete();
        registry
    }

    fn role() -> TypeDescriptor {
        TypeDescriptor::new(
            None,
            "cms.role",
            "cms.Role",
            CoreColumns {
                id: Some("RoleID"),
                code_name: Some("RoleName"),
                site_id: Some("SiteID"),
                timestamp: Some("RoleLastModified"),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_related_types_both_directions() {
        let listing = TypeDescriptor::new(None, "cms.rolelist", "cms.Role", CoreColumns::default())
            .with_original_object_type("cms.role");
        let registry = registry(vec![role(), listing]);

        let role = registry.get("cms.role").unwrap();
        let listing = registry.get("cms.rolelist").unwrap();
        assert!(role.is_related_to("cms.rolelist"));
        assert!(listing.is_related_to("CMS.ROLE"));
        assert!(role.is_related_to("cms.role"));
        assert_eq!(listing.original_type_info(), role);
        assert_eq!(role.related_type_infos(), vec![listing]);
    }

    #[test]
    fn test_queries_before_complete() {
        let mut registry = TypeRegistry::default();
        registry.register(role()).unwrap();

        let role = registry.get("cms.role").unwrap();
        assert!(role.dependent_object_types().is_empty());
        assert!(role.child_object_types().is_empty());
        assert!(!role.is_binding());
        assert!(role.object_dependencies().is_empty());
    }

    #[test]
    fn test_order_by_prefers_code_name_over_id() {
        let registry = registry(vec![role()]);
        assert_eq!(registry.get("cms.role").unwrap().default_order_by(), "RoleName");
    }

    #[test]
    fn test_scope() {
        let global = TypeDescriptor::new(None, "cms.user", "cms.User", CoreColumns {
            id: Some("UserID"),
            ..Default::default()
        });
        let registry = registry(vec![role().with_global_objects(true), global]);
        assert_eq!(registry.get("cms.role").unwrap().scope(), ObjectScope::SiteOrGlobal);
        assert_eq!(registry.get("cms.user").unwrap().scope(), ObjectScope::Global);
        assert!(registry.get("cms.user").unwrap().is_global_object());
    }

    #[test]
    fn test_category_info_requires_both_parts() {
        let registry = registry(vec![
            role().with_category("RoleCategoryID", "cms.rolecategory"),
            TypeDescriptor::new(None, "cms.user", "cms.User", CoreColumns::default()),
        ]);
        let category = registry.get("cms.role").unwrap().category_info().unwrap();
        assert_eq!(category.column.as_str(), "RoleCategoryID");
        assert_eq!(category.object_type, "cms.rolecategory");
        assert!(registry.get("cms.user").unwrap().category_info().is_none());
    }

    #[test]
    fn test_update_timestamp_setting() {
        let registry = registry(vec![role()]);
        let role = registry.get("cms.role").unwrap();
        let settings = MemorySettings::new();
        assert!(role.update_timestamp(&settings));
        settings.set(UPDATE_TIMESTAMP_SETTING, "false");
        assert!(!role.update_timestamp(&settings));
    }

    #[test]
    fn test_export_and_sync_defaults() {
        let child = TypeDescriptor::new(None, "cms.rolesetting", "cms.RoleSetting", CoreColumns {
            id: Some("SettingID"),
            parent_id: Some("RoleID"),
            parent_object_type: Some("cms.role"),
            ..Default::default()
        });
        let registry = registry(vec![role(), child]);
        let child = registry.get("cms.rolesetting").unwrap();
        assert!(child.supports_synchronization());
        assert!(!child.logs_synchronization());
        assert!(!child.supports_export());
        assert!(registry.get("cms.role").unwrap().supports_export());
    }
}
