//! Collaborator seams: data providers and settings
//!
//! The registry never talks to storage itself. Deletion plans execute
//! through [`ObjectProvider`]s found via a [`ProviderLookup`], keyed by the
//! original (non-virtual) object type.

use dashmap::DashMap;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

use crate::binding::WhereCondition;
use crate::error::CollaboratorError;
use crate::registry::TypeRegistry;

/// Settings key controlling timestamp updates on save
pub const UPDATE_TIMESTAMP_SETTING: &str = "CMSUpdateTimeStamp";

/// One row, column name to value
pub type DataRow = Map<String, JsonValue>;

/// Data access for one object type
pub trait ObjectProvider: Send + Sync {
    fn insert(&self, row: DataRow) -> Result<i64, CollaboratorError>;

    fn update(&self, id: i64, row: DataRow) -> Result<(), CollaboratorError>;

    /// Delete matching rows, returning how many went away
    fn delete(&self, condition: &WhereCondition) -> Result<usize, CollaboratorError>;

    fn query(&self, condition: &WhereCondition) -> Result<Vec<DataRow>, CollaboratorError>;
}

/// Resolves the provider of an original object type
pub trait ProviderLookup: Send + Sync {
    fn provider(&self, object_type: &str) -> Option<Arc<dyn ObjectProvider>>;
}

/// Providers registered by object type (case-insensitive)
#[derive(Default)]
pub struct ProviderMap {
    providers: DashMap<String, Arc<dyn ObjectProvider>>,
}

impl std::fmt::Debug for ProviderMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderMap")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object_type: &str, provider: Arc<dyn ObjectProvider>) {
        self.providers.insert(object_type.to_ascii_lowercase(), provider);
    }
}

impl ProviderLookup for ProviderMap {
    fn provider(&self, object_type: &str) -> Option<Arc<dyn ObjectProvider>> {
        self.providers
            .get(&object_type.to_ascii_lowercase())
            .map(|p| Arc::clone(p.value()))
    }
}

/// Read access to application settings
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        })
    }
}

/// In-memory settings
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: DashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_ascii_lowercase()).map(|v| v.value().clone())
    }
}

impl TypeRegistry {
    /// Provider for `object_type`, resolved through its original type
    pub fn provider_for(&self, object_type: &str, lookup: &dyn ProviderLookup) -> Option<Arc<dyn ObjectProvider>> {
        let info = self.get(object_type)?;
        lookup.provider(info.original_object_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl ObjectProvider for Nothing {
        fn insert(&self, _row: DataRow) -> Result<i64, CollaboratorError> {
            Ok(1)
        }
        fn update(&self, _id: i64, _row: DataRow) -> Result<(), CollaboratorError> {
            Ok(())
        }
        fn delete(&self, _condition: &WhereCondition) -> Result<usize, CollaboratorError> {
            Ok(0)
        }
        fn query(&self, _condition: &WhereCondition) -> Result<Vec<DataRow>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_settings_bool_parsing() {
        let settings = MemorySettings::new();
        assert_eq!(settings.get_bool(UPDATE_TIMESTAMP_SETTING), None);
        settings.set("cmsupdatetimestamp", "True");
        assert_eq!(settings.get_bool(UPDATE_TIMESTAMP_SETTING), Some(true));
        settings.set(UPDATE_TIMESTAMP_SETTING, "maybe");
        assert_eq!(settings.get_bool(UPDATE_TIMESTAMP_SETTING), None);
    }

    #[test]
    fn test_provider_resolved_through_original_type() {
        use crate::descriptor::{CoreColumns, TypeDescriptor};

        let mut registry = TypeRegistry::default();
        registry
            .register(TypeDescriptor::new(None, "cms.role", "cms.Role", CoreColumns {
                id: Some("RoleID"),
                ..Default::default()
            }))
            .unwrap();
        registry
            .register(
                TypeDescriptor::new(None, "cms.rolelist", "cms.Role", CoreColumns::default())
                    .with_original_object_type("cms.role"),
            )
            .unwrap();
        registry.complete();

        let providers = ProviderMap::new();
        providers.insert("CMS.Role", Arc::new(Nothing));
        assert!(registry.provider_for("cms.rolelist", &providers).is_some());
        assert!(registry.provider_for("cms.user", &providers).is_none());
    }
}
