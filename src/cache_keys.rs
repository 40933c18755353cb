//! Cache dependency keys
//!
//! Keys are lowercase and pipe separated:
//!
//! - `{type}|all`
//! - `{type}|byid|{id}`
//! - `{type}|byname|{codename}`
//! - `{type}|byguid|{guid}`
//! - `{parenttype}|byid|{parentid}|children|{type}`

use tracing::debug;

use crate::events::ObjectChange;
use crate::info::TypeInfo;

/// Receives keys whose cached data must be dropped
pub trait CacheInvalidator: Send + Sync {
    fn touch_keys(&self, keys: &[String]);
}

/// Cache for processes without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn touch_keys(&self, _keys: &[String]) {}
}

pub fn all_key(object_type: &str) -> String {
    format!("{}|all", object_type).to_lowercase()
}

pub fn id_key(object_type: &str, id: i64) -> String {
    format!("{}|byid|{}", object_type, id).to_lowercase()
}

pub fn name_key(object_type: &str, code_name: &str) -> String {
    format!("{}|byname|{}", object_type, code_name).to_lowercase()
}

pub fn guid_key(object_type: &str, guid: &str) -> String {
    format!("{}|byguid|{}", object_type, guid).to_lowercase()
}

pub fn children_key(parent_type: &str, parent_id: i64, object_type: &str) -> String {
    format!("{}|byid|{}|children|{}", parent_type, parent_id, object_type).to_lowercase()
}

impl<'r> TypeInfo<'r> {
    /// Keys touched when `change` happens to an object of this type
    pub fn cache_keys(&self, change: &ObjectChange) -> Vec<String> {
        let object_type = self.object_type();
        let mut keys = vec![all_key(object_type), id_key(object_type, change.object_id)];

        if let Some(code_name) = change.code_name.as_deref().filter(|_| self.code_name_column().is_known()) {
            keys.push(name_key(object_type, code_name));
        }
        if let Some(guid) = change.guid.as_deref().filter(|_| self.guid_column().is_known()) {
            keys.push(guid_key(object_type, guid));
        }
        if let (Some(parent_type), Some(parent_id)) = (self.parent_object_type(), change.parent_id) {
            keys.push(children_key(parent_type, parent_id, object_type));
        }
        for related in self.related_object_types() {
            keys.push(all_key(related));
        }
        keys
    }

    /// Record a local change: invalidate, touch cache keys and raise the
    /// change event
    pub fn notify_changed(&self, change: &ObjectChange, cache: &dyn CacheInvalidator) {
        self.object_invalidated(change.object_id);
        if let Some(parent_id) = change.parent_id {
            self.children_invalidated(parent_id);
        }

        let keys = self.cache_keys(change);
        debug!(
            object_type = %self.object_type(),
            object_id = change.object_id,
            keys = keys.len(),
            "object changed"
        );
        cache.touch_keys(&keys);

        self.events().raise_change(change);
    }
}
