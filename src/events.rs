//! Per-type extensibility hooks
//!
//! Two multicast callbacks per object type: one raised when an object of the
//! type changes, one raised when related data for an instance is requested.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// What happened to an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// Payload of the change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectChange {
    pub object_type: String,
    pub object_id: i64,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl ObjectChange {
    pub fn new(object_type: impl Into<String>, object_id: i64, action: ChangeAction) -> Self {
        Self {
            object_type: object_type.into(),
            object_id,
            action,
            parent_id: None,
            code_name: None,
            guid: None,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_code_name(mut self, code_name: impl Into<String>) -> Self {
        self.code_name = Some(code_name.into());
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }
}

/// Request for lazily populated related data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRelatedRequest {
    pub object_type: String,
    pub object_id: i64,
}

pub type ChangeHandler = Arc<dyn Fn(&ObjectChange) + Send + Sync>;
pub type LoadRelatedHandler = Arc<dyn Fn(&LoadRelatedRequest) -> Option<JsonValue> + Send + Sync>;

/// Handler lists for one object type
#[derive(Default)]
pub struct TypeEvents {
    on_change: RwLock<Vec<ChangeHandler>>,
    on_load_related: RwLock<Vec<LoadRelatedHandler>>,
}

impl std::fmt::Debug for TypeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEvents")
            .field("on_change", &self.on_change.read().len())
            .field("on_load_related", &self.on_load_related.read().len())
            .finish()
    }
}

impl TypeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_change(&self, handler: impl Fn(&ObjectChange) + Send + Sync + 'static) {
        self.on_change.write().push(Arc::new(handler));
    }

    pub fn on_load_related(
        &self,
        handler: impl Fn(&LoadRelatedRequest) -> Option<JsonValue> + Send + Sync + 'static,
    ) {
        self.on_load_related.write().push(Arc::new(handler));
    }

    /// Invoke every change handler in registration order
    pub fn raise_change(&self, change: &ObjectChange) {
        // Handlers run outside the lock so they may register further handlers
        let handlers: Vec<ChangeHandler> = self.on_change.read().clone();
        for handler in handlers {
            handler(change);
        }
    }

    /// First handler returning data wins
    pub fn load_related(&self, request: &LoadRelatedRequest) -> Option<JsonValue> {
        let handlers: Vec<LoadRelatedHandler> = self.on_load_related.read().clone();
        handlers.iter().find_map(|handler| handler(request))
    }

    pub fn change_handler_count(&self) -> usize {
        self.on_change.read().len()
    }

    pub fn load_related_handler_count(&self) -> usize {
        self.on_load_related.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_change_handlers_all_run() {
        let events = TypeEvents::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            events.on_change(move |change| {
                assert_eq!(change.action, ChangeAction::Update);
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        events.raise_change(&ObjectChange::new("cms.role", 1, ChangeAction::Update));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(events.change_handler_count(), 3);
    }

    #[test]
    fn test_first_related_data_wins() {
        let events = TypeEvents::new();
        assert_eq!(events.load_related(&LoadRelatedRequest { object_type: "cms.role".into(), object_id: 1 }), None);

        events.on_load_related(|_| None);
        events.on_load_related(|req| Some(serde_json::json!({ "id": req.object_id })));
        events.on_load_related(|_| Some(serde_json::json!("unreachable")));

        let data = events.load_related(&LoadRelatedRequest { object_type: "cms.role".into(), object_id: 9 });
        assert_eq!(data, Some(serde_json::json!({ "id": 9 })));
    }
}
