//! Declared relationships between object types

use serde::{Deserialize, Serialize};

use crate::column::Column;

/// How strongly a foreign-key column binds its owner to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Nullable reference, cleared when the target goes away
    #[default]
    NotRequired,
    /// Owner cannot exist without the target
    Required,
    /// Required, but a default target is substituted on import
    RequiredHasDefault,
    /// Column is one of the keys of a binding
    Binding,
}

impl DependencyKind {
    pub fn is_required(&self) -> bool {
        !matches!(self, DependencyKind::NotRequired)
    }

    pub fn is_binding(&self) -> bool {
        matches!(self, DependencyKind::Binding)
    }
}

/// Where the target of a dependency comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyTarget {
    /// Target type fixed at declaration time
    Static(String),
    /// Target type read at runtime from another column of the row
    Dynamic { type_column: Column },
}

/// A foreign-key edge from the declaring type to another type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectDependency {
    pub column: Column,
    pub target: DependencyTarget,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl ObjectDependency {
    pub fn new(column: impl Into<Column>, object_type: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            column: column.into(),
            target: DependencyTarget::Static(object_type.into()),
            kind,
        }
    }

    pub fn dynamic(column: impl Into<Column>, type_column: impl Into<Column>, kind: DependencyKind) -> Self {
        Self {
            column: column.into(),
            target: DependencyTarget::Dynamic {
                type_column: type_column.into(),
            },
            kind,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.target, DependencyTarget::Dynamic { .. })
    }

    /// Statically declared target type, if any
    pub fn object_type(&self) -> Option<&str> {
        match &self.target {
            DependencyTarget::Static(t) => Some(t),
            DependencyTarget::Dynamic { .. } => None,
        }
    }

    pub fn targets(&self, object_type: &str) -> bool {
        self.object_type()
            .is_some_and(|t| t.eq_ignore_ascii_case(object_type))
    }
}

/// A column another type contributes to `extended_type`, pointing back at the
/// declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraColumn {
    pub extended_type: String,
    pub column: Column,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl ExtraColumn {
    pub fn new(extended_type: impl Into<String>, column: impl Into<Column>, kind: DependencyKind) -> Self {
        Self {
            extended_type: extended_type.into(),
            column: column.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kinds() {
        assert!(!DependencyKind::NotRequired.is_required());
        assert!(DependencyKind::Required.is_required());
        assert!(DependencyKind::RequiredHasDefault.is_required());
        assert!(DependencyKind::Binding.is_required());
        assert!(DependencyKind::Binding.is_binding());
    }

    #[test]
    fn test_static_target_matches_case_insensitively() {
        let dep = ObjectDependency::new("RoleID", "cms.Role", DependencyKind::Binding);
        assert!(dep.targets("CMS.ROLE"));
        assert!(!dep.is_dynamic());
    }

    #[test]
    fn test_dynamic_target_has_no_object_type() {
        let dep = ObjectDependency::dynamic("ObjectID", "ObjectType", DependencyKind::Required);
        assert!(dep.is_dynamic());
        assert_eq!(dep.object_type(), None);
        assert!(!dep.targets("cms.role"));
    }
}
