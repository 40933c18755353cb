//! Binding key resolution and row filters
//!
//! A binding row is identified by the IDs of the objects it joins. For a
//! given object type the binding knows which of its columns holds that
//! type's ID; a binding that cannot answer is misdeclared and the failure
//! surfaces as [`TypeError::ColumnNotFound`].

use serde_json::Value as JsonValue;
use std::fmt;

use crate::column::Column;
use crate::error::{Result, TypeError};
use crate::info::TypeInfo;
use crate::provider::DataRow;

/// Literal in a [`WhereCondition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "N'{}'", v.replace('\'', "''")),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

impl SqlValue {
    fn matches(&self, value: Option<&JsonValue>) -> bool {
        match (self, value) {
            (SqlValue::Null, None | Some(JsonValue::Null)) => true,
            (SqlValue::Int(expected), Some(JsonValue::Number(n))) => n.as_i64() == Some(*expected),
            (SqlValue::Text(expected), Some(JsonValue::String(s))) => expected.eq_ignore_ascii_case(s),
            _ => false,
        }
    }
}

/// Conjunction of column equality tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereCondition {
    clauses: Vec<(String, SqlValue)>,
}

impl WhereCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_equals(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.clauses.push((column.into(), value.into()));
        self
    }

    pub fn where_null(mut self, column: impl Into<String>) -> Self {
        self.clauses.push((column.into(), SqlValue::Null));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, SqlValue)] {
        &self.clauses
    }

    /// Evaluate against an in-memory row; column names compare case-insensitively
    pub fn matches(&self, row: &DataRow) -> bool {
        self.clauses.iter().all(|(column, expected)| {
            let value = row
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v);
            expected.matches(value)
        })
    }
}

impl fmt::Display for WhereCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            match value {
                SqlValue::Null => write!(f, "[{}] IS NULL", column)?,
                _ => write!(f, "[{}] = {}", column, value)?,
            }
        }
        Ok(())
    }
}

impl<'r> TypeInfo<'r> {
    /// Every column of this type holding an ID of `object_type`, parent
    /// column first
    pub fn type_columns(&self, object_type: &str) -> Vec<&'r Column> {
        let d = self.descriptor();
        let system = self.registry().system_types();
        let mut columns: Vec<&'r Column> = Vec::new();
        let mut push = |column: &'r Column| {
            if column.is_known() && !columns.contains(&column) {
                columns.push(column);
            }
        };

        if d.parent_object_type().is_some_and(|p| p.eq_ignore_ascii_case(object_type)) {
            push(d.parent_id_column());
        }
        if system.is_site(object_type) {
            push(d.site_id_column());
        }
        if system.is_group(object_type) {
            push(d.group_id_column());
        }
        for dep in self.object_dependencies() {
            if !dep.is_dynamic() && dep.targets(object_type) {
                push(&dep.column);
            }
        }
        columns
    }

    /// The column holding an ID of `object_type`
    pub fn type_column(&self, object_type: &str) -> Result<&'r Column> {
        self.type_columns(object_type)
            .into_iter()
            .next()
            .ok_or_else(|| TypeError::column_not_found(object_type, self.object_type()))
    }

    /// Filter selecting the binding row that joins a parent object with one
    /// other object
    pub fn binding_where_condition(
        &self,
        parent_id: i64,
        other_object_type: &str,
        other_id: i64,
    ) -> Result<WhereCondition> {
        let parent_type = self.parent_object_type().unwrap_or(crate::column::UNKNOWN_COLUMN);
        let parent_column = self
            .parent_id_column()
            .name()
            .ok_or_else(|| TypeError::column_not_found(parent_type, self.object_type()))?;

        let other_column = self
            .type_columns(other_object_type)
            .into_iter()
            .filter_map(Column::name)
            .find(|c| !c.eq_ignore_ascii_case(parent_column))
            .ok_or_else(|| TypeError::column_not_found(other_object_type, self.object_type()))?;

        Ok(WhereCondition::new()
            .where_equals(parent_column, parent_id)
            .where_equals(other_column, other_id))
    }

    /// Filter selecting the binding row identified by several `(type, id)`
    /// keys. Keys of the same type take that type's columns in order.
    pub fn binding_where_condition_for(&self, keys: &[(&str, i64)]) -> Result<WhereCondition> {
        let mut used: Vec<&'r str> = Vec::new();
        let mut condition = WhereCondition::new();

        for (object_type, id) in keys {
            let column = self
                .type_columns(object_type)
                .into_iter()
                .filter_map(Column::name)
                .find(|c| !used.iter().any(|u| u.eq_ignore_ascii_case(c)))
                .ok_or_else(|| TypeError::column_not_found(*object_type, self.object_type()))?;
            used.push(column);
            condition = condition.where_equals(column, *id);
        }

        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{DependencyKind, ObjectDependency};
    use crate::descriptor::{CoreColumns, TypeDescriptor};
    use crate::registry::TypeRegistry;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::default();
        registry
            .register(TypeDescriptor::new(None, "cms.role", "cms.Role", CoreColumns {
                id: Some("RoleID"),
                ..Default::default()
            }))
            .unwrap();
        registry
            .register(TypeDescriptor::new(None, "cms.user", "cms.User", CoreColumns {
                id: Some("UserID"),
                ..Default::default()
            }))
            .unwrap();
        registry
            .register(
                TypeDescriptor::new(None, "cms.userrole", "cms.UserRole", CoreColumns {
                    parent_id: Some("UserID"),
                    parent_object_type: Some("cms.user"),
                    ..Default::default()
                })
                .with_dependency(ObjectDependency::new("RoleID", "cms.role", DependencyKind::Binding)),
            )
            .unwrap();
        registry
            .register(
                TypeDescriptor::new(None, "cms.rolerole", "cms.RoleRole", CoreColumns::default())
                    .with_dependency(ObjectDependency::new("LeftRoleID", "cms.role", DependencyKind::Binding))
                    .with_dependency(ObjectDependency::new("RightRoleID", "cms.role", DependencyKind::Binding)),
            )
            .unwrap();
        registry.complete();
        registry
    }

    #[test]
    fn test_where_condition_display() {
        let condition = WhereCondition::new()
            .where_equals("UserID", 5)
            .where_equals("ObjectType", "cms.o'role")
            .where_null("SiteID");
        assert_eq!(
            condition.to_string(),
            "[UserID] = 5 AND [ObjectType] = N'cms.o''role' AND [SiteID] IS NULL"
        );
        assert_eq!(WhereCondition::new().to_string(), "");
    }

    #[test]
    fn test_where_condition_matches_rows() {
        let row: DataRow = serde_json::from_value(serde_json::json!({
            "userid": 5, "RoleID": 2, "SiteID": null
        }))
        .unwrap();
        assert!(WhereCondition::new().where_equals("UserID", 5).where_null("SiteID").matches(&row));
        assert!(!WhereCondition::new().where_equals("RoleID", 3).matches(&row));
    }

    #[test]
    fn test_two_key_binding_condition() {
        let registry = registry();
        let binding = registry.get("cms.userrole").unwrap();
        let condition = binding.binding_where_condition(1, "cms.role", 2).unwrap();
        assert_eq!(condition.to_string(), "[UserID] = 1 AND [RoleID] = 2");
    }

    #[test]
    fn test_two_key_binding_condition_missing_column() {
        let registry = registry();
        let binding = registry.get("cms.userrole").unwrap();
        let err = binding.binding_where_condition(1, "cms.site", 2).unwrap_err();
        match err {
            TypeError::ColumnNotFound { object_type, binding_type } => {
                assert_eq!(object_type, "cms.site");
                assert_eq!(binding_type, "cms.userrole");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_n_key_binding_condition_same_type_twice() {
        let registry = registry();
        let binding = registry.get("cms.rolerole").unwrap();
        let condition = binding
            .binding_where_condition_for(&[("cms.role", 1), ("cms.role", 2)])
            .unwrap();
        assert_eq!(condition.to_string(), "[LeftRoleID] = 1 AND [RightRoleID] = 2");

        let err = binding
            .binding_where_condition_for(&[("cms.role", 1), ("cms.role", 2), ("cms.role", 3)])
            .unwrap_err();
        assert!(matches!(err, TypeError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_type_column() {
        let registry = registry();
        let binding = registry.get("cms.userrole").unwrap();
        assert_eq!(binding.type_column("CMS.USER").unwrap().as_str(), "UserID");
        assert_eq!(binding.type_column("cms.role").unwrap().as_str(), "RoleID");
        assert!(binding.type_column("cms.site").is_err());
    }
}
