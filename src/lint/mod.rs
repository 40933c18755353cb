//! Declaration Linting
//!
//! Checks a registry for declaration mistakes that the registry itself
//! tolerates: references to unregistered types, parent columns without a
//! parent type, bindings without key columns, malformed column names and
//! dependency cycles.
//!
//! ## Codes
//! Errors: `UNKNOWN_PARENT_TYPE`, `MISSING_PARENT_COLUMN`,
//! `UNKNOWN_DEPENDENCY_TYPE`, `DYNAMIC_DEPENDENCY_WITHOUT_TYPE_COLUMN`,
//! `UNKNOWN_EXTENDED_TYPE`, `UNKNOWN_COMPONENT_TYPE`, `UNKNOWN_ORIGINAL_TYPE`,
//! `INVALID_COLUMN_NAME`, `BINDING_WITHOUT_COLUMNS`.
//!
//! Warnings: `ORPHAN_PARENT_COLUMN`, `UNKNOWN_INDIRECT_TYPE`,
//! `DEPENDENCY_CYCLE`.

use regex::Regex;
use serde::Serialize;

use crate::dependency::DependencyTarget;
use crate::error::Result;
use crate::info::TypeInfo;
use crate::registry::TypeRegistry;

/// Default accepted column name shape
pub const DEFAULT_COLUMN_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Result of linting one type
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub object_type: String,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct LintError {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

/// The declaration linter
pub struct DeclarationLinter {
    column_pattern: Regex,
}

impl DeclarationLinter {
    pub fn new() -> Result<Self> {
        Self::with_column_pattern(DEFAULT_COLUMN_PATTERN)
    }

    pub fn with_column_pattern(pattern: &str) -> Result<Self> {
        Ok(Self {
            column_pattern: Regex::new(pattern)?,
        })
    }

    /// Lint every type; only types with findings are returned
    pub fn lint_registry(&self, registry: &TypeRegistry) -> Vec<LintResult> {
        let mut results: Vec<LintResult> = registry
            .iter()
            .map(|info| self.lint(info))
            .collect();

        if let Some(graph) = registry.graph() {
            for cycle in graph.cycles() {
                for member in cycle {
                    if let Some(result) = results
                        .iter_mut()
                        .find(|r| r.object_type.eq_ignore_ascii_case(member))
                    {
                        result.warnings.push(LintWarning {
                            code: "DEPENDENCY_CYCLE",
                            message: format!("Part of a dependency cycle: {}", cycle.join(" -> ")),
                            path: "depends_on".to_string(),
                        });
                    }
                }
            }
        }

        results.retain(|r| !r.is_clean() || r.has_warnings());
        results
    }

    /// Lint one type
    pub fn lint(&self, info: TypeInfo<'_>) -> LintResult {
        let mut result = LintResult {
            object_type: info.object_type().to_string(),
            ..Default::default()
        };
        let registry = info.registry();

        // Parent
        match info.parent_object_type() {
            Some(parent) => {
                if !registry.contains(parent) {
                    result.errors.push(LintError {
                        code: "UNKNOWN_PARENT_TYPE",
                        message: format!("Parent type '{}' is not registered", parent),
                        path: "parent_object_type".to_string(),
                    });
                }
                if info.parent_id_column().is_unknown() {
                    result.errors.push(LintError {
                        code: "MISSING_PARENT_COLUMN",
                        message: format!("Parent type '{}' declared without a parent ID column", parent),
                        path: "columns.parent_id".to_string(),
                    });
                }
            }
            None => {
                if info.raw_parent_id_column().is_known() {
                    result.warnings.push(LintWarning {
                        code: "ORPHAN_PARENT_COLUMN",
                        message: format!(
                            "Parent ID column '{}' is ignored without a parent type",
                            info.raw_parent_id_column()
                        ),
                        path: "columns.parent_id".to_string(),
                    });
                }
            }
        }

        if info.is_virtual() && !registry.contains(info.original_object_type()) {
            result.errors.push(LintError {
                code: "UNKNOWN_ORIGINAL_TYPE",
                message: format!("Original type '{}' is not registered", info.original_object_type()),
                path: "original_object_type".to_string(),
            });
        }

        // Dependencies as declared, not including `extends` from others
        for (i, dep) in info.depends_on().iter().enumerate() {
            match &dep.target {
                DependencyTarget::Static(target) if !registry.contains(target) => {
                    result.errors.push(LintError {
                        code: "UNKNOWN_DEPENDENCY_TYPE",
                        message: format!("Dependency on '{}' via {} targets an unregistered type", target, dep.column),
                        path: format!("depends_on[{}].object_type", i),
                    });
                }
                DependencyTarget::Dynamic { type_column } if type_column.is_unknown() => {
                    result.errors.push(LintError {
                        code: "DYNAMIC_DEPENDENCY_WITHOUT_TYPE_COLUMN",
                        message: format!("Dynamic dependency via {} has no type column", dep.column),
                        path: format!("depends_on[{}].type_column", i),
                    });
                }
                _ => {}
            }
        }

        for (i, extra) in info.extends().iter().enumerate() {
            if !registry.contains(&extra.extended_type) {
                result.errors.push(LintError {
                    code: "UNKNOWN_EXTENDED_TYPE",
                    message: format!("Extended type '{}' is not registered", extra.extended_type),
                    path: format!("extends[{}].extended_type", i),
                });
            }
        }

        for (i, component) in info.consists_of().iter().enumerate() {
            if !registry.contains(component) {
                result.errors.push(LintError {
                    code: "UNKNOWN_COMPONENT_TYPE",
                    message: format!("Component type '{}' is not registered", component),
                    path: format!("consists_of[{}]", i),
                });
            }
        }

        for (i, target) in info.depends_on_indirectly().iter().enumerate() {
            if !registry.contains(target) {
                result.warnings.push(LintWarning {
                    code: "UNKNOWN_INDIRECT_TYPE",
                    message: format!("Indirect dependency '{}' is not registered", target),
                    path: format!("depends_on_indirectly[{}]", i),
                });
            }
        }

        for column in info.known_columns() {
            if !self.column_pattern.is_match(column) {
                result.errors.push(LintError {
                    code: "INVALID_COLUMN_NAME",
                    message: format!("Column name '{}' does not match {}", column, self.column_pattern),
                    path: "columns".to_string(),
                });
            }
        }

        if info.is_binding() && info.binding_columns().is_empty() {
            result.errors.push(LintError {
                code: "BINDING_WITHOUT_COLUMNS",
                message: "Binding type has no parent, site or binding dependency column".to_string(),
                path: "columns".to_string(),
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{DependencyKind, ExtraColumn, ObjectDependency};
    use crate::descriptor::{CoreColumns, TypeDescriptor};

    fn lint(descriptors: Vec<TypeDescriptor>) -> Vec<LintResult> {
        let mut registry = TypeRegistry::default();
        registry.register_all(descriptors).unwrap();
        registry.complete();
        DeclarationLinter::new().unwrap().lint_registry(&registry)
    }

    fn codes(results: &[LintResult], object_type: &str) -> Vec<&'static str> {
        results
            .iter()
            .filter(|r| r.object_type == object_type)
            .flat_map(|r| r.errors.iter().map(|e| e.code).chain(r.warnings.iter().map(|w| w.code)))
            .collect()
    }

    fn object(object_type: &str, id: &str) -> TypeDescriptor {
        TypeDescriptor::new(None, object_type, object_type, CoreColumns {
            id: Some(id),
            ..Default::default()
        })
    }

    #[test]
    fn test_clean_registry() {
        let results = lint(vec![
            object("cms.role", "RoleID"),
            object("cms.user", "UserID")
                .with_dependency(ObjectDependency::new("UserRoleID", "cms.role", DependencyKind::NotRequired)),
        ]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_unknown_targets() {
        let results = lint(vec![object("cms.user", "UserID")
            .with_dependency(ObjectDependency::new("UserRoleID", "cms.role", DependencyKind::NotRequired))
            .with_extends(ExtraColumn::new("cms.site", "SiteOwnerID", DependencyKind::NotRequired))
            .with_component("cms.usersettings")
            .with_indirect_dependency("cms.avatar")]);
        let found = codes(&results, "cms.user");
        assert!(found.contains(&"UNKNOWN_DEPENDENCY_TYPE"));
        assert!(found.contains(&"UNKNOWN_EXTENDED_TYPE"));
        assert!(found.contains(&"UNKNOWN_COMPONENT_TYPE"));
        assert!(found.contains(&"UNKNOWN_INDIRECT_TYPE"));
    }

    #[test]
    fn test_parent_problems() {
        let orphan = object("cms.role", "RoleID").with_parent_id_column("ParentID");
        let missing = TypeDescriptor::new(None, "cms.setting", "cms.Setting", CoreColumns {
            id: Some("SettingID"),
            parent_object_type: Some("cms.nowhere"),
            ..Default::default()
        });
        let results = lint(vec![orphan, missing]);
        assert_eq!(codes(&results, "cms.role"), vec!["ORPHAN_PARENT_COLUMN"]);
        let found = codes(&results, "cms.setting");
        assert!(found.contains(&"UNKNOWN_PARENT_TYPE"));
        assert!(found.contains(&"MISSING_PARENT_COLUMN"));
    }

    #[test]
    fn test_bad_columns_and_empty_binding() {
        let results = lint(vec![
            object("cms.role", "Role ID"),
            TypeDescriptor::new(None, "cms.empty", "cms.Empty", CoreColumns::default()),
            object("cms.doc", "DocID")
                .with_dependency(ObjectDependency::dynamic("ObjectID", "", DependencyKind::Required)),
        ]);
        assert_eq!(codes(&results, "cms.role"), vec!["INVALID_COLUMN_NAME"]);
        assert_eq!(codes(&results, "cms.empty"), vec!["BINDING_WITHOUT_COLUMNS"]);
        assert_eq!(codes(&results, "cms.doc"), vec!["DYNAMIC_DEPENDENCY_WITHOUT_TYPE_COLUMN"]);
    }

    #[test]
    fn test_cycle_warning() {
        let results = lint(vec![
            object("a.one", "OneID").with_dependency(ObjectDependency::new("TwoID", "a.two", DependencyKind::Required)),
            object("a.two", "TwoID").with_dependency(ObjectDependency::new("OneID", "a.one", DependencyKind::NotRequired)),
        ]);
        assert_eq!(codes(&results, "a.one"), vec!["DEPENDENCY_CYCLE"]);
        assert_eq!(codes(&results, "a.two"), vec!["DEPENDENCY_CYCLE"]);
    }

    #[test]
    fn test_custom_pattern() {
        assert!(DeclarationLinter::with_column_pattern("(").is_err());
        let linter = DeclarationLinter::with_column_pattern("^[A-Z]").unwrap();
        let mut registry = TypeRegistry::default();
        registry.register(object("cms.role", "roleID")).unwrap();
        registry.complete();
        let result = linter.lint(registry.get("cms.role").unwrap());
        assert_eq!(result.errors[0].code, "INVALID_COLUMN_NAME");
    }
}
