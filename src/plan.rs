//! Deletion planning
//!
//! Deleting an object means first dealing with every row that references
//! it: rows that cannot outlive it are deleted (recursively), optional
//! references are cleared. A [`DeletePlan`] is that decision tree at the
//! type level; [`DeletePlan::execute`] runs it for one object ID through
//! the registered providers.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::binding::WhereCondition;
use crate::error::{Result, TypeError};
use crate::graph::{DependencyReference, ReferenceKind};
use crate::info::TypeInfo;
use crate::provider::{DataRow, ObjectProvider, ProviderLookup};
use crate::registry::TypeRegistry;
use std::sync::Arc;

/// What happens to referencing rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// Delete the referencing rows, after handling their own references
    Delete,
    /// Set the referencing column to null
    ClearColumn,
}

/// One step: rows of `object_type` whose `column` holds the deleted ID
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub object_type: String,
    pub column: String,
    pub kind: ReferenceKind,
    pub action: PlanAction,
    /// Column holding the target type, for dynamic references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_column: Option<String>,
    /// The type already appears higher up this branch
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cycle: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PlanStep>,
}

/// Type-level plan for deleting objects of `object_type`
#[derive(Debug, Clone, Serialize)]
pub struct DeletePlan {
    pub object_type: String,
    pub steps: Vec<PlanStep>,
}

impl DeletePlan {
    /// Steps flattened depth-first with their depth
    pub fn flatten(&self) -> Vec<(usize, &PlanStep)> {
        fn walk<'a>(steps: &'a [PlanStep], depth: usize, out: &mut Vec<(usize, &'a PlanStep)>) {
            for step in steps {
                out.push((depth, step));
                walk(&step.steps, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.steps, 1, &mut out);
        out
    }

    pub fn step_count(&self) -> usize {
        self.flatten().len()
    }

    /// Delete object `object_id` and everything the plan says must go with
    /// it. Returns the number of rows deleted.
    pub fn execute(&self, registry: &TypeRegistry, object_id: i64, lookup: &dyn ProviderLookup) -> Result<usize> {
        let root = registry
            .get(&self.object_type)
            .ok_or_else(|| TypeError::UnknownType(self.object_type.clone()))?;
        let id_column = root
            .id_column()
            .name()
            .ok_or_else(|| TypeError::column_not_found(root.object_type(), root.object_type()))?;

        let condition = WhereCondition::new().where_equals(id_column, object_id);
        let deleted = Executor { registry, lookup }.delete_rows(root, &condition, &self.steps)?;

        info!(object_type = %self.object_type, object_id, deleted, "delete plan executed");
        Ok(deleted)
    }
}

struct Executor<'a> {
    registry: &'a TypeRegistry,
    lookup: &'a dyn ProviderLookup,
}

impl<'a> Executor<'a> {
    fn provider(&self, info: TypeInfo<'_>) -> Result<Arc<dyn ObjectProvider>> {
        self.registry
            .provider_for(info.object_type(), self.lookup)
            .ok_or_else(|| TypeError::ProviderMissing(info.original_object_type().to_string()))
    }

    fn provider_error(info: TypeInfo<'_>) -> impl FnOnce(crate::error::CollaboratorError) -> TypeError + '_ {
        move |source| TypeError::Provider {
            object_type: info.object_type().to_string(),
            source,
        }
    }

    /// Handle `steps` for every row of `info` matching `condition`, then
    /// delete those rows
    fn delete_rows(&self, info: TypeInfo<'_>, condition: &WhereCondition, steps: &[PlanStep]) -> Result<usize> {
        let provider = self.provider(info)?;
        let mut deleted = 0;

        if !steps.is_empty() {
            let rows = provider
                .query(condition)
                .map_err(Self::provider_error(info))?;
            let ids: Vec<i64> = match info.id_column().name() {
                Some(id_column) => rows.iter().filter_map(|row| row_id(row, id_column)).collect(),
                None => {
                    warn!(
                        object_type = %info.object_type(),
                        rows = rows.len(),
                        skipped_steps = steps.len(),
                        "no ID column; references to these rows are left in place"
                    );
                    Vec::new()
                }
            };

            for id in ids {
                for step in steps {
                    deleted += self.apply_step(info, id, step)?;
                }
            }
        }

        deleted += provider
            .delete(condition)
            .map_err(Self::provider_error(info))?;
        debug!(object_type = %info.object_type(), %condition, deleted, "rows deleted");
        Ok(deleted)
    }

    fn apply_step(&self, target: TypeInfo<'_>, target_id: i64, step: &PlanStep) -> Result<usize> {
        let source = self
            .registry
            .get(&step.object_type)
            .ok_or_else(|| TypeError::UnknownType(step.object_type.clone()))?;

        let mut condition = WhereCondition::new().where_equals(step.column.as_str(), target_id);
        if let Some(type_column) = &step.type_column {
            condition = condition.where_equals(type_column.as_str(), target.object_type());
        }

        match step.action {
            PlanAction::Delete if step.cycle => {
                // Cut the recursion; rows are removed without cascading further
                let provider = self.provider(source)?;
                provider.delete(&condition).map_err(Self::provider_error(source))
            }
            PlanAction::Delete => self.delete_rows(source, &condition, &step.steps),
            PlanAction::ClearColumn => {
                self.clear_column(source, &condition, &step.column)?;
                Ok(0)
            }
        }
    }

    fn clear_column(&self, source: TypeInfo<'_>, condition: &WhereCondition, column: &str) -> Result<()> {
        let Some(id_column) = source.id_column().name() else {
            return Ok(());
        };
        let provider = self.provider(source)?;
        let rows = provider
            .query(condition)
            .map_err(Self::provider_error(source))?;

        for id in rows.iter().filter_map(|row| row_id(row, id_column)) {
            let mut update = DataRow::new();
            update.insert(column.to_string(), JsonValue::Null);
            provider
                .update(id, update)
                .map_err(Self::provider_error(source))?;
        }
        Ok(())
    }
}

fn row_id(row: &DataRow, id_column: &str) -> Option<i64> {
    row.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(id_column))
        .and_then(|(_, v)| v.as_i64())
}

impl TypeRegistry {
    /// Plan the deletion of objects of `object_type`
    pub fn delete_plan(&self, object_type: &str) -> Result<DeletePlan> {
        let info = self
            .get(object_type)
            .ok_or_else(|| TypeError::UnknownType(object_type.to_string()))?;

        let mut path = vec![info.object_type().to_ascii_lowercase()];
        let steps = plan_steps(info, &mut path)?;

        Ok(DeletePlan {
            object_type: info.object_type().to_string(),
            steps,
        })
    }
}

fn plan_steps(target: TypeInfo<'_>, path: &mut Vec<String>) -> Result<Vec<PlanStep>> {
    let registry = target.registry();
    let mut references: Vec<DependencyReference> = target
        .dependency_references()
        .chain(target.dynamic_dependency_references())
        .collect();

    // Bindings must be able to name their column for this type; a binding
    // that cannot is misdeclared
    for binding in target
        .binding_object_types()
        .iter()
        .chain(target.other_binding_object_types())
    {
        let Some(info) = registry.get(binding) else {
            continue;
        };
        let column = info.type_column(target.object_type())?;
        let covered = references.iter().any(|r| {
            r.source_type.eq_ignore_ascii_case(binding) && column.matches(&r.column)
        });
        if !covered {
            references.push(DependencyReference {
                source_type: info.object_type().to_string(),
                target_type: target.object_type().to_string(),
                column: column.as_str().to_string(),
                kind: ReferenceKind::Dependency,
                required: true,
                type_column: None,
            });
        }
    }

    let mut steps = Vec::with_capacity(references.len());
    for reference in references {
        let Some(source) = registry.get(&reference.source_type) else {
            continue;
        };
        let action = if reference.required || source.is_binding() {
            PlanAction::Delete
        } else {
            PlanAction::ClearColumn
        };

        let key = source.object_type().to_ascii_lowercase();
        let cycle = action == PlanAction::Delete && path.contains(&key);
        let children = if action == PlanAction::Delete && !cycle {
            path.push(key);
            let children = plan_steps(source, path)?;
            path.pop();
            children
        } else {
            Vec::new()
        };

        steps.push(PlanStep {
            object_type: reference.source_type,
            column: reference.column,
            kind: reference.kind,
            action,
            type_column: reference.type_column,
            cycle,
            steps: children,
        });
    }

    Ok(steps)
}
