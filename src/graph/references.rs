//! Column-level references between object types
//!
//! A [`DependencyReference`] is one column of a source type that stores the
//! ID of a target object. Deletion planning and the CLI walk these.

use serde::Serialize;
use std::collections::HashSet;

use crate::column::Column;
use crate::dependency::DependencyTarget;
use crate::info::TypeInfo;

/// What kind of column carries the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Parent,
    Site,
    Group,
    Dependency,
    /// Target type is read from another column of the source row
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReference {
    pub source_type: String,
    pub target_type: String,
    pub column: String,
    pub kind: ReferenceKind,
    /// The source row cannot outlive the target
    pub required: bool,
    /// Column holding the target type, for dynamic references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_column: Option<String>,
}

impl<'r> TypeInfo<'r> {
    /// Every column of every other type that points at this type.
    /// Parent, site and group columns come first; a column is never
    /// reported twice for the same source.
    pub fn dependency_references(&self) -> impl Iterator<Item = DependencyReference> + 'r {
        let target = *self;
        self.registry()
            .iter()
            .filter(move |source| source.index() != target.index())
            .flat_map(move |source| static_references(source, target))
    }

    /// References through dynamic dependencies. Only sources that opted in
    /// take part, except the metafile and workflow trigger types, which are
    /// gated by this type's own `has_metafiles` / `is_trigger_target`.
    pub fn dynamic_dependency_references(&self) -> impl Iterator<Item = DependencyReference> + 'r {
        let target = *self;
        self.registry()
            .iter()
            .filter(move |source| source.index() != target.index())
            .filter(move |source| takes_part_dynamically(*source, target))
            .flat_map(move |source| dynamic_references(source, target))
    }
}

fn static_references(source: TypeInfo<'_>, target: TypeInfo<'_>) -> Vec<DependencyReference> {
    let system = source.registry().system_types();
    let target_name = target.object_type();
    let global = source.supports_global_objects();

    let mut seen: HashSet<String> = HashSet::new();
    let mut refs = Vec::new();
    let mut emit = |column: &Column, kind: ReferenceKind, required: bool| {
        let Some(name) = column.name() else {
            return;
        };
        if seen.insert(name.to_ascii_lowercase()) {
            refs.push(DependencyReference {
                source_type: source.object_type().to_string(),
                target_type: target_name.to_string(),
                column: name.to_string(),
                kind,
                required,
                type_column: None,
            });
        }
    };

    if source
        .parent_object_type()
        .is_some_and(|p| p.eq_ignore_ascii_case(target_name))
    {
        emit(source.parent_id_column(), ReferenceKind::Parent, true);
    }
    if system.is_site(target_name) {
        emit(source.site_id_column(), ReferenceKind::Site, !global);
    }
    if system.is_group(target_name) {
        emit(source.group_id_column(), ReferenceKind::Group, !global);
    } else {
        for dep in source.object_dependencies() {
            if !dep.is_dynamic() && dep.targets(target_name) {
                emit(&dep.column, ReferenceKind::Dependency, dep.kind.is_required());
            }
        }
    }

    refs
}

fn takes_part_dynamically(source: TypeInfo<'_>, target: TypeInfo<'_>) -> bool {
    let system = source.registry().system_types();
    if source.is_type(&system.metafile) {
        target.has_metafiles()
    } else if source.is_type(&system.workflow_trigger) {
        target.is_trigger_target()
    } else {
        source.is_dynamic_dependency_source()
    }
}

fn dynamic_references(source: TypeInfo<'_>, target: TypeInfo<'_>) -> Vec<DependencyReference> {
    source
        .object_dependencies()
        .iter()
        .filter_map(|dep| match (&dep.target, dep.column.name()) {
            (DependencyTarget::Dynamic { type_column }, Some(column)) => Some(DependencyReference {
                source_type: source.object_type().to_string(),
                target_type: target.object_type().to_string(),
                column: column.to_string(),
                kind: ReferenceKind::Dynamic,
                required: dep.kind.is_required(),
                type_column: type_column.name().map(String::from),
            }),
            _ => None,
        })
        .collect()
}
