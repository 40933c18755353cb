//! Single-pass derivation of cross-type relationships
//!
//! Runs once when the registry completes. Phases read only data produced by
//! earlier phases, so nothing is computed recursively or on demand:
//!
//! 1. related types (virtual/original pairs, both directions)
//! 2. full object dependencies (declared plus reverse `extends`)
//! 3. flags
//! 4. composites, children, bindings and reference columns
//! 5. dependent types and the dependency graph

use std::collections::HashMap;

use tracing::debug;

use super::{DependencyGraph, EdgeKind};
use crate::config::SystemTypes;
use crate::dependency::{DependencyTarget, ObjectDependency};
use crate::descriptor::TypeDescriptor;
use crate::flags::{derive_flags, FlagContext, ResolvedFlags};
use crate::registry::TypeEntry;

/// Everything computed about one type from the rest of the registry
#[derive(Debug, Clone, Default)]
pub(crate) struct DerivedType {
    pub flags: ResolvedFlags,
    pub related_types: Vec<String>,
    pub object_dependencies: Vec<ObjectDependency>,
    pub has_binding_type_dependencies: bool,
    pub composite_object_type: Option<String>,
    pub child_object_types: Vec<String>,
    pub binding_object_types: Vec<String>,
    pub other_binding_object_types: Vec<String>,
    pub site_binding_object_type: Option<String>,
    pub reference_columns: Vec<String>,
    pub dependent_object_types: Vec<String>,
}

/// Derived data of the whole registry, parallel to its entries
#[derive(Debug, Clone, Default)]
pub(crate) struct DerivedIndex {
    pub types: Vec<DerivedType>,
    pub graph: DependencyGraph,
}

struct Resolver<'a> {
    entries: &'a [TypeEntry],
    by_name: &'a HashMap<String, usize>,
}

impl<'a> Resolver<'a> {
    fn index(&self, object_type: &str) -> Option<usize> {
        self.by_name.get(&object_type.to_ascii_lowercase()).copied()
    }

    fn descriptor(&self, index: usize) -> &'a TypeDescriptor {
        &self.entries[index].descriptor
    }

    fn name(&self, index: usize) -> &'a str {
        self.descriptor(index).object_type()
    }
}

/// Case-insensitive push that keeps first-seen order
fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

pub(crate) fn derive_index(
    entries: &[TypeEntry],
    by_name: &HashMap<String, usize>,
    system: &SystemTypes,
) -> DerivedIndex {
    let r = Resolver { entries, by_name };
    let n = entries.len();
    let mut types = vec![DerivedType::default(); n];

    // Phase 1: related types
    for i in 0..n {
        let d = r.descriptor(i);
        if !d.is_virtual() {
            continue;
        }
        if let Some(j) = r.index(d.original_object_type()) {
            push_unique(&mut types[i].related_types, r.name(j));
            push_unique(&mut types[j].related_types, r.name(i));
        }
    }

    // Phase 2: object dependencies, own first then contributed by `extends`
    for i in 0..n {
        types[i].object_dependencies = r.descriptor(i).depends_on().to_vec();
    }
    for a in 0..n {
        for extra in r.descriptor(a).extends() {
            let Some(target) = r.index(&extra.extended_type) else {
                continue;
            };
            if target == a {
                continue;
            }
            types[target].object_dependencies.push(ObjectDependency::new(
                extra.column.clone(),
                r.name(a),
                extra.kind,
            ));
        }
    }

    // Phase 3: flags
    for i in 0..n {
        let d = r.descriptor(i);
        let has_binding_type_dependencies = types[i]
            .object_dependencies
            .iter()
            .any(|dep| dep.kind.is_binding());
        let parent_is_related = d.parent_object_type().is_some_and(|p| {
            d.is_type(p)
                || types[i]
                    .related_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(p))
        });
        let ctx = FlagContext {
            has_binding_type_dependencies,
            parent_is_related,
        };
        types[i].has_binding_type_dependencies = has_binding_type_dependencies;
        types[i].flags = derive_flags(d, &ctx);
    }

    // Phase 4: composites, children and bindings
    for c in 0..n {
        for component in r.descriptor(c).consists_of() {
            if let Some(k) = r.index(component) {
                if types[k].composite_object_type.is_none() {
                    types[k].composite_object_type = Some(r.name(c).to_string());
                }
            }
        }
    }

    for d in 0..n {
        let desc = r.descriptor(d);
        let parent = desc.parent_object_type().and_then(|p| r.index(p));

        if let Some(p) = parent {
            if types[d].flags.is_binding {
                push_unique(&mut types[p].binding_object_types, r.name(d));
            } else if p != d {
                push_unique(&mut types[p].child_object_types, r.name(d));
            }
        }

        if !types[d].flags.is_binding {
            continue;
        }

        // Other sides of the binding: binding-kind dependencies and the site
        let mut others: Vec<usize> = types[d]
            .object_dependencies
            .iter()
            .filter(|dep| dep.kind.is_binding())
            .filter_map(|dep| dep.object_type().and_then(|t| r.index(t)))
            .collect();
        if desc.site_id_column().is_known() {
            if let Some(site) = r.index(&system.site) {
                others.push(site);
            }
        }
        for o in others {
            if Some(o) != parent {
                push_unique(&mut types[o].other_binding_object_types, r.name(d));
            }
        }
    }

    for i in 0..n {
        let site_binding = types[i]
            .binding_object_types
            .iter()
            .chain(types[i].other_binding_object_types.iter())
            .find(|b| r.index(b).is_some_and(|j| types[j].flags.is_site_binding))
            .cloned();
        types[i].site_binding_object_type = site_binding;
    }

    // Reference columns
    for i in 0..n {
        let d = r.descriptor(i);
        let mut columns = Vec::new();
        let declared = [d.parent_id_column(), d.site_id_column(), d.group_id_column()];
        for column in declared
            .into_iter()
            .chain(types[i].object_dependencies.iter().map(|dep| &dep.column))
        {
            if let Some(name) = column.name() {
                push_unique(&mut columns, name);
            }
        }
        types[i].reference_columns = columns;
    }

    // Phase 5: dependents
    for t in 0..n {
        let target = r.descriptor(t);
        let target_name = target.object_type();
        let target_is_site = system.is_site(target_name);
        let target_is_group = system.is_group(target_name);
        let own_composite = types[t].composite_object_type.clone();

        let mut dependents = Vec::new();
        for d in 0..n {
            if d == t {
                continue;
            }
            let source = r.descriptor(d);

            let by_parent = source
                .parent_object_type()
                .is_some_and(|p| p.eq_ignore_ascii_case(target_name));
            let by_site = target_is_site && source.site_id_column().is_known();
            let by_group = target_is_group && source.group_id_column().is_known();
            // Group membership is covered by the group column only
            let by_dependency = !target_is_group
                && types[d]
                    .object_dependencies
                    .iter()
                    .any(|dep| !dep.is_dynamic() && dep.targets(target_name));

            if !(by_parent || by_site || by_group || by_dependency) {
                continue;
            }

            let recorded = match &types[d].composite_object_type {
                Some(composite)
                    if !composite.eq_ignore_ascii_case(target_name)
                        && !own_composite
                            .as_deref()
                            .is_some_and(|own| own.eq_ignore_ascii_case(composite)) =>
                {
                    composite.as_str()
                }
                _ => source.object_type(),
            };
            push_unique(&mut dependents, recorded);
        }
        types[t].dependent_object_types = dependents;
    }

    let graph = build_graph(&r, &types, system);

    debug!(types = n, edges = graph.edge_count(), "derived object type relationships");

    DerivedIndex { types, graph }
}

fn build_graph(r: &Resolver<'_>, types: &[DerivedType], system: &SystemTypes) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for i in 0..r.entries.len() {
        graph.add_type(r.name(i));
    }

    for (i, derived) in types.iter().enumerate() {
        let d = r.descriptor(i);
        let name = d.object_type();

        if let Some(parent) = d.parent_object_type() {
            graph.add_edge(name, parent, EdgeKind::Parent);
        }
        if d.site_id_column().is_known() && !system.is_site(name) {
            graph.add_edge(name, &system.site, EdgeKind::Site);
        }
        if d.group_id_column().is_known() && !system.is_group(name) {
            graph.add_edge(name, &system.group, EdgeKind::Group);
        }
        for dep in &derived.object_dependencies {
            if let DependencyTarget::Static(target) = &dep.target {
                graph.add_edge(name, target, EdgeKind::Dependency(dep.kind));
            }
        }
        for target in d.depends_on_indirectly() {
            graph.add_edge(name, target, EdgeKind::Indirect);
        }
    }

    graph.finish();
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{DependencyKind, ExtraColumn};
    use crate::descriptor::CoreColumns;
    use crate::registry::TypeRegistry;

    fn object(object_type: &str, id: &str) -> TypeDescriptor {
        TypeDescriptor::new(
            None,
            object_type,
            object_type,
            CoreColumns {
                id: Some(id),
                ..Default::default()
            },
        )
    }

    fn derived<'r>(registry: &'r TypeRegistry, object_type: &str) -> &'r DerivedType {
        let index = registry.index_of(object_type).unwrap();
        &registry.derived().unwrap().types[index]
    }

    #[test]
    fn test_extends_contributes_reverse_dependency() {
        let mut registry = TypeRegistry::default();
        registry.register(object("cms.user", "UserID")).unwrap();
        registry
            .register(
                object("ecommerce.customer", "CustomerID").with_extends(ExtraColumn::new(
                    "cms.user",
                    "UserPreferredCustomerID",
                    DependencyKind::NotRequired,
                )),
            )
            .unwrap();
        registry.complete();

        let user = derived(&registry, "cms.user");
        assert_eq!(user.object_dependencies.len(), 1);
        assert_eq!(user.object_dependencies[0].object_type(), Some("ecommerce.customer"));
        assert!(user
            .reference_columns
            .iter()
            .any(|c| c == "UserPreferredCustomerID"));
    }

    #[test]
    fn test_composite_substitution() {
        let mut registry = TypeRegistry::default();
        registry.register(object("cms.user", "UserID")).unwrap();
        registry
            .register(object("cms.usersettings", "UserSettingsID").with_dependency(ObjectDependency::new(
                "UserSettingsUserID",
                "cms.user",
                DependencyKind::Required,
            )))
            .unwrap();
        registry
            .register(object("cms.fulluser", "UserID").with_component("cms.usersettings"))
            .unwrap();
        registry.complete();

        let user = derived(&registry, "cms.user");
        assert_eq!(user.dependent_object_types, vec!["cms.fulluser".to_string()]);
    }

    #[test]
    fn test_dependents_exclude_group_dependencies() {
        let mut registry = TypeRegistry::default();
        registry.register(object("community.group", "GroupID")).unwrap();
        registry
            .register(
                object("cms.role", "RoleID")
                    .with_group_column("RoleGroupID")
                    .with_dependency(ObjectDependency::new(
                        "RoleOwnerGroupID",
                        "community.group",
                        DependencyKind::NotRequired,
                    )),
            )
            .unwrap();
        registry
            .register(object("cms.forum", "ForumID").with_dependency(ObjectDependency::new(
                "ForumGroupID",
                "community.group",
                DependencyKind::Required,
            )))
            .unwrap();
        registry.complete();

        let group = derived(&registry, "community.group");
        assert_eq!(group.dependent_object_types, vec!["cms.role".to_string()]);
    }

    #[test]
    fn test_children_and_bindings_split_by_flag() {
        let mut registry = TypeRegistry::default();
        registry.register(object("cms.role", "RoleID")).unwrap();
        registry
            .register(TypeDescriptor::new(
                None,
                "cms.roleapplication",
                "cms.RoleApplication",
                CoreColumns {
                    parent_id: Some("RoleID"),
                    parent_object_type: Some("cms.role"),
                    ..Default::default()
                },
            ))
            .unwrap();
        registry
            .register(TypeDescriptor::new(
                None,
                "cms.rolesetting",
                "cms.RoleSetting",
                CoreColumns {
                    id: Some("SettingID"),
                    parent_id: Some("RoleID"),
                    parent_object_type: Some("cms.role"),
                    ..Default::default()
                },
            ))
            .unwrap();
        registry.complete();

        let role = derived(&registry, "cms.role");
        assert_eq!(role.binding_object_types, vec!["cms.roleapplication".to_string()]);
        assert_eq!(role.child_object_types, vec!["cms.rolesetting".to_string()]);
        assert!(!derived(&registry, "cms.rolesetting").flags.is_main_object);
    }
}
