//! Registry Scenarios
//!
//! End-to-end behavior of a registry loaded from the manifests under
//! `tests/fixtures/manifests` plus a few types declared in code.

use std::path::{Path, PathBuf};

use object_types::{
    CoreColumns, DeclarationLinter, DependencyKind, ExtraColumn, ManifestBundle, ObjectDependency, PlanAction,
    RegistryOptions, TypeDescriptor, TypeError, TypeRegistry,
};

fn manifests_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/manifests")
}

fn extensions() -> Vec<String> {
    vec!["toml".to_string(), "json".to_string()]
}

fn fixture_registry() -> TypeRegistry {
    ManifestBundle::load(&manifests_path(), &extensions())
        .unwrap()
        .into_registry(RegistryOptions::default())
        .unwrap()
}

fn object(object_type: &str, id: &str) -> TypeDescriptor {
    TypeDescriptor::new(None, object_type, object_type, CoreColumns {
        id: Some(id),
        ..Default::default()
    })
}

// =============================================================================
// Manifest Loading
// =============================================================================

#[test]
fn test_bundle_loads_toml_and_json_in_name_order() {
    let bundle = ManifestBundle::load(&manifests_path(), &extensions()).unwrap();
    assert_eq!(bundle.files, 2);

    let names: Vec<&str> = bundle.types.iter().map(|t| t.descriptor.object_type()).collect();
    assert_eq!(
        names,
        vec!["cms.site", "cms.user", "cms.role", "cms.userrole", "cms.usersite", "cms.userlist"]
    );

    let again = ManifestBundle::load(&manifests_path(), &extensions()).unwrap();
    assert_eq!(bundle.checksum, again.checksum);
}

#[test]
fn test_fixture_declarations_lint_clean() {
    let registry = fixture_registry();
    let results = DeclarationLinter::new().unwrap().lint_registry(&registry);
    assert!(results.is_empty(), "unexpected findings: {:?}", results);
}

#[test]
fn test_bundle_respects_extension_filter() {
    let bundle = ManifestBundle::load(&manifests_path(), &["json".to_string()]).unwrap();
    assert_eq!(bundle.files, 1);
    assert_eq!(bundle.types[0].descriptor.object_type(), "cms.userlist");
}

// =============================================================================
// Site / Role / UserRole
// =============================================================================

#[test]
fn test_bindings_split_by_site() {
    let registry = fixture_registry();
    let user = registry.get("cms.user").unwrap();
    let user_role = registry.get("cms.userrole").unwrap();
    let user_site = registry.get("cms.usersite").unwrap();

    assert!(user_role.is_binding());
    assert!(!user_role.is_site_binding());
    assert!(user_site.is_binding());
    assert!(user_site.is_site_binding());
    assert!(!user.is_binding());

    assert_eq!(user.binding_object_types(), ["cms.userrole", "cms.usersite"]);
    assert!(user.child_object_types().is_empty());
    assert_eq!(user.site_binding_object_type(), Some("cms.usersite"));

    let site = registry.get("cms.site").unwrap();
    assert_eq!(site.other_binding_object_types(), ["cms.usersite"]);
    let role = registry.get("cms.role").unwrap();
    assert_eq!(role.other_binding_object_types(), ["cms.userrole"]);
}

#[test]
fn test_dependents() {
    let registry = fixture_registry();

    assert_eq!(
        registry.get("cms.site").unwrap().dependent_object_types(),
        ["cms.role", "cms.usersite"]
    );
    assert_eq!(
        registry.get("cms.user").unwrap().dependent_object_types(),
        ["cms.userrole", "cms.usersite"]
    );
    assert_eq!(registry.get("cms.role").unwrap().dependent_object_types(), ["cms.userrole"]);
    assert!(registry.get("cms.userrole").unwrap().dependent_object_types().is_empty());
}

#[test]
fn test_dependency_order_puts_targets_first() {
    let registry = fixture_registry();
    let order = registry.graph().unwrap().dependency_order();
    assert_eq!(order.len(), registry.len());

    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("cms.site") < pos("cms.role"));
    assert!(pos("cms.role") < pos("cms.userrole"));
    assert!(pos("cms.user") < pos("cms.userrole"));
    assert!(pos("cms.user") < pos("cms.usersite"));
    assert!(registry.graph().unwrap().cycles().is_empty());
}

#[test]
fn test_related_types_are_symmetric() {
    let registry = fixture_registry();
    let user = registry.get("cms.user").unwrap();
    let listing = registry.get("CMS.UserList").unwrap();

    assert!(user.is_related_to("cms.userlist"));
    assert!(listing.is_related_to("cms.user"));
    assert_eq!(user.related_object_types(), ["cms.userlist"]);
    assert_eq!(listing.original_type_info(), user);
}

#[test]
fn test_delete_plan_for_user_removes_bindings() {
    let registry = fixture_registry();
    let plan = registry.delete_plan("cms.user").unwrap();

    for binding in ["cms.userrole", "cms.usersite"] {
        let step = plan
            .steps
            .iter()
            .find(|s| s.object_type == binding)
            .unwrap_or_else(|| panic!("no step for {binding}"));
        assert_eq!(step.action, PlanAction::Delete);
        assert_eq!(step.column, "UserID");
    }
}

// =============================================================================
// Binding Where Conditions
// =============================================================================

#[test]
fn test_binding_where_conditions() {
    let registry = fixture_registry();
    let user_role = registry.get("cms.userrole").unwrap();
    let user_site = registry.get("cms.usersite").unwrap();

    let condition = user_role.binding_where_condition(1, "cms.role", 2).unwrap();
    assert_eq!(condition.to_string(), "[UserID] = 1 AND [RoleID] = 2");

    let condition = user_site
        .binding_where_condition_for(&[("cms.user", 4), ("cms.site", 9)])
        .unwrap();
    assert_eq!(condition.to_string(), "[UserID] = 4 AND [SiteID] = 9");
}

#[test]
fn test_missing_binding_column_is_an_error_on_both_paths() {
    let registry = fixture_registry();
    let user_role = registry.get("cms.userrole").unwrap();

    let err = user_role.binding_where_condition(1, "cms.site", 2).unwrap_err();
    assert!(matches!(
        err,
        TypeError::ColumnNotFound { ref object_type, ref binding_type }
            if object_type == "cms.site" && binding_type == "cms.userrole"
    ));

    let err = user_role
        .binding_where_condition_for(&[("cms.user", 1), ("cms.site", 2)])
        .unwrap_err();
    assert!(matches!(err, TypeError::ColumnNotFound { .. }));
}

// =============================================================================
// Presentation
// =============================================================================

#[test]
fn test_default_order_by_fallbacks() {
    let mut registry = TypeRegistry::default();
    registry
        .register_all([
            object("cms.site", "SiteID"),
            object("cms.user", "UserID"),
            object("cms.role", "RoleID"),
            TypeDescriptor::new(None, "cms.userroleonsite", "cms.UserRoleOnSite", CoreColumns {
                parent_id: Some("UserID"),
                parent_object_type: Some("cms.user"),
                site_id: Some("SiteID"),
                ..Default::default()
            })
            .with_dependency(ObjectDependency::new("RoleID", "cms.role", DependencyKind::Binding))
            .with_dependency(ObjectDependency::new("GrantedByID", "cms.user", DependencyKind::NotRequired)),
        ])
        .unwrap();
    registry.complete();

    let binding = registry.get("cms.userroleonsite").unwrap();
    assert_eq!(binding.default_order_by(), "UserID, SiteID, RoleID");
    assert!(binding.has_binding_type_dependencies());
    assert!(!binding.is_site_binding());
    assert!(binding.is_multiple_binding());
    assert_eq!(registry.get("cms.user").unwrap().site_binding_object_type(), None);
    assert_eq!(registry.get("cms.role").unwrap().default_order_by(), "RoleID");
}

#[test]
fn test_extends_adds_dependency_to_extended_type() {
    let mut registry = TypeRegistry::default();
    registry
        .register_all([
            object("cms.user", "UserID"),
            object("cms.avatar", "AvatarID").with_extends(ExtraColumn::new(
                "cms.user",
                "UserAvatarID",
                DependencyKind::NotRequired,
            )),
        ])
        .unwrap();
    registry.complete();

    let user = registry.get("cms.user").unwrap();
    let dep = user
        .object_dependencies()
        .iter()
        .find(|d| d.column.matches("UserAvatarID"))
        .unwrap();
    assert_eq!(dep.object_type(), Some("cms.avatar"));
    assert_eq!(registry.get("cms.avatar").unwrap().dependent_object_types(), ["cms.user"]);
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn test_invalidation_stamps_compare_inclusively() {
    let registry = fixture_registry();
    let user = registry.get("cms.user").unwrap();

    let loaded_at = user.object_invalidated(100);
    let stamp = user.object_invalidated(5);
    assert!(stamp > loaded_at);
    assert!(user.is_object_invalid(5, stamp));
    assert!(user.is_object_invalid(5, loaded_at));
    assert!(!user.is_object_invalid(6, loaded_at));

    let children = user.children_invalidated(5);
    assert!(user.children_invalid(5, children));
    assert!(!user.children_invalid(6, children));

    user.invalidate_all_objects();
    assert!(user.is_object_invalid(6, stamp));
    assert!(user.children_invalid(6, children));

    // Other types are untouched
    assert!(!registry.get("cms.role").unwrap().is_object_invalid(5, loaded_at));
}

#[test]
fn test_type_wide_invalidation_precedes_per_object() {
    let registry = fixture_registry();
    let role = registry.get("cms.role").unwrap();

    let t0 = chrono::Utc::now();
    role.invalidate_all_objects();
    assert!(role.is_object_invalid(42, t0));
    assert!(role.is_object_invalid(8, t0));

    // Any later stamp serves as "valid as of after the type-wide invalidation"
    let t1 = role.children_invalidated(1000);
    role.object_invalidated(7);
    assert!(role.is_object_invalid(7, t1));
    assert!(!role.is_object_invalid(8, t1));
}

// =============================================================================
// Code-Declared Site Scenario
// =============================================================================

#[test]
fn test_site_role_user_role_scenario() {
    let mut options = RegistryOptions::default();
    options.system_types.site = "Site".to_string();

    let mut registry = TypeRegistry::new(options);
    registry
        .register_all([
            object("Site", "SiteID"),
            object("User", "UserID"),
            TypeDescriptor::new(None, "Role", "Role", CoreColumns {
                id: Some("RoleID"),
                site_id: Some("SiteID"),
                ..Default::default()
            }),
            TypeDescriptor::new(None, "UserRole", "UserRole", CoreColumns::default())
                .with_dependency(ObjectDependency::new("RoleID", "Role", DependencyKind::Binding))
                .with_dependency(ObjectDependency::new("UserID", "User", DependencyKind::Binding)),
        ])
        .unwrap();
    registry.complete();

    let role = registry.get("role").unwrap();
    let user_role = registry.get("UserRole").unwrap();
    assert!(role.is_site_object());
    assert!(user_role.is_binding());
    assert!(!user_role.is_site_binding());
    assert!(registry
        .get("Site")
        .unwrap()
        .dependent_object_types()
        .iter()
        .any(|t| t == "Role"));

    let condition = user_role
        .binding_where_condition_for(&[("Role", 3), ("User", 4)])
        .unwrap();
    assert_eq!(condition.to_string(), "[RoleID] = 3 AND [UserID] = 4");
    assert_eq!(user_role.default_order_by(), "RoleID, UserID");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_registration_closed_until_derived_cleared() {
    let mut registry = fixture_registry();
    assert!(registry.is_ready());

    let err = registry.register(object("cms.tag", "TagID")).unwrap_err();
    assert!(matches!(err, TypeError::RegistrySealed { .. }));

    registry.clear_derived();
    registry.register(object("cms.tag", "TagID")).unwrap();
    registry.complete();
    assert!(registry.contains("CMS.Tag"));
    assert_eq!(registry.len(), 7);
}
