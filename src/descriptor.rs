//! Declared object type metadata
//!
//! A [`TypeDescriptor`] holds only what the owning module declares: the object
//! type key, column pointers, relationship declarations and flag overrides.
//! Anything that needs the rest of the registry lives on [`crate::TypeInfo`].

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::dependency::{ExtraColumn, ObjectDependency};
use crate::flags::{Flag, FlagOverrides};

/// How changes of a type are logged for synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogMode {
    #[default]
    None,
    /// Changes are logged as tasks of this type
    LogSynchronization,
    /// Changes touch the parent, which is logged instead
    TouchParent,
}

/// How a child's data travels inside its parent's data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeToParent {
    #[default]
    None,
    Complete,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SynchronizationSettings {
    #[serde(default)]
    pub log: SyncLogMode,
    #[serde(default)]
    pub include_to_parent: IncludeToParent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Exported as part of the parent object
    #[serde(default)]
    pub include_to_parent: bool,
    /// Can be exported on its own
    #[serde(default)]
    pub allow_single_export: bool,
}

/// Core columns accepted at construction. `None` and empty strings become
/// [`Column::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreColumns<'a> {
    pub id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub guid: Option<&'a str>,
    pub code_name: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub binary: Option<&'a str>,
    pub site_id: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub parent_object_type: Option<&'a str>,
}

/// Optional feature columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumns {
    #[serde(default)]
    pub group: Column,
    #[serde(default)]
    pub order: Column,
    #[serde(default)]
    pub enabled: Column,
    #[serde(default)]
    pub thumbnail_guid: Column,
    #[serde(default)]
    pub icon_guid: Column,
    #[serde(default)]
    pub object_path: Column,
    #[serde(default)]
    pub object_name_path: Column,
    #[serde(default)]
    pub object_level: Column,
    #[serde(default)]
    pub search_content: Column,
    #[serde(default)]
    pub is_customized: Column,
    #[serde(default)]
    pub category: Column,
}

/// One registered object type, as declared
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    provider: Option<String>,
    object_type: String,
    class_name: String,
    original_object_type: Option<String>,

    id_column: Column,
    timestamp_column: Column,
    guid_column: Column,
    code_name_column: Column,
    display_name_column: Column,
    binary_column: Column,
    site_id_column: Column,
    parent_id_column: Column,
    parent_object_type: Option<String>,
    features: FeatureColumns,

    depends_on: Vec<ObjectDependency>,
    extends: Vec<ExtraColumn>,
    consists_of: Vec<String>,
    depends_on_indirectly: Vec<String>,
    category_object_type: Option<String>,

    overrides: FlagOverrides,
    synchronization: SynchronizationSettings,
    export: ExportSettings,
    supports_global_objects: bool,
    has_metafiles: bool,
    is_trigger_target: bool,
    dynamic_dependency_source: bool,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl TypeDescriptor {
    /// Create a descriptor. Supplying a parent type makes changes touch the
    /// parent and makes the data travel with the parent on sync and export.
    pub fn new(
        provider: Option<&str>,
        object_type: impl Into<String>,
        class_name: impl Into<String>,
        columns: CoreColumns<'_>,
    ) -> Self {
        let parent_object_type = non_empty(columns.parent_object_type);

        let (synchronization, export) = if parent_object_type.is_some() {
            (
                SynchronizationSettings {
                    log: SyncLogMode::TouchParent,
                    include_to_parent: IncludeToParent::Complete,
                },
                ExportSettings {
                    include_to_parent: true,
                    allow_single_export: false,
                },
            )
        } else {
            (SynchronizationSettings::default(), ExportSettings::default())
        };

        Self {
            provider: non_empty(provider),
            object_type: object_type.into(),
            class_name: class_name.into(),
            original_object_type: None,
            id_column: Column::new(columns.id),
            timestamp_column: Column::new(columns.timestamp),
            guid_column: Column::new(columns.guid),
            code_name_column: Column::new(columns.code_name),
            display_name_column: Column::new(columns.display_name),
            binary_column: Column::new(columns.binary),
            site_id_column: Column::new(columns.site_id),
            parent_id_column: Column::new(columns.parent_id),
            parent_object_type,
            features: FeatureColumns::default(),
            depends_on: Vec::new(),
            extends: Vec::new(),
            consists_of: Vec::new(),
            depends_on_indirectly: Vec::new(),
            category_object_type: None,
            overrides: FlagOverrides::default(),
            synchronization,
            export,
            supports_global_objects: false,
            has_metafiles: false,
            is_trigger_target: false,
            dynamic_dependency_source: false,
        }
    }

    // ========== Builders ==========

    /// Mark this type as a virtual/listing view over `original`
    pub fn with_original_object_type(mut self, original: impl Into<String>) -> Self {
        self.original_object_type = non_empty(Some(&original.into()));
        self
    }

    /// Set the raw parent column, without touching the parent type
    pub fn with_parent_id_column(mut self, column: impl Into<Column>) -> Self {
        self.parent_id_column = column.into();
        self
    }

    pub fn with_features(mut self, features: FeatureColumns) -> Self {
        self.features = features;
        self
    }

    pub fn with_group_column(mut self, column: impl Into<Column>) -> Self {
        self.features.group = column.into();
        self
    }

    pub fn with_order_column(mut self, column: impl Into<Column>) -> Self {
        self.features.order = column.into();
        self
    }

    pub fn with_enabled_column(mut self, column: impl Into<Column>) -> Self {
        self.features.enabled = column.into();
        self
    }

    pub fn with_dependency(mut self, dependency: ObjectDependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn with_extends(mut self, extra: ExtraColumn) -> Self {
        self.extends.push(extra);
        self
    }

    /// Declare `component` as a part of this composite type
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.consists_of.push(component.into());
        self
    }

    pub fn with_indirect_dependency(mut self, object_type: impl Into<String>) -> Self {
        self.depends_on_indirectly.push(object_type.into());
        self
    }

    pub fn with_category(mut self, column: impl Into<Column>, object_type: impl Into<String>) -> Self {
        self.features.category = column.into();
        self.category_object_type = non_empty(Some(&object_type.into()));
        self
    }

    pub fn with_flag(mut self, flag: Flag, value: bool) -> Self {
        self.overrides.set(flag, value);
        self
    }

    pub fn with_overrides(mut self, overrides: FlagOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_synchronization_log(mut self, log: SyncLogMode) -> Self {
        self.synchronization.log = log;
        self
    }

    pub fn with_synchronization(mut self, settings: SynchronizationSettings) -> Self {
        self.synchronization = settings;
        self
    }

    pub fn with_export(mut self, settings: ExportSettings) -> Self {
        self.export = settings;
        self
    }

    pub fn with_global_objects(mut self, supported: bool) -> Self {
        self.supports_global_objects = supported;
        self
    }

    pub fn with_metafiles(mut self, has_metafiles: bool) -> Self {
        self.has_metafiles = has_metafiles;
        self
    }

    pub fn with_trigger_target(mut self, is_target: bool) -> Self {
        self.is_trigger_target = is_target;
        self
    }

    /// Opt this type's dynamic dependencies into dependency references
    pub fn with_dynamic_dependency_source(mut self, enabled: bool) -> Self {
        self.dynamic_dependency_source = enabled;
        self
    }

    // ========== Identity ==========

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The real underlying type; the type itself for non-virtual types
    pub fn original_object_type(&self) -> &str {
        self.original_object_type.as_deref().unwrap_or(&self.object_type)
    }

    /// Virtual/listing type over another type
    pub fn is_virtual(&self) -> bool {
        self.original_object_type
            .as_deref()
            .is_some_and(|o| !o.eq_ignore_ascii_case(&self.object_type))
    }

    /// Case-insensitive type name comparison
    pub fn is_type(&self, object_type: &str) -> bool {
        self.object_type.eq_ignore_ascii_case(object_type)
    }

    // ========== Columns ==========

    pub fn id_column(&self) -> &Column {
        &self.id_column
    }

    pub fn timestamp_column(&self) -> &Column {
        &self.timestamp_column
    }

    pub fn guid_column(&self) -> &Column {
        &self.guid_column
    }

    pub fn code_name_column(&self) -> &Column {
        &self.code_name_column
    }

    pub fn display_name_column(&self) -> &Column {
        &self.display_name_column
    }

    pub fn binary_column(&self) -> &Column {
        &self.binary_column
    }

    pub fn site_id_column(&self) -> &Column {
        &self.site_id_column
    }

    /// Parent column; unknown whenever no parent type is declared
    pub fn parent_id_column(&self) -> &Column {
        if self.parent_object_type.is_none() {
            return &crate::column::UNKNOWN;
        }
        &self.parent_id_column
    }

    /// Parent column as stored, ignoring the parent type
    pub fn raw_parent_id_column(&self) -> &Column {
        &self.parent_id_column
    }

    pub fn parent_object_type(&self) -> Option<&str> {
        self.parent_object_type.as_deref()
    }

    pub fn group_id_column(&self) -> &Column {
        &self.features.group
    }

    pub fn order_column(&self) -> &Column {
        &self.features.order
    }

    pub fn enabled_column(&self) -> &Column {
        &self.features.enabled
    }

    pub fn features(&self) -> &FeatureColumns {
        &self.features
    }

    /// Every declared column name, sentinel-free
    pub fn known_columns(&self) -> Vec<&str> {
        let f = &self.features;
        [
            &self.id_column,
            &self.timestamp_column,
            &self.guid_column,
            &self.code_name_column,
            &self.display_name_column,
            &self.binary_column,
            &self.site_id_column,
            self.parent_id_column(),
            &f.group,
            &f.order,
            &f.enabled,
            &f.thumbnail_guid,
            &f.icon_guid,
            &f.object_path,
            &f.object_name_path,
            &f.object_level,
            &f.search_content,
            &f.is_customized,
            &f.category,
        ]
        .into_iter()
        .chain(self.depends_on.iter().map(|d| &d.column))
        .filter_map(Column::name)
        .collect()
    }

    // ========== Relationships ==========

    pub fn depends_on(&self) -> &[ObjectDependency] {
        &self.depends_on
    }

    pub fn extends(&self) -> &[ExtraColumn] {
        &self.extends
    }

    pub fn consists_of(&self) -> &[String] {
        &self.consists_of
    }

    pub fn depends_on_indirectly(&self) -> &[String] {
        &self.depends_on_indirectly
    }

    pub fn category_object_type(&self) -> Option<&str> {
        self.category_object_type.as_deref()
    }

    // ========== Behavior ==========

    pub fn overrides(&self) -> &FlagOverrides {
        &self.overrides
    }

    pub fn synchronization(&self) -> &SynchronizationSettings {
        &self.synchronization
    }

    pub fn export(&self) -> &ExportSettings {
        &self.export
    }

    pub fn supports_global_objects(&self) -> bool {
        self.supports_global_objects
    }

    pub fn has_metafiles(&self) -> bool {
        self.has_metafiles
    }

    pub fn is_trigger_target(&self) -> bool {
        self.is_trigger_target
    }

    pub fn is_dynamic_dependency_source(&self) -> bool {
        self.dynamic_dependency_source
    }
}
