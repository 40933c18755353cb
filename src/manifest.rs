//! Type Manifest Loading
//!
//! Object types can be declared in TOML or JSON manifest files instead of
//! code. A manifest file holds a `types` array; a directory of manifests is
//! walked in file-name order and hashed into one bundle checksum.
//!
//! ```toml
//! [[types]]
//! object_type = "cms.userrole"
//! class_name = "cms.UserRole"
//! parent_object_type = "cms.user"
//!
//! [types.columns]
//! parent_id = "UserID"
//! site_id = "SiteID"
//!
//! [[types.depends_on]]
//! column = "RoleID"
//! object_type = "cms.role"
//! kind = "binding"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::checksum::Checksum;
use crate::config::{ObjectTypesConfig, RegistryOptions};
use crate::dependency::{DependencyKind, ExtraColumn, ObjectDependency};
use crate::descriptor::{CoreColumns, ExportSettings, FeatureColumns, SynchronizationSettings, TypeDescriptor};
use crate::error::{Result, TypeError};
use crate::flags::FlagOverrides;
use crate::registry::TypeRegistry;

/// Contents of one manifest file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub types: Vec<TypeManifest>,
}

/// Core columns as written in a manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestColumns {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub guid: Option<String>,
    pub code_name: Option<String>,
    pub display_name: Option<String>,
    pub binary: Option<String>,
    pub site_id: Option<String>,
    pub parent_id: Option<String>,
}

/// A dependency with either a fixed target type or a type column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_column: Option<String>,
    #[serde(default)]
    pub kind: DependencyKind,
}

/// One object type as written in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeManifest {
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_object_type: Option<String>,
    #[serde(default)]
    pub columns: ManifestColumns,
    #[serde(default)]
    pub features: FeatureColumns,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ManifestDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<ExtraColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consists_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on_indirectly: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_object_type: Option<String>,
    #[serde(default)]
    pub flags: FlagOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization: Option<SynchronizationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportSettings>,
    #[serde(default)]
    pub supports_global_objects: bool,
    #[serde(default)]
    pub has_metafiles: bool,
    #[serde(default)]
    pub is_trigger_target: bool,
    #[serde(default)]
    pub dynamic_dependency_source: bool,
}

impl TypeManifest {
    /// Build the descriptor; `path` only labels errors
    pub fn into_descriptor(self, path: &Path) -> Result<TypeDescriptor> {
        let invalid = |message: String| TypeError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };

        if self.object_type.trim().is_empty() {
            return Err(invalid("object_type must not be empty".to_string()));
        }

        let c = &self.columns;
        let class_name = self.class_name.clone().unwrap_or_else(|| self.object_type.clone());
        let mut descriptor = TypeDescriptor::new(
            self.provider.as_deref(),
            self.object_type.clone(),
            class_name,
            CoreColumns {
                id: c.id.as_deref(),
                timestamp: c.timestamp.as_deref(),
                guid: c.guid.as_deref(),
                code_name: c.code_name.as_deref(),
                display_name: c.display_name.as_deref(),
                binary: c.binary.as_deref(),
                site_id: c.site_id.as_deref(),
                parent_id: c.parent_id.as_deref(),
                parent_object_type: self.parent_object_type.as_deref(),
            },
        )
        .with_features(self.features.clone());

        if let Some(original) = self.original_object_type {
            descriptor = descriptor.with_original_object_type(original);
        }
        if let Some(category_type) = self.category_object_type {
            let column = self.features.category.clone();
            descriptor = descriptor.with_category(column, category_type);
        }

        for (i, dep) in self.depends_on.into_iter().enumerate() {
            let dependency = match (dep.object_type, dep.type_column) {
                (Some(object_type), None) => ObjectDependency::new(dep.column.as_str(), object_type, dep.kind),
                (None, Some(type_column)) => {
                    ObjectDependency::dynamic(dep.column.as_str(), type_column.as_str(), dep.kind)
                }
                _ => {
                    return Err(invalid(format!(
                        "{}: depends_on[{}] needs exactly one of object_type or type_column",
                        self.object_type, i
                    )))
                }
            };
            descriptor = descriptor.with_dependency(dependency);
        }

        for extra in self.extends {
            descriptor = descriptor.with_extends(extra);
        }
        for component in self.consists_of {
            descriptor = descriptor.with_component(component);
        }
        for target in self.depends_on_indirectly {
            descriptor = descriptor.with_indirect_dependency(target);
        }
        if let Some(sync) = self.synchronization {
            descriptor = descriptor.with_synchronization(sync);
        }
        if let Some(export) = self.export {
            descriptor = descriptor.with_export(export);
        }

        Ok(descriptor
            .with_overrides(self.flags)
            .with_global_objects(self.supports_global_objects)
            .with_metafiles(self.has_metafiles)
            .with_trigger_target(self.is_trigger_target)
            .with_dynamic_dependency_source(self.dynamic_dependency_source))
    }
}

/// Manifest encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(ManifestFormat::Toml),
            "json" => Some(ManifestFormat::Json),
            _ => None,
        }
    }
}

/// Parse manifest content
pub fn parse_manifest(content: &str, format: ManifestFormat) -> Result<ManifestFile> {
    Ok(match format {
        ManifestFormat::Toml => toml::from_str(content)?,
        ManifestFormat::Json => serde_json::from_str(content)?,
    })
}

/// A type read from disk
#[derive(Debug, Clone)]
pub struct LoadedType {
    pub path: PathBuf,
    pub descriptor: TypeDescriptor,
    /// Checksum of the manifest entry in canonical JSON
    pub checksum: Checksum,
}

/// Every type found under a manifest directory
#[derive(Debug, Clone)]
pub struct ManifestBundle {
    pub types: Vec<LoadedType>,
    pub files: usize,
    /// Over all manifest files in load order
    pub checksum: Checksum,
}

impl ManifestBundle {
    /// Load every manifest under `dir` whose extension is in `extensions`
    pub fn load(dir: &Path, extensions: &[String]) -> Result<Self> {
        let mut types = Vec::new();
        let mut contents: Vec<Vec<u8>> = Vec::new();

        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let accepted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
            if !accepted {
                continue;
            }
            let Some(format) = ManifestFormat::from_path(path) else {
                continue;
            };

            let content = fs::read_to_string(path)?;
            let file = parse_manifest(&content, format).map_err(|e| TypeError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

            debug!(path = %path.display(), types = file.types.len(), "loaded manifest");

            for manifest in file.types {
                let checksum = Checksum::from_json(&serde_json::to_value(&manifest)?);
                types.push(LoadedType {
                    path: path.to_path_buf(),
                    descriptor: manifest.into_descriptor(path)?,
                    checksum,
                });
            }
            contents.push(content.into_bytes());
        }

        let checksum = Checksum::from_parts(contents.iter().map(Vec::as_slice));
        info!(
            dir = %dir.display(),
            files = contents.len(),
            types = types.len(),
            checksum = %checksum.short(),
            "manifests loaded"
        );

        Ok(Self {
            types,
            files: contents.len(),
            checksum,
        })
    }

    /// Register every loaded type and complete the registry
    pub fn into_registry(self, options: RegistryOptions) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::new(options);
        registry.register_all(self.types.into_iter().map(|t| t.descriptor))?;
        registry.complete();
        Ok(registry)
    }
}

/// Load the configured manifest directory into a completed registry
pub fn load_registry(config: &ObjectTypesConfig) -> Result<(TypeRegistry, Checksum)> {
    let bundle = ManifestBundle::load(&config.manifest_path(), &config.manifests.extensions)?;
    let checksum = bundle.checksum.clone();
    let registry = bundle.into_registry(config.registry_options())?;
    Ok((registry, checksum))
}
