//! Configuration management for the object type registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (object-types.toml)
//! - Environment variables (OBJECT_TYPES__*)
//!
//! ## Example config file (object-types.toml):
//! ```toml
//! [system_types]
//! site = "cms.site"
//! group = "community.group"
//! metafile = "cms.metafile"
//! workflow_trigger = "cms.objectworkflowtrigger"
//!
//! [registry]
//! strict = true
//!
//! [manifests]
//! path = "./types"
//! extensions = ["toml", "json"]
//!
//! [invalidation]
//! broadcast = true
//!
//! [lint]
//! column_pattern = "^[A-Za-z_][A-Za-z0-9_]*$"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTypesConfig {
    /// Names of the types with special meaning to the derivation rules
    #[serde(default)]
    pub system_types: SystemTypes,

    /// Registration settings
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Manifest loading settings
    #[serde(default)]
    pub manifests: ManifestConfig,

    /// Invalidation settings
    #[serde(default)]
    pub invalidation: InvalidationConfig,

    /// Declaration lint settings
    #[serde(default)]
    pub lint: LintConfig,
}

/// Object type names the derivation rules treat specially
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTypes {
    #[serde(default = "default_site_type")]
    pub site: String,
    #[serde(default = "default_group_type")]
    pub group: String,
    /// Attachments; dynamic references from it require `has_metafiles`
    #[serde(default = "default_metafile_type")]
    pub metafile: String,
    /// Workflow triggers; dynamic references from it require `is_trigger_target`
    #[serde(default = "default_workflow_trigger_type")]
    pub workflow_trigger: String,
}

/// Registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Reject duplicate registrations instead of skipping them with a warning
    #[serde(default = "default_true")]
    pub strict: bool,
}

/// Manifest loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Directory holding type manifests
    #[serde(default = "default_manifest_path")]
    pub path: PathBuf,

    /// File extensions considered manifests
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// Invalidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationConfig {
    /// Broadcast local invalidations to cooperating processes
    #[serde(default = "default_true")]
    pub broadcast: bool,
}

/// Declaration lint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfig {
    /// Regex every declared column name must match
    #[serde(default = "default_column_pattern")]
    pub column_pattern: String,
}

/// The subset of configuration the registry itself consumes
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub system_types: SystemTypes,
    pub strict: bool,
    pub broadcast: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        ObjectTypesConfig::default().registry_options()
    }
}

// Default value functions
fn default_site_type() -> String {
    "cms.site".to_string()
}

fn default_group_type() -> String {
    "community.group".to_string()
}

fn default_metafile_type() -> String {
    "cms.metafile".to_string()
}

fn default_workflow_trigger_type() -> String {
    "cms.objectworkflowtrigger".to_string()
}

fn default_true() -> bool {
    true
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("types")
}

fn default_extensions() -> Vec<String> {
    vec!["toml".to_string(), "json".to_string()]
}

fn default_column_pattern() -> String {
    crate::lint::DEFAULT_COLUMN_PATTERN.to_string()
}

impl Default for SystemTypes {
    fn default() -> Self {
        Self {
            site: default_site_type(),
            group: default_group_type(),
            metafile: default_metafile_type(),
            workflow_trigger: default_workflow_trigger_type(),
        }
    }
}

impl SystemTypes {
    pub fn is_site(&self, object_type: &str) -> bool {
        self.site.eq_ignore_ascii_case(object_type)
    }

    pub fn is_group(&self, object_type: &str) -> bool {
        self.group.eq_ignore_ascii_case(object_type)
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: default_manifest_path(),
            extensions: default_extensions(),
        }
    }
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self { broadcast: true }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            column_pattern: default_column_pattern(),
        }
    }
}

impl ObjectTypesConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "object-types.toml",
            ".object-types.toml",
            "config/object-types.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "object-types") {
            let xdg_config = config_dir.config_dir().join("object-types.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // OBJECT_TYPES__REGISTRY__STRICT=false
        builder = builder.add_source(
            Environment::with_prefix("OBJECT_TYPES")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the manifest directory (resolves relative paths)
    pub fn manifest_path(&self) -> PathBuf {
        if self.manifests.path.is_absolute() {
            self.manifests.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.manifests.path)
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            system_types: self.system_types.clone(),
            strict: self.registry.strict,
            broadcast: self.invalidation.broadcast,
        }
    }
}
