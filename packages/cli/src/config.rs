use pagecraft_document::{ComponentDefinition, ComponentRegistry};
use pagecraft_editor::EditorConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "pagecraft.config.json";

/// Pagecraft configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory the file store publishes into
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// JSON array of extra component definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<String>,

    #[serde(default)]
    pub editor: EditorConfig,
}

fn default_store_root() -> String {
    ".pagecraft".to_string()
}

impl Config {
    /// Load config from a directory, then apply environment overrides
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        config.editor = config.editor.with_env_overrides();
        Ok(config)
    }

    pub fn get_store_root(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.store_root)
    }

    /// Builtin palette plus any definitions from `components`
    pub fn registry(&self, cwd: &str) -> anyhow::Result<ComponentRegistry> {
        let mut registry = ComponentRegistry::builtin();
        if let Some(path) = &self.components {
            let content = std::fs::read_to_string(PathBuf::from(cwd).join(path))?;
            let definitions: Vec<ComponentDefinition> = serde_json::from_str(&content)?;
            for definition in definitions {
                if registry.register(definition.clone()).is_some() {
                    tracing::warn!(
                        component = %definition.name,
                        "component definition replaced a builtin"
                    );
                }
            }
        }
        Ok(registry)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            components: None,
            editor: EditorConfig::default(),
        }
    }
}
