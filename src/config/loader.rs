//! Configuration loader with 3-tier precedence
//!
//! Priority order (highest to lowest):
//! 1. User config (~/.config/sdkreg/config.toml or .sdkreg.toml)
//! 2. Embedded layouts (TOML files under layouts/)
//! 3. Built-in defaults (hardcoded for GWT and App Engine)

use crate::config::{get_default_layouts, SdkLayout, Settings, UserConfig};
use crate::types::SdkError;
use include_dir::{include_dir, Dir};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// Embed the layouts directory at compile time
static LAYOUTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/layouts");

/// Namespace used when neither the command line nor the settings name one
pub const DEFAULT_NAMESPACE: &str = "gwt";

pub struct ConfigLoader {
    defaults: HashMap<String, SdkLayout>,
    embedded: HashMap<String, SdkLayout>,
    user_config: Option<UserConfig>,
}

impl ConfigLoader {
    pub fn new() -> Result<Self, SdkError> {
        let user_config = Self::load_user_config()?;
        if user_config.is_some() {
            info!("Loaded user configuration");
        }

        Self::with_user_config(user_config)
    }

    /// Build a loader from an already parsed user config, skipping the
    /// filesystem lookup.
    pub fn with_user_config(user_config: Option<UserConfig>) -> Result<Self, SdkError> {
        let defaults = get_default_layouts();
        info!("Loaded {} built-in SDK layouts", defaults.len());

        let embedded = Self::load_embedded()?;
        info!("Loaded {} embedded SDK layouts", embedded.len());

        Ok(Self {
            defaults,
            embedded,
            user_config,
        })
    }

    fn load_embedded() -> Result<HashMap<String, SdkLayout>, SdkError> {
        let mut layouts = HashMap::new();

        for file in LAYOUTS_DIR.files() {
            let Some(file_name) = file.path().file_name() else {
                continue;
            };
            let file_name_str = file_name.to_string_lossy();

            if !file_name_str.ends_with(".toml") {
                continue;
            }

            let content = file.contents_utf8().ok_or_else(|| {
                SdkError::Config(format!("Invalid UTF-8 in {}", file_name_str))
            })?;

            match toml::from_str::<SdkLayout>(content) {
                Ok(layout) => {
                    debug!("Loaded embedded layout: {}", layout.name);
                    layouts.insert(layout.name.clone(), layout);
                }
                Err(e) => {
                    warn!("Failed to parse layout file {}: {}", file_name_str, e);
                }
            }
        }

        Ok(layouts)
    }

    fn load_user_config() -> Result<Option<UserConfig>, SdkError> {
        // Try multiple locations in priority order:
        // 1. ./.sdkreg.toml (project-specific)
        // 2. $SDKREG_CONFIG (environment variable)
        // 3. ~/.config/sdkreg/config.toml (user-global)

        let mut candidates = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(".sdkreg.toml"));
        }

        if let Ok(config_path) = std::env::var("SDKREG_CONFIG") {
            candidates.push(PathBuf::from(config_path));
        }

        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("sdkreg").join("config.toml"));
        }

        for path in &candidates {
            if path.exists() {
                return Self::read_user_config(path).map(Some);
            }
        }

        debug!("No user config file found");
        Ok(None)
    }

    pub fn read_user_config(path: &Path) -> Result<UserConfig, SdkError> {
        debug!("Loading user config from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SdkError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get a layout by name
    pub fn get_layout(&self, name: &str) -> Result<SdkLayout, SdkError> {
        debug!("Looking up SDK layout: {}", name);

        for (source_name, source) in self.sources() {
            if let Some(layout) = source.get(name) {
                debug!("Found layout '{}' in {}", name, source_name);
                return Ok(layout.clone());
            }
        }

        Err(SdkError::Config(format!("SDK layout '{}' not found", name)))
    }

    /// Get the layout whose containers use the given container id
    pub fn layout_for_container(&self, container_id: &str) -> Result<SdkLayout, SdkError> {
        for (_, source) in self.sources() {
            if let Some(layout) = source.values().find(|l| l.container_id == container_id) {
                return Ok(layout.clone());
            }
        }

        Err(SdkError::Config(format!(
            "No SDK layout uses container id '{}'",
            container_id
        )))
    }

    /// List all available layouts, higher-priority sources shadowing lower ones
    pub fn list_layouts(&self) -> Vec<&SdkLayout> {
        let mut layouts = Vec::new();
        let mut seen = HashSet::new();

        for (_, source) in self.sources() {
            let mut names: Vec<&String> = source.keys().collect();
            names.sort();
            for name in names {
                if seen.insert(name.as_str()) {
                    layouts.push(&source[name]);
                }
            }
        }

        layouts
    }

    pub fn settings(&self) -> Settings {
        self.user_config
            .as_ref()
            .and_then(|c| c.settings.clone())
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> String {
        self.settings()
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    /// Directory holding one sub-directory per registry namespace
    pub fn data_dir(&self) -> Result<PathBuf, SdkError> {
        if let Ok(dir) = std::env::var("SDKREG_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }

        if let Some(dir) = self.settings().data_dir {
            return Ok(dir);
        }

        dirs::data_dir()
            .map(|d| d.join("sdkreg"))
            .ok_or_else(|| SdkError::Config("Cannot determine data directory".to_string()))
    }

    fn sources(&self) -> Vec<(&'static str, &HashMap<String, SdkLayout>)> {
        let mut sources = Vec::with_capacity(3);
        if let Some(user_cfg) = &self.user_config {
            sources.push(("user config", &user_cfg.layouts));
        }
        sources.push(("embedded", &self.embedded));
        sources.push(("defaults", &self.defaults));
        sources
    }
}
