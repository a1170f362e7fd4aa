//! User configuration file parsing

use crate::config::layout::SdkLayout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    pub settings: Option<Settings>,
    #[serde(default)]
    pub layouts: HashMap<String, SdkLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub namespace: Option<String>,
    pub log_level: Option<String>,
}
