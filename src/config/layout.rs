//! Kit layout types

use serde::{Deserialize, Serialize};

/// Describes what an installation of one kind of kit looks like on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkLayout {
    pub name: String,
    pub description: String,
    /// First segment of the container paths bound to this kind of kit
    pub container_id: String,
    /// Artifacts (relative to the install path) that must exist
    #[serde(default)]
    pub required: Vec<String>,
    /// Build-path libraries, in the order they are handed to the build tool
    #[serde(default)]
    pub libraries: Vec<LibrarySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySpec {
    pub path: String,
    pub sources: Option<String>,
    /// Relative path inside the kit, or an absolute URL
    pub javadoc: Option<String>,
    #[serde(default)]
    pub exported: bool,
}

impl LibrarySpec {
    pub fn binary(path: &str) -> Self {
        Self {
            path: path.to_string(),
            sources: None,
            javadoc: None,
            exported: false,
        }
    }
}
