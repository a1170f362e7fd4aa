//! Registered SDK installations

use crate::classpath::ClasspathEntry;
use crate::config::SdkLayout;
use path_clean::PathClean;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Outcome of checking an installation on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Error(String),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Validation::Ok => None,
            Validation::Error(message) => Some(message),
        }
    }
}

/// One named kit installation.
///
/// Equality (`==`) is value equality: name *and* install path. Use
/// [`Sdk::name_eq`] where only the registry key matters.
#[derive(Debug, Clone)]
pub struct Sdk {
    name: String,
    install_path: PathBuf,
    layout: Arc<SdkLayout>,
}

impl Sdk {
    pub fn new(name: impl Into<String>, install_path: impl Into<PathBuf>, layout: Arc<SdkLayout>) -> Self {
        Self {
            name: name.into(),
            install_path: install_path.into(),
            layout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn layout(&self) -> &SdkLayout {
        &self.layout
    }

    pub fn name_eq(&self, other: &Sdk) -> bool {
        self.name == other.name
    }

    pub fn validate(&self) -> Validation {
        if !self.install_path.is_dir() {
            return Validation::Error(format!(
                "Install path {} does not exist or is not a directory",
                self.install_path.display()
            ));
        }

        for artifact in &self.layout.required {
            if !self.install_path.join(artifact).exists() {
                return Validation::Error(format!(
                    "{} is missing {} (is {} really a {}?)",
                    self.name,
                    artifact,
                    self.install_path.display(),
                    self.layout.description
                ));
            }
        }

        Validation::Ok
    }

    /// Build-path resources for this installation, in layout order.
    pub fn classpath_entries(&self) -> Vec<ClasspathEntry> {
        self.layout
            .libraries
            .iter()
            .map(|lib| ClasspathEntry {
                path: self.install_path.join(&lib.path),
                source_attachment: lib.sources.as_ref().map(|s| self.install_path.join(s)),
                javadoc: lib.javadoc.as_deref().and_then(|j| self.javadoc_url(j)),
                exported: lib.exported,
            })
            .collect()
    }

    fn javadoc_url(&self, location: &str) -> Option<Url> {
        if location.contains("://") {
            return Url::parse(location).ok();
        }
        Url::from_directory_path(self.install_path.join(location)).ok()
    }
}

impl PartialEq for Sdk {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.install_path == other.install_path
    }
}

impl Eq for Sdk {}

impl fmt::Display for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.install_path.display())
    }
}

/// Creates [`Sdk`] values for a registry namespace.
pub trait SdkFactory: Send + Sync {
    fn new_instance(&self, name: &str, install_path: &Path) -> Sdk;
}

impl<F> SdkFactory for F
where
    F: Fn(&str, &Path) -> Sdk + Send + Sync,
{
    fn new_instance(&self, name: &str, install_path: &Path) -> Sdk {
        self(name, install_path)
    }
}

/// Factory binding every SDK it creates to one layout.
#[derive(Debug, Clone)]
pub struct LayoutSdkFactory {
    layout: Arc<SdkLayout>,
}

impl LayoutSdkFactory {
    pub fn new(layout: SdkLayout) -> Self {
        Self {
            layout: Arc::new(layout),
        }
    }

    pub fn layout(&self) -> &SdkLayout {
        &self.layout
    }
}

impl SdkFactory for LayoutSdkFactory {
    fn new_instance(&self, name: &str, install_path: &Path) -> Sdk {
        Sdk::new(name, install_path.clean(), Arc::clone(&self.layout))
    }
}
