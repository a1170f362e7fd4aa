//! Resolved build-path containers handed to the build tool

use crate::classpath::ContainerPath;
use serde::Serialize;
use std::path::PathBuf;
use url::Url;

/// One concrete build-path resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClasspathEntry {
    pub path: PathBuf,
    pub source_attachment: Option<PathBuf>,
    pub javadoc: Option<Url>,
    pub exported: bool,
}

impl ClasspathEntry {
    pub fn library(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_attachment: None,
            javadoc: None,
            exported: false,
        }
    }

    /// Fill attachments this entry lacks from `hint`, which must point at
    /// the same binary. Never touches the path or export flag.
    pub fn merge_attachments(&mut self, hint: &ClasspathEntry) {
        if self.path != hint.path {
            return;
        }
        if self.source_attachment.is_none() {
            self.source_attachment = hint.source_attachment.clone();
        }
        if self.javadoc.is_none() {
            self.javadoc = hint.javadoc.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message")]
pub enum ContainerStatus {
    Resolved,
    Broken(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClasspathContainer {
    pub path: ContainerPath,
    pub description: String,
    pub entries: Vec<ClasspathEntry>,
    pub status: ContainerStatus,
}

impl ClasspathContainer {
    pub fn resolved(path: ContainerPath, description: String, entries: Vec<ClasspathEntry>) -> Self {
        Self {
            path,
            description,
            entries,
            status: ContainerStatus::Resolved,
        }
    }

    /// An empty container that surfaces `message` as a build-path problem.
    pub fn broken(path: ContainerPath, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            description: format!("{} (unresolved)", path),
            path,
            entries: Vec::new(),
            status: ContainerStatus::Broken(message),
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.status, ContainerStatus::Broken(_))
    }

    pub fn problem(&self) -> Option<&str> {
        match &self.status {
            ContainerStatus::Resolved => None,
            ContainerStatus::Broken(message) => Some(message),
        }
    }
}
