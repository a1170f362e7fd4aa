//! Container path parsing
//!
//! A container path has the form `containerId[/sdkName[/vNN]]`. A bare
//! container id, or one followed directly by a legacy version qualifier
//! such as `v7`, means "whatever the registry's default SDK is".

use crate::types::SdkError;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

static VERSION_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v[0-9]{1,2}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerPath {
    container_id: String,
    sdk_segment: Option<String>,
    qualifier: Option<String>,
}

/// What a container path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind<'a> {
    Default,
    Named(&'a str),
}

impl ContainerPath {
    pub fn parse(path: &str) -> Result<Self, SdkError> {
        let trimmed = path.trim().trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();

        if segments.iter().any(|s| s.is_empty()) {
            return Err(SdkError::Resolution(format!(
                "empty segment in container path '{}'",
                path
            )));
        }
        if segments.len() > 3 {
            return Err(SdkError::Resolution(format!(
                "too many segments in container path '{}'",
                path
            )));
        }

        Ok(Self {
            container_id: segments[0].to_string(),
            sdk_segment: segments.get(1).map(|s| s.to_string()),
            qualifier: segments.get(2).map(|s| s.to_string()),
        })
    }

    pub fn default_for(container_id: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
            sdk_segment: None,
            qualifier: None,
        }
    }

    pub fn named(container_id: &str, sdk_name: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
            sdk_segment: Some(sdk_name.to_string()),
            qualifier: None,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn kind(&self) -> PathKind<'_> {
        match self.sdk_segment.as_deref() {
            None => PathKind::Default,
            Some(segment) if is_version_qualifier(segment) => PathKind::Default,
            Some(name) => PathKind::Named(name),
        }
    }

    pub fn is_default(&self) -> bool {
        self.kind() == PathKind::Default
    }

    /// Name of the SDK this path is pinned to, if any.
    pub fn sdk_name(&self) -> Option<&str> {
        match self.kind() {
            PathKind::Default => None,
            PathKind::Named(name) => Some(name),
        }
    }
}

pub fn is_version_qualifier(segment: &str) -> bool {
    VERSION_QUALIFIER.is_match(segment)
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.container_id)?;
        for segment in [&self.sdk_segment, &self.qualifier].into_iter().flatten() {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ContainerPath {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContainerPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
