//! sdkreg - registry of installed development kits
//!
//! This crate keeps a per-namespace, persisted collection of kit
//! installations, reports what changed whenever the collection is replaced,
//! and resolves the opaque container paths a build tool stores on its
//! projects into concrete, validated build-path resources.

pub mod classpath;
pub mod config;
pub mod sdk;
pub mod types;

pub use classpath::{BuildProject, ClasspathContainer, ContainerPath, PathResolver};
pub use config::ConfigLoader;
pub use sdk::{Sdk, SdkManager, SdkSet, UpdateEvent};
pub use types::SdkError;
