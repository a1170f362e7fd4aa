//! Build-path containers: path parsing, resolution and library mirroring

pub mod container;
pub mod mirror;
pub mod path;
pub mod resolver;

pub use container::{ClasspathContainer, ClasspathEntry, ContainerStatus};
pub use mirror::{MirrorJobs, MirrorOutcome, MirrorScheduler};
pub use path::{ContainerPath, PathKind};
pub use resolver::{BuildProject, PathResolver};
