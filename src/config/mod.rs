//! Configuration system for sdkreg
//!
//! Provides a 3-tier layout hierarchy:
//! 1. User config (highest priority)
//! 2. Embedded layouts (medium priority)
//! 3. Built-in defaults (lowest priority)

mod defaults;
mod layout;
mod loader;
mod user_config;

pub use defaults::get_default_layouts;
pub use layout::{LibrarySpec, SdkLayout};
pub use loader::{ConfigLoader, DEFAULT_NAMESPACE};
pub use user_config::{Settings, UserConfig};
