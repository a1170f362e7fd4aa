//! SDK registry: entries, sets, persistence and change tracking

pub mod codec;
pub mod entry;
pub mod manager;
pub mod set;
pub mod store;

pub use entry::{LayoutSdkFactory, Sdk, SdkFactory, Validation};
pub use manager::{
    diff, is_project_affected, ChangeKind, ListenerId, SdkManager, SdkUpdate, UpdateEvent,
    UpdateListener, UpdateReport,
};
pub use set::SdkSet;
pub use store::{FileStore, MemoryStore, SdkStore};
