//! Storage layer for the settings engine
//!
//! Backends implement [`KeyValueBackend`]. The [`StorageAdapter`] sits on
//! top of one of them and adds debounced writes, fail-open reads and raw
//! store snapshots.

pub mod adapter;
pub mod backend;
pub mod bridge;
pub mod fallback;
pub mod file_io;
pub mod local;
pub mod memory;

pub use adapter::{StorageAdapter, StoreSnapshot, SyncHook, DEFAULT_DEBOUNCE, SNAPSHOT_PREFIX};
pub use backend::KeyValueBackend;
pub use bridge::{BridgeBackend, BridgeRequest, BridgeResponse, BridgeTransport};
pub use fallback::FallbackBackend;
pub use file_io::{read_json_or_default, write_json_atomic};
pub use local::LocalFileBackend;
pub use memory::MemoryBackend;
