//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `ai` - Text generators (OpenAI, mock)
//! - `storage` - Key/value stores (file, in-memory)
//! - `connectivity` - Reachability monitors

pub mod ai;
pub mod connectivity;
pub mod storage;

pub use ai::{MockTextGenerator, OpenAiConfig, OpenAiTextGenerator};
pub use connectivity::WatchConnectivity;
pub use storage::{FileKeyValueStore, InMemoryKeyValueStore};
