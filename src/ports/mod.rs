//! Ports - Interfaces to external collaborators.
//!
//! # Ports
//!
//! - `TextGenerator` - Prompt-in, text-out generation service
//! - `KeyValueStore` - Best-effort string persistence
//! - `ConnectivityMonitor` - Observable generator reachability

mod connectivity;
mod key_value_store;
mod text_generator;

pub use connectivity::ConnectivityMonitor;
pub use key_value_store::{
    question_records_key, questions_key, KeyValueStore, PersistenceError, ASSUMPTIONS_KEY,
};
pub use text_generator::{GenerationError, ProviderInfo, TextGenerator};
