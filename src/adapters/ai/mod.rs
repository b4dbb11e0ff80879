//! Text Generation Adapters.
//!
//! Implementations of the TextGenerator port.
//!
//! ## Available Adapters
//!
//! - `MockTextGenerator` - Configurable mock for testing
//! - `OpenAiTextGenerator` - OpenAI chat completions

mod mock_generator;
mod openai_generator;

pub use mock_generator::{MockResponse, MockTextGenerator, DEFAULT_MOCK_RESPONSE};
pub use openai_generator::{OpenAiConfig, OpenAiTextGenerator};
