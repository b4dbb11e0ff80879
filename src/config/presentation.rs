//! Presentation pacing

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_FADE_OUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct PresentationConfig {
    /// Delay between a question starting to fade and its removal
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
}

impl PresentationConfig {
    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fade_out_ms > MAX_FADE_OUT_MS {
            return Err(ValidationError::FadeOutTooLong {
                max_ms: MAX_FADE_OUT_MS,
            });
        }
        Ok(())
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            fade_out_ms: default_fade_out_ms(),
        }
    }
}

fn default_fade_out_ms() -> u64 {
    1000
}
