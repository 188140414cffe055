// Central configuration loaded from environment variables.
//
// The .env file is loaded automatically at startup via dotenvy. Nothing
// here is secret, just paths and decoding defaults, so every field has
// a usable default.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Decoding defaults and file locations.
pub struct Config {
    /// Path to the serialized topic model (NEUROLEX_MODEL_PATH).
    pub model_path: PathBuf,
    /// Default frequency threshold for feature association
    /// (NEUROLEX_FREQUENCY_THRESHOLD).
    pub frequency_threshold: f64,
    /// Default meta-analysis results map used for correlation decoding
    /// (NEUROLEX_TARGET_IMAGE).
    pub target_image: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn load() -> Result<Self> {
        let frequency_threshold = match env::var("NEUROLEX_FREQUENCY_THRESHOLD") {
            Ok(raw) => raw
                .parse::<f64>()
                .with_context(|| format!("NEUROLEX_FREQUENCY_THRESHOLD is not a number: '{raw}'"))?,
            Err(_) => 0.001,
        };

        Ok(Self {
            model_path: env::var("NEUROLEX_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./topic_model.json")),
            frequency_threshold,
            target_image: env::var("NEUROLEX_TARGET_IMAGE")
                .unwrap_or_else(|_| crate::meta::SPECIFICITY_Z.to_string()),
        })
    }

    /// Check that the topic model file exists.
    /// Call this before any operation that needs a trained model.
    pub fn require_model(&self) -> Result<()> {
        if !self.model_path.exists() {
            anyhow::bail!(
                "Topic model not found at {}\n\
                 Set NEUROLEX_MODEL_PATH or pass --model to point at a trained model.",
                self.model_path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Only meaningful when the variables are unset in the test
        // environment, which is the normal case.
        if env::var("NEUROLEX_FREQUENCY_THRESHOLD").is_err() {
            let config = Config::load().unwrap();
            assert!((config.frequency_threshold - 0.001).abs() < 1e-12);
        }
    }

    #[test]
    fn test_require_model_missing_file() {
        let config = Config {
            model_path: PathBuf::from("/definitely/not/here.json"),
            frequency_threshold: 0.001,
            target_image: "z".to_string(),
        };
        assert!(config.require_model().is_err());
    }
}
