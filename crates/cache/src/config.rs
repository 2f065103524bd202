//! Cache configuration
//!
//! Configuration can be created programmatically or loaded from environment
//! variables. The discarding master switch mirrors the host preference that
//! gates image discarding as a whole: with it off, sweeps are logged no-ops
//! and decoded buffers stay resident regardless of memory pressure.

/// Configuration for the discard cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Master switch for the discard policy. When false, `sweep` does
    /// nothing.
    pub discarding_enabled: bool,
    /// Initial `discardable` flag for newly created records. Individual
    /// records can still be pinned/unpinned afterwards.
    pub discardable_by_default: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            discarding_enabled: true,
            discardable_by_default: true,
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discarding master switch.
    pub fn with_discarding_enabled(mut self, enabled: bool) -> Self {
        self.discarding_enabled = enabled;
        self
    }

    /// Sets the default `discardable` flag for new records.
    pub fn with_discardable_by_default(mut self, discardable: bool) -> Self {
        self.discardable_by_default = discardable;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IMG_VIEWER_DISCARDING_ENABLED`: "true"/"false" or "1"/"0"
    /// - `IMG_VIEWER_DISCARDABLE_DEFAULT`: "true"/"false" or "1"/"0"
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("IMG_VIEWER_DISCARDING_ENABLED") {
            config.discarding_enabled = parse_bool(&val)
                .ok_or_else(|| ConfigError::InvalidValue("IMG_VIEWER_DISCARDING_ENABLED".into()))?;
        }

        if let Ok(val) = std::env::var("IMG_VIEWER_DISCARDABLE_DEFAULT") {
            config.discardable_by_default = parse_bool(&val)
                .ok_or_else(|| ConfigError::InvalidValue("IMG_VIEWER_DISCARDABLE_DEFAULT".into()))?;
        }

        Ok(config)
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Errors from configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value for environment variable: {0}")]
    InvalidValue(String),
}
