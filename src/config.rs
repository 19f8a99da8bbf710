//! Engine configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. built-in defaults
//! 2. an optional TOML file ([`EngineConfig::load`])
//! 3. `RASTERGRAPH_*` environment variables ([`EngineConfig::apply_env`])
//!
//! ```toml
//! disable_tile_cache = false
//! tile_cache_capacity = 1024
//! tile_cache_memory_mb = 256
//! tile_width = 512
//! tile_height = 512
//! ```

use crate::core::error::ConfigError;
use crate::execution::cache::{DEFAULT_CAPACITY, DEFAULT_MEMORY_MB};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Disables the tile cache when set to `1`, `true`, `yes` or `on`.
pub const ENV_DISABLE_TILE_CACHE: &str = "RASTERGRAPH_DISABLE_TILE_CACHE";
/// Maximum number of cached tiles per operator context.
pub const ENV_TILE_CACHE_CAPACITY: &str = "RASTERGRAPH_TILE_CACHE_CAPACITY";
/// Memory budget of each tile cache, in megabytes.
pub const ENV_TILE_CACHE_MEMORY_MB: &str = "RASTERGRAPH_TILE_CACHE_MEMORY_MB";
/// Tile size used for materialization, `N` or `WxH`.
pub const ENV_TILE_SIZE: &str = "RASTERGRAPH_TILE_SIZE";

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recompute every top-level read instead of caching tiles.
    pub disable_tile_cache: bool,
    /// Maximum number of cached tiles per operator context.
    pub tile_cache_capacity: usize,
    /// Memory budget of each tile cache, in megabytes.
    pub tile_cache_memory_mb: usize,
    /// Tile width used for materialization.
    pub tile_width: u32,
    /// Tile height used for materialization.
    pub tile_height: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disable_tile_cache: false,
            tile_cache_capacity: DEFAULT_CAPACITY,
            tile_cache_memory_mb: DEFAULT_MEMORY_MB,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the tile cache.
    pub fn with_tile_cache_disabled(mut self, disabled: bool) -> Self {
        self.disable_tile_cache = disabled;
        self
    }

    /// Set the per-context tile cache capacity.
    pub fn with_tile_cache_capacity(mut self, capacity: usize) -> Self {
        self.tile_cache_capacity = capacity;
        self
    }

    /// Set the per-context tile cache memory budget.
    pub fn with_tile_cache_memory_mb(mut self, mb: usize) -> Self {
        self.tile_cache_memory_mb = mb;
        self
    }

    /// Set the materialization tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded engine configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overlay `RASTERGRAPH_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DISABLE_TILE_CACHE) {
            self.disable_tile_cache = parse_flag(ENV_DISABLE_TILE_CACHE, &value)?;
        }
        if let Some(value) = lookup(ENV_TILE_CACHE_CAPACITY) {
            self.tile_cache_capacity = parse_number(ENV_TILE_CACHE_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_TILE_CACHE_MEMORY_MB) {
            self.tile_cache_memory_mb = parse_number(ENV_TILE_CACHE_MEMORY_MB, &value)?;
        }
        if let Some(value) = lookup(ENV_TILE_SIZE) {
            let (w, h) = match value.trim().split_once(|c: char| c.eq_ignore_ascii_case(&'x')) {
                Some((w, h)) => (parse_number(ENV_TILE_SIZE, w)?, parse_number(ENV_TILE_SIZE, h)?),
                None => {
                    let n = parse_number(ENV_TILE_SIZE, &value)?;
                    (n, n)
                }
            };
            self.tile_width = w;
            self.tile_height = h;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tile_size".to_string(),
                message: "tile dimensions must be positive".to_string(),
            });
        }
        if self.tile_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tile_cache_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a number", value.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("disable_tile_cache = true\ntile_width = 128").unwrap();
        assert!(config.disable_tile_cache);
        assert_eq!(config.tile_width, 128);
        assert_eq!(config.tile_height, DEFAULT_TILE_SIZE);
        assert_eq!(config.tile_cache_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tile_cache_capacity = 16").unwrap();
        writeln!(file, "tile_cache_memory_mb = 8").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.tile_cache_capacity, 16);
        assert_eq!(config.tile_cache_memory_mb, 8);
    }

    #[test]
    fn test_invalid_files() {
        assert!(matches!(
            EngineConfig::from_toml_str("tile_width = \"wide\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("tile_height = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/rastergraph.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_environment_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_DISABLE_TILE_CACHE, "yes"),
            (ENV_TILE_SIZE, "256x64"),
            (ENV_TILE_CACHE_CAPACITY, " 32 "),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(config.disable_tile_cache);
        assert_eq!((config.tile_width, config.tile_height), (256, 64));
        assert_eq!(config.tile_cache_capacity, 32);

        let err = EngineConfig::default()
            .apply_vars(|k| (k == ENV_TILE_CACHE_MEMORY_MB).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TILE_CACHE_MEMORY_MB));
    }
}
