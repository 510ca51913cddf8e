use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Top-level engine configuration (parsed from TOML)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealdropConfig {
    pub stream: StreamConfig,
    pub log: LogConfig,
}

/// Buffer sizing for the streaming engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes pulled from a plaintext source per refill (default: 4096)
    pub read_buffer_size: usize,
    /// Bytes pushed into a decrypting stream per write when draining a reader (default: 4096)
    pub write_chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 4096,
            write_chunk_size: 4096,
        }
    }
}

impl StreamConfig {
    /// Reject zero-sized buffers; a zero-length read would be
    /// indistinguishable from end of stream.
    pub fn validate(&self) -> CoreResult<()> {
        if self.read_buffer_size == 0 {
            return Err(CoreError::Config(
                "stream.read_buffer_size must be greater than zero".into(),
            ));
        }
        if self.write_chunk_size == 0 {
            return Err(CoreError::Config(
                "stream.write_chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or `EnvFilter` directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl SealdropConfig {
    /// Parse and validate a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.stream.validate()?;
        Ok(config)
    }
}
