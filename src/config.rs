//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables (or a `.env` file)
//! with development defaults. The only required value is the shared secret.
//!
//! # Security Configuration
//!
//! - `WANNABE_SECRET`: Shared secret callers must present in `WannabeToken` (required)
//!
//! # Address Synthesis
//!
//! - `SYNTH_BASE_ADDRESS`: Base of the synthesized client range (default: `70.0.0.0`)
//! - `SYNTH_MASK_BITS`: Mask length of that range (default: 4)
//!
//! # Upstream
//!
//! - `UPSTREAM_TIMEOUT_SECS`: Deadline for the upstream response head (default: 30, 0 = none)
//! - `UPSTREAM_CONNECT_TIMEOUT_SECS`: TCP/TLS connect deadline (default: 10)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};
use crate::proxy::AddressPool;
use crate::proxy::address::{DEFAULT_BASE_ADDRESS, DEFAULT_MASK_BITS};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8787)
    pub port: u16,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Shared secret expected in the `WannabeToken` header
    pub secret: String,

    // =========================================================================
    // Address Synthesis Configuration
    // =========================================================================
    /// Base address of the synthesized client range (default: "70.0.0.0")
    pub synth_base_address: String,

    /// Mask length of the synthesized client range (default: 4)
    pub synth_mask_bits: u8,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Deadline for the upstream response head; zero disables it
    pub upstream_timeout: Duration,

    /// Deadline for establishing the upstream connection
    pub upstream_connect_timeout: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log output format (default: pretty)
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("synth_base_address", &self.synth_base_address)
            .field("synth_mask_bits", &self.synth_mask_bits)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("upstream_connect_timeout", &self.upstream_connect_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Reads the process environment only; load a `.env` file first (as the
    /// binary does) if one should apply.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if `WANNABE_SECRET` is missing or any
    /// value is invalid (e.g., non-numeric PORT, malformed base address).
    pub fn from_env() -> ProxyResult<Self> {
        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8787)?,

            // Security
            secret: env::var("WANNABE_SECRET").unwrap_or_default(),

            // Address synthesis
            synth_base_address: env::var("SYNTH_BASE_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BASE_ADDRESS.to_string()),
            synth_mask_bits: Self::parse_env("SYNTH_MASK_BITS", DEFAULT_MASK_BITS)?,

            // Upstream
            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),
            upstream_connect_timeout: Duration::from_secs(Self::parse_env(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                10,
            )?),

            // Observability
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::default())?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if validation fails.
    pub fn validate(&self) -> ProxyResult<()> {
        if self.secret.is_empty() {
            return Err(ProxyError::Config(
                "WANNABE_SECRET must be set to a non-empty value".to_string(),
            ));
        }

        if self.synth_mask_bits > 32 {
            return Err(ProxyError::Config(format!(
                "SYNTH_MASK_BITS ({}) must be between 0 and 32",
                self.synth_mask_bits
            )));
        }

        self.address_pool()?;

        if self.upstream_connect_timeout.is_zero() {
            return Err(ProxyError::Config(
                "UPSTREAM_CONNECT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upstream response deadline, `None` when disabled.
    pub fn upstream_timeout(&self) -> Option<Duration> {
        (!self.upstream_timeout.is_zero()).then_some(self.upstream_timeout)
    }

    /// Build the synthesized client address pool.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the base address is not a dotted quad.
    pub fn address_pool(&self) -> ProxyResult<AddressPool> {
        AddressPool::new(&self.synth_base_address, self.synth_mask_bits)
            .map_err(|e| ProxyError::Config(format!("Invalid SYNTH_BASE_ADDRESS: {e}")))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> ProxyResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| ProxyError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

/// Default configuration for testing and development.
///
/// The secret is a fixed development value; production deployments should
/// use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8787,
            // Security
            secret: "dev-secret".to_string(),
            // Address synthesis
            synth_base_address: DEFAULT_BASE_ADDRESS.to_string(),
            synth_mask_bits: DEFAULT_MASK_BITS,
            // Upstream
            upstream_timeout: Duration::from_secs(30),
            upstream_connect_timeout: Duration::from_secs(10),
            // Observability
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8787);
        assert_eq!(config.synth_base_address, "70.0.0.0");
        assert_eq!(config.synth_mask_bits, 4);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_secret() {
        let config = Config {
            secret: String::new(),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("WANNABE_SECRET"));
    }

    #[test]
    fn test_validate_mask_too_long() {
        let config = Config {
            synth_mask_bits: 33,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SYNTH_MASK_BITS"));
    }

    #[test]
    fn test_validate_bad_base_address() {
        let config = Config {
            synth_base_address: "70.0.0".to_string(),
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SYNTH_BASE_ADDRESS"));
    }

    #[test]
    fn test_validate_zero_connect_timeout() {
        let config = Config {
            upstream_connect_timeout: Duration::ZERO,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upstream_timeout_zero_disables() {
        let config = Config {
            upstream_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(config.upstream_timeout(), None);
        assert_eq!(
            Config::default().upstream_timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_address_pool_from_config() {
        let pool = Config::default().address_pool().unwrap();
        assert_eq!(pool.base(), 0x4600_0000);
        assert_eq!(pool.mask_bits(), 4);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_debug_lists_every_setting() {
        let rendered = format!("{:?}", Config::default());
        assert_eq!(
            rendered,
            "Config { host: \"0.0.0.0\", port: 8787, secret: \"<redacted>\", \
             synth_base_address: \"70.0.0.0\", synth_mask_bits: 4, \
             upstream_timeout: 30s, upstream_connect_timeout: 10s, log_format: Pretty }"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Config::default());
        assert!(!rendered.contains("dev-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
