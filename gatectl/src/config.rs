//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set via the
//! `-f` flag or `GATECTL_CONFIG`. Environment variables prefixed `GATECTL_`
//! override YAML values; nested fields use double underscores, e.g.
//! `GATECTL_CACHE__ENABLED=false`.
//!
//! Durations are written in humantime form (`30s`, `5m`, `1h`).
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8080
//! cache:
//!   enabled: true
//!   model_ttl: 60s
//!   credential_ttl: 5m
//! metering:
//!   cost_interval: 5m
//!   billing_interval: 1h
//!   cost_batch_size: 100
//! credentials:
//!   - name: openrouter-main
//!     kind: open_router
//!     api_key: sk-or-...
//!     site_url: https://gate.example.com
//!     site_name: Gate
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use crate::providers::CredentialKind;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "GATECTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Admission configuration
    pub auth: AuthConfig,
    /// Repository caching configuration
    pub cache: CacheConfig,
    /// Cost and billing pipeline configuration
    pub metering: MeteringConfig,
    /// Provider dispatch configuration
    pub dispatch: DispatchConfig,
    /// Provider credentials created at startup if absent
    pub credentials: Vec<CredentialSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            metering: MeteringConfig::default(),
            dispatch: DispatchConfig::default(),
            credentials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie the session interceptor reads in addition to the bearer header
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gatectl_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Wrap the model and credential repositories with the TTL cache
    pub enabled: bool,
    /// TTL for model reads
    #[serde(with = "humantime_serde")]
    pub model_ttl: Duration,
    /// TTL for credential reads
    #[serde(with = "humantime_serde")]
    pub credential_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_ttl: Duration::from_secs(60),
            credential_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeteringConfig {
    /// How often the cost calculator runs
    #[serde(with = "humantime_serde")]
    pub cost_interval: Duration,
    /// How often billing summaries are regenerated
    #[serde(with = "humantime_serde")]
    pub billing_interval: Duration,
    /// Usage events fetched per cost-calculation batch
    pub cost_batch_size: usize,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            cost_interval: Duration::from_secs(5 * 60),
            billing_interval: Duration::from_secs(60 * 60),
            cost_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Outbound provider request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// A provider credential seeded at startup. Secrets normally arrive through
/// the environment override, e.g. `GATECTL_CREDENTIALS` in YAML form with the
/// key injected by the deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialSeed {
    pub name: String,
    pub kind: CredentialKind,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

impl Config {
    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("GATECTL_").split("__"))
    }

    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.cache.enabled {
            if self.cache.model_ttl.is_zero() {
                return Err(Error::BadRequest {
                    message: "Config validation: cache.model_ttl must be non-zero when caching is enabled".to_string(),
                });
            }
            if self.cache.credential_ttl.is_zero() {
                return Err(Error::BadRequest {
                    message: "Config validation: cache.credential_ttl must be non-zero when caching is enabled".to_string(),
                });
            }
        }
        if self.metering.cost_batch_size == 0 {
            return Err(Error::BadRequest {
                message: "Config validation: metering.cost_batch_size must be at least 1".to_string(),
            });
        }
        if self.metering.cost_interval.is_zero() || self.metering.billing_interval.is_zero() {
            return Err(Error::BadRequest {
                message: "Config validation: metering intervals must be non-zero".to_string(),
            });
        }
        if self.auth.session.cookie_name.is_empty() {
            return Err(Error::BadRequest {
                message: "Config validation: auth.session.cookie_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
