// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server configuration module
//!
//! Configuration is layered with the `config` crate. Besides the listening
//! address it carries the database location, the seeding source, the
//! documentation challenge and the component selection used by the loader.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Result, anyhow};
use config::{Config, ConfigError, Environment as ConfigEnv, File};
use sample_data::DEFAULT_SEED_URL;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ServerError, ServerResult};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://jsondb.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DOCS_CHALLENGE: &str = "12345";

/// A validated server port that ensures the value is appropriate for the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerPort {
    port: u16,
    environment: Environment,
}

impl ServerPort {
    /// Create a new `ServerPort`, ensuring it's valid for the given environment
    ///
    /// # Errors
    ///
    /// Returns an error if the port is 0 in non-testing environments
    pub fn new(port: u16, environment: Environment) -> Result<Self> {
        if port == 0 && environment != Environment::Testing {
            return Err(anyhow!("port cannot be 0 in non-testing environments"));
        }
        Ok(Self { port, environment })
    }

    /// Default listening port
    pub const fn default_development() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: Environment::Development,
        }
    }

    /// Create a safe testing port (port 0)
    pub const fn testing() -> Self {
        Self {
            port: 0,
            environment: Environment::Testing,
        }
    }

    /// Get the port value
    pub fn value(&self) -> u16 {
        self.port
    }
}

impl<'de> Deserialize<'de> for ServerPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let port = u16::deserialize(deserializer)?;
        // Validated during loading once the environment is known
        Ok(Self {
            port,
            environment: Environment::Development,
        })
    }
}

/// Environment types for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production environment
    Production,
    /// Development environment
    Development,
    /// Testing environment
    Testing,
}

/// Documentation endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Literal path segment required in front of the documentation endpoints
    pub challenge: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            challenge: DEFAULT_DOCS_CHALLENGE.to_string(),
        }
    }
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` connection string
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Remote seeding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Collection fetched when seeding
    pub url: String,
    /// Reseed in the background once the server is listening
    pub on_listen: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SEED_URL.to_string(),
            on_listen: true,
        }
    }
}

/// Selection of the components loaded at startup
///
/// Locations are glob patterns matched against the registered component
/// locations; names are matched exactly against component names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentsConfig {
    /// Location patterns of the services to load
    pub service_locations: Vec<String>,
    /// Names of the services to load
    pub services: Vec<String>,
    /// Location patterns of the middlewares to load
    pub middleware_locations: Vec<String>,
    /// Names of the middlewares to load
    pub middlewares: Vec<String>,
    /// Location patterns of the injectables to load
    pub injectable_locations: Vec<String>,
    /// Names of the injectables to load
    pub injectables: Vec<String>,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            service_locations: vec!["**/*.service".to_string()],
            services: Vec::new(),
            middleware_locations: vec!["**/*.middleware".to_string()],
            middlewares: Vec::new(),
            injectable_locations: vec!["**/*.injectable".to_string()],
            injectables: Vec::new(),
        }
    }
}

/// Server configuration for different environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: IpAddr,
    /// Server port (validated for environment compatibility)
    pub port: ServerPort,
    /// Environment type
    pub environment: Environment,
    /// Apply a permissive CORS layer to every response
    pub cors: bool,
    /// Documentation endpoints
    #[serde(default)]
    pub docs: DocsConfig,
    /// Sample data database
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Remote seeding
    #[serde(default)]
    pub seed: SeedConfig,
    /// Components to load
    #[serde(default)]
    pub components: ComponentsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: ServerPort::default_development(),
            environment: Environment::Development,
            cors: true,
            docs: DocsConfig::default(),
            database: DatabaseConfig::default(),
            seed: SeedConfig::default(),
            components: ComponentsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables and optional configuration files
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid or cannot be loaded.
    pub fn from_env() -> ServerResult<Self> {
        Self::load().map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Load configuration using the config crate with hierarchical sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Configuration file (config.json)
    /// 3. Environment-specific files (config.{env}.json)
    /// 4. Environment variables with `SERVER_` prefix, nested keys separated by `__`
    ///    (`SERVER_DATABASE__URL`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let env_var = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let defaults = ComponentsConfig::default();

        let mut config_builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", DEFAULT_PORT)?
            .set_default("environment", "development")?
            .set_default("cors", true)?
            .set_default("docs.challenge", DEFAULT_DOCS_CHALLENGE)?
            .set_default("database.url", DEFAULT_DATABASE_URL)?
            .set_default("database.max_connections", DEFAULT_MAX_CONNECTIONS)?
            .set_default("seed.url", DEFAULT_SEED_URL)?
            .set_default("seed.on_listen", true)?
            .set_default("components.service_locations", defaults.service_locations)?
            .set_default("components.services", Vec::<String>::new())?
            .set_default(
                "components.middleware_locations",
                defaults.middleware_locations,
            )?
            .set_default("components.middlewares", Vec::<String>::new())?
            .set_default(
                "components.injectable_locations",
                defaults.injectable_locations,
            )?
            .set_default("components.injectables", Vec::<String>::new())?
            .add_source(File::with_name("config.json").required(false))
            .add_source(
                File::with_name(&format!("config.{}.json", env_var.to_lowercase())).required(false),
            )
            .add_source(
                ConfigEnv::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if std::env::var("ENVIRONMENT").is_ok() {
            config_builder = config_builder.set_override("environment", env_var.to_lowercase())?;
        }

        let config = config_builder.build()?;
        let mut server_config: Self = config.try_deserialize()?;

        server_config.port = ServerPort::new(server_config.port.value(), server_config.environment)
            .map_err(|e| ConfigError::Message(format!("invalid port configuration: {e}")))?;

        Ok(server_config)
    }

    /// Create configuration optimized for testing
    ///
    /// Binds an OS-assigned loopback port, keeps the data in memory and never
    /// reaches out to the seed endpoint on its own.
    pub fn for_testing() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: ServerPort::testing(),
            environment: Environment::Testing,
            cors: true,
            docs: DocsConfig::default(),
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            seed: SeedConfig {
                on_listen: false,
                ..SeedConfig::default()
            },
            components: ComponentsConfig::default(),
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.value())
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
            Environment::Testing => write!(f, "testing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_port_validation() {
        // Port 0 should only be valid in testing environment
        assert!(ServerPort::new(0, Environment::Testing).is_ok());
        assert!(ServerPort::new(0, Environment::Development).is_err());
        assert!(ServerPort::new(0, Environment::Production).is_err());

        assert!(ServerPort::new(8080, Environment::Development).is_ok());
        assert!(ServerPort::new(443, Environment::Production).is_ok());
    }

    #[test]
    fn environment_display() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Testing.to_string(), "testing");
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.docs.challenge, "12345");
        assert_eq!(config.database.url, "sqlite://jsondb.db?mode=rwc");
        assert_eq!(config.seed.url, DEFAULT_SEED_URL);
        assert!(config.seed.on_listen);
        assert_eq!(config.components.service_locations, ["**/*.service"]);
        assert!(config.components.services.is_empty());
    }

    #[test]
    fn load_uses_defaults_without_sources() {
        let config = ServerConfig::load().unwrap();
        assert_eq!(config.components, ComponentsConfig::default());
        assert_eq!(config.database.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn testing_config_is_isolated() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.port.value(), 0);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(!config.seed.on_listen);
    }
}
