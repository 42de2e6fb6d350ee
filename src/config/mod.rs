use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlogConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub blog: BlogConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::defaults("development", "sqlite://officers_log.db")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // `APP_SERVER__PORT=5001` sets `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        s.try_deserialize()
    }

    /// Defaults only, pointed at an in-memory database. Environment
    /// variables are ignored so tests stay hermetic.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Self::defaults("test", "sqlite::memory:")?
            .set_override("database.max_connections", 1)?
            .set_override("auth.session_secret", "test_secret")?
            .set_override("auth.session_ttl_hours", 1)?
            .build()?
            .try_deserialize()
    }

    fn defaults(
        environment: &str,
        database_url: &str,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.url", database_url)?
            .set_default("database.max_connections", 5)?
            .set_default("auth.session_secret", "development_secret")?
            .set_default("auth.session_ttl_hours", 24 * 30)?
            .set_default("auth.cookie_secure", false)?
            .set_default("blog.page_size", 10)?
            .set_default("blog.max_page_size", 100)
    }
}
