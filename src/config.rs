//! Environment-driven configuration.
//!
//! Read once at startup; `envy` maps `DATABASE_URL` and `SERVER_PORT` onto
//! the struct fields by name.

use serde::Deserialize;

/// Runtime configuration for the Nautilus tenant API.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL connection string (required)
    pub database_url: String,

    /// HTTP listen port, defaults to 3000
    #[serde(default = "default_port")]
    pub server_port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from the environment, reading an optional `.env`
    /// file first. Fails when `DATABASE_URL` is absent or a value does not
    /// parse.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }
}
