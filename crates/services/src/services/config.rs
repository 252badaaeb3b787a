//! Service configuration read from the environment.

use std::net::{IpAddr, SocketAddr};

use db::models::measurement::MeasurementUnit;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub analytics_enabled: bool,
    /// Unit used when neither the request nor either record names one
    pub default_unit: MeasurementUnit,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(utils::assets::default_database_url);

        let host: IpAddr = match lookup("HOST") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "HOST",
                value,
            })?,
            None => DEFAULT_HOST
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "HOST",
                    value: DEFAULT_HOST.to_string(),
                })?,
        };

        let port: u16 = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let analytics_enabled = match lookup("STITCHCRAFT_ANALYTICS") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidValue {
                name: "STITCHCRAFT_ANALYTICS",
                value,
            })?,
            None => false,
        };

        let default_unit: MeasurementUnit = match lookup("STITCHCRAFT_DEFAULT_UNIT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "STITCHCRAFT_DEFAULT_UNIT",
                value,
            })?,
            None => MeasurementUnit::default(),
        };

        Ok(Self {
            database_url,
            host,
            port,
            analytics_enabled,
            default_unit,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
