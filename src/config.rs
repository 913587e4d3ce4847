//! Dashboard host configuration parsed from environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_BACKEND_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_SESSION_STORE_PATH: &str = ".cms-dashboard/session.json";

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `PORT` is not a valid port number.
    #[error("invalid PORT '{0}'")]
    Port(String),

    /// `BIND_ADDR` is not an IP address.
    #[error("invalid BIND_ADDR '{0}'")]
    BindAddr(String),

    /// `SESSION_STORE` names an unknown storage kind.
    #[error("unknown SESSION_STORE '{0}' (expected 'file' or 'memory')")]
    StoreKind(String),
}

/// Where the session lives between host restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// JSON file at `store_path`; survives restarts.
    File,
    /// Process memory; every restart starts logged out.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub backend_base_url: String,
    pub port: u16,
    pub bind_addr: IpAddr,
    pub store: StoreKind,
    pub store_path: PathBuf,
}

impl DashboardConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `BACKEND_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `PORT`: default 3000
    /// - `BIND_ADDR`: default `127.0.0.1`
    /// - `SESSION_STORE`: `file` (default) or `memory`
    /// - `SESSION_STORE_PATH`: default `.cms-dashboard/session.json`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reading from `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_base_url = lookup("BACKEND_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let port = parse_port(lookup("PORT").as_deref())?;
        let bind_addr = parse_bind_addr(lookup("BIND_ADDR").as_deref())?;
        let store = parse_store(lookup("SESSION_STORE").as_deref())?;
        let store_path = lookup("SESSION_STORE_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_SESSION_STORE_PATH), PathBuf::from);

        Ok(Self { backend_base_url, port, bind_addr, store, store_path })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    match raw {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Port(raw.to_string())),
    }
}

fn parse_bind_addr(raw: Option<&str>) -> Result<IpAddr, ConfigError> {
    let raw = raw.unwrap_or(DEFAULT_BIND_ADDR).trim();
    raw.parse::<IpAddr>()
        .map_err(|_| ConfigError::BindAddr(raw.to_string()))
}

fn parse_store(raw: Option<&str>) -> Result<StoreKind, ConfigError> {
    match raw.map(str::trim).unwrap_or("file") {
        "file" => Ok(StoreKind::File),
        "memory" => Ok(StoreKind::Memory),
        other => Err(ConfigError::StoreKind(other.to_string())),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
