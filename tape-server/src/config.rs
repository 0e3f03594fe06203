//! Server configuration
//!
//! Everything is read from `TAPE_*` environment variables; unset variables
//! fall back to the defaults below.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tape_core::Instrument;

use crate::reactor::ReactorOptions;

/// Configuration for the analytics server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// The single origin allowed by the CORS headers
    pub allowed_origin: String,
    /// Worker threads serving connections
    pub io_workers: usize,
    /// Worker threads running estimator partitions
    pub cpu_workers: usize,
    /// Bytes read per readiness event
    pub read_buffer: usize,
    /// Longest the reactor waits for readiness before re-checking for shutdown
    pub poll_timeout: Duration,
    /// Whether bars fed to the estimators get silent minutes filled in
    pub fill_missing_minutes: bool,
    /// Instruments registered in the tick store at startup
    pub instruments: Vec<Instrument>,
    /// Spacing of generated ticks
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            allowed_origin: "http://localhost:5173".to_string(),
            io_workers: 8,
            cpu_workers: num_cpus::get(),
            read_buffer: 4096,
            poll_timeout: Duration::from_millis(1000),
            fill_missing_minutes: false,
            instruments: vec![Instrument::ES, Instrument::NQ],
            tick_interval: Duration::from_millis(10_000),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - TAPE_HOST, TAPE_PORT, TAPE_ALLOWED_ORIGIN
    /// - TAPE_IO_WORKERS, TAPE_CPU_WORKERS
    /// - TAPE_READ_BUFFER, TAPE_POLL_TIMEOUT_MS
    /// - TAPE_FILL_GAPS, TAPE_INSTRUMENTS, TAPE_TICK_INTERVAL_MS
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let instruments = match lookup("TAPE_INSTRUMENTS") {
            Some(raw) => parse_instruments(&raw)?,
            None => defaults.instruments,
        };

        Ok(Self {
            host: parse_var(&lookup, "TAPE_HOST", defaults.host)?,
            port: parse_var(&lookup, "TAPE_PORT", defaults.port)?,
            allowed_origin: lookup("TAPE_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            io_workers: positive(&lookup, "TAPE_IO_WORKERS", defaults.io_workers)?,
            cpu_workers: positive(&lookup, "TAPE_CPU_WORKERS", defaults.cpu_workers)?,
            read_buffer: positive(&lookup, "TAPE_READ_BUFFER", defaults.read_buffer)?,
            poll_timeout: Duration::from_millis(positive(
                &lookup,
                "TAPE_POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )?),
            fill_missing_minutes: parse_flag(&lookup, "TAPE_FILL_GAPS", defaults.fill_missing_minutes)?,
            instruments,
            tick_interval: Duration::from_millis(positive(
                &lookup,
                "TAPE_TICK_INTERVAL_MS",
                defaults.tick_interval.as_millis() as u64,
            )?),
        })
    }

    /// Address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reactor tuning derived from this configuration
    pub fn reactor_options(&self) -> ReactorOptions {
        ReactorOptions {
            read_buffer: self.read_buffer,
            poll_timeout: self.poll_timeout,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let value = parse_var(lookup, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::NotPositive(key.to_string()));
    }
    Ok(value)
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_instruments(raw: &str) -> Result<Vec<Instrument>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Invalid {
                key: "TAPE_INSTRUMENTS".to_string(),
                value: s.to_string(),
            })
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("{0} must be positive")]
    NotPositive(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.io_workers, 8);
        assert_eq!(config.read_buffer, 4096);
        assert_eq!(config.allowed_origin, "http://localhost:5173");
        assert_eq!(config.instruments, vec![Instrument::ES, Instrument::NQ]);
        assert!(!config.fill_missing_minutes);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TAPE_HOST", "127.0.0.1"),
            ("TAPE_PORT", "8080"),
            ("TAPE_CPU_WORKERS", "3"),
            ("TAPE_FILL_GAPS", "true"),
            ("TAPE_INSTRUMENTS", "YM, ES"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.cpu_workers, 3);
        assert!(config.fill_missing_minutes);
        assert_eq!(config.instruments, vec![Instrument::YM, Instrument::ES]);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("TAPE_PORT", "http")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("TAPE_IO_WORKERS", "0")])),
            Err(ConfigError::NotPositive(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("TAPE_INSTRUMENTS", "ES,ZZ")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(ServerConfig::from_lookup(lookup(&[("TAPE_FILL_GAPS", "maybe")])).is_err());
    }
}
