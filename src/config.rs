use hyper::Uri;
use serde::Deserialize;
use std::net::SocketAddr;
use std::num::{NonZeroUsize, TryFromIntError};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error(r#"threads must be a positive integer or "cores", got {0:?}"#)]
    Threads(String),
    #[error(transparent)]
    ZeroThreads(#[from] TryFromIntError),
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,
    #[serde(with = "http_serde::uri")]
    pub upstream: Uri,
    #[serde(default = "Config::default_log_level")]
    pub log_level: log::Level,
    #[serde(default)]
    pub threads: ConfigThreads,
    #[serde(default)]
    pub geoip: GeoIpConfig,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 8080).into()
    }

    fn default_log_level() -> log::Level {
        log::Level::Info
    }

    /// Level to initialise the logger with, `geoip.debug` forces at least debug output
    pub fn effective_log_level(&self) -> log::Level {
        if self.geoip.debug {
            self.log_level.max(log::Level::Debug)
        } else {
            self.log_level
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct GeoIpConfig {
    /// Prefix of log messages
    #[serde(default = "GeoIpConfig::default_name")]
    pub name: String,
    #[serde(default = "GeoIpConfig::default_db_path", alias = "dbPath")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, alias = "excludeIPs")]
    pub exclude_ips: Vec<String>,
    #[serde(default, alias = "setRealIP")]
    pub set_real_ip: bool,
    #[serde(default = "GeoIpConfig::default_cache_size", alias = "cacheSize")]
    pub cache_size: NonZeroUsize,
    #[serde(default = "GeoIpConfig::default_ip_headers")]
    pub ip_headers: Vec<String>,
    #[serde(default = "GeoIpConfig::default_ip_headers_recursive")]
    pub ip_headers_recursive: bool,
}

impl GeoIpConfig {
    fn default_name() -> String {
        "geoip".into()
    }

    fn default_db_path() -> PathBuf {
        "GeoLite2-Country.mmdb".into()
    }

    fn default_cache_size() -> NonZeroUsize {
        DEFAULT_CACHE_SIZE
    }

    fn default_ip_headers() -> Vec<String> {
        vec!["X-Forwarded-For".into()]
    }

    fn default_ip_headers_recursive() -> bool {
        true
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            db_path: Self::default_db_path(),
            debug: false,
            exclude_ips: vec![],
            set_real_ip: false,
            cache_size: Self::default_cache_size(),
            ip_headers: Self::default_ip_headers(),
            ip_headers_recursive: Self::default_ip_headers_recursive(),
        }
    }
}

/// Number of runtime worker threads
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "ConfigThreadsDe")]
pub enum ConfigThreads {
    /// One worker per CPU core
    #[default]
    Cores,
    Custom(NonZeroUsize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigThreadsDe {
    Number(usize),
    Name(String),
}

impl TryFrom<ConfigThreadsDe> for ConfigThreads {
    type Error = ConfigError;

    fn try_from(value: ConfigThreadsDe) -> Result<Self, Self::Error> {
        match value {
            ConfigThreadsDe::Number(threads) => Ok(Self::Custom(threads.try_into()?)),
            ConfigThreadsDe::Name(name) if name.trim().eq_ignore_ascii_case("cores") => {
                Ok(Self::Cores)
            }
            ConfigThreadsDe::Name(name) => Err(ConfigError::Threads(name)),
        }
    }
}

pub fn parse_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let toml_string = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&toml_string)?;
    Ok(config)
}
