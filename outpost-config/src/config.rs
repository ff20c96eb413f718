use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ipnetwork::IpNetwork;
use outpost_log::LogConfig;
use serde::{Deserialize, Serialize};

/// Default bind address of the HTTP server, also the agent's target.
const DEFAULT_ADDRESS: &str = "localhost:8080";

/// Default interval between snapshot flushes, in seconds.
const DEFAULT_STORE_INTERVAL: u64 = 300;

/// Default interval between agent poll ticks, in seconds.
const DEFAULT_POLL_INTERVAL: u64 = 2;

/// Default interval between agent report ticks, in seconds.
const DEFAULT_REPORT_INTERVAL: u64 = 10;

/// Default number of shipper workers.
const DEFAULT_RATE_LIMIT: usize = 4;

/// Indicates config related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to open or read the config file.
    #[error("could not open config file {path}")]
    CouldNotOpenFile {
        /// The file that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Parsing the JSON config file failed.
    #[error("could not parse json config file {path}")]
    BadJson {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A field override (env var or CLI parameter) holds an invalid value.
    #[error("invalid config value (field {field})")]
    InvalidValue {
        /// The overridden field.
        field: &'static str,
    },

    /// The assembled config violates a constraint.
    #[error("{message}")]
    Invalid {
        /// Description of the violated constraint.
        message: String,
    },
}

impl ConfigError {
    fn field(field: &'static str) -> Self {
        Self::InvalidValue { field }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Where flushed snapshots are persisted.
///
/// Derived from the config: database if a DSN is set, else file if a path is
/// set, else memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePlace {
    /// No durability; snapshots stay in memory.
    Memory,
    /// Snapshots append to a newline-delimited JSON file.
    File(PathBuf),
    /// Snapshots go to the relational store behind this DSN.
    Database(String),
}

/// Holds overrides for config values from CLI parameters or environment
/// variables.
///
/// All values are raw strings; they are parsed by
/// [`Config::apply_override`], which reports the offending field on error.
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The host:port the HTTP server binds, and the agent's target.
    pub address: Option<String>,
    /// The host:port the gRPC server binds, empty disables gRPC.
    pub grpc_address: Option<String>,
    /// The shared HMAC secret, empty disables hashing.
    pub hash_key: Option<String>,
    /// Path to the RSA key file, empty disables encryption.
    pub crypto_key: Option<String>,
    /// The trusted CIDR, empty disables the subnet filter.
    pub trusted_subnet: Option<String>,
    /// Seconds between snapshot flushes.
    pub store_interval: Option<String>,
    /// Path of the snapshot file.
    pub file_path: Option<String>,
    /// The database DSN.
    pub database_dsn: Option<String>,
    /// Whether to restore the last snapshot on startup.
    pub restore: Option<String>,
    /// Seconds between agent poll ticks.
    pub poll_interval: Option<String>,
    /// Seconds between agent report ticks.
    pub report_interval: Option<String>,
    /// Number of shipper workers.
    pub rate_limit: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
}

/// The shape of the JSON config file.
///
/// Every field is optional; only present fields override the layer below
/// (the CLI flags). Applied through [`Config::apply_file`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// See [`Config::address`].
    pub address: Option<String>,
    /// See [`Config::grpc_address`].
    pub grpc_address: Option<String>,
    /// See [`Config::hash_key`].
    pub hash_key: Option<String>,
    /// See [`Config::crypto_key`].
    pub crypto_key: Option<PathBuf>,
    /// See [`Config::trusted_subnet`].
    pub trusted_subnet: Option<IpNetwork>,
    /// See [`Config::store_interval`].
    pub store_interval: Option<u64>,
    /// See [`Config::store_place`].
    pub file_path: Option<PathBuf>,
    /// See [`Config::database_dsn`].
    pub database_dsn: Option<String>,
    /// See [`Config::restore`].
    pub restore: Option<bool>,
    /// See [`Config::poll_interval`].
    pub poll_interval: Option<u64>,
    /// See [`Config::report_interval`].
    pub report_interval: Option<u64>,
    /// See [`Config::rate_limit`].
    pub rate_limit: Option<usize>,
    /// See [`Config::logging`].
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Loads the file layer from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::CouldNotOpenFile {
            path: path.to_owned(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::BadJson {
            path: path.to_owned(),
            source,
        })
    }
}

/// The unified configuration of the agent and server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    address: String,
    grpc_address: Option<String>,
    hash_key: Option<String>,
    crypto_key: Option<PathBuf>,
    trusted_subnet: Option<IpNetwork>,
    store_interval: u64,
    file_path: Option<PathBuf>,
    database_dsn: Option<String>,
    restore: bool,
    poll_interval: u64,
    report_interval: u64,
    rate_limit: usize,
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            grpc_address: None,
            hash_key: None,
            crypto_key: None,
            trusted_subnet: None,
            store_interval: DEFAULT_STORE_INTERVAL,
            file_path: None,
            database_dsn: None,
            restore: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            rate_limit: DEFAULT_RATE_LIMIT,
            log_level: "info".to_owned(),
        }
    }
}

/// Treats empty strings as unset, which is how disabled features are spelled
/// both in env vars and in the config file.
fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Config {
    /// Loads the config from a JSON file on top of the defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(FileConfig::from_path(path)?);
        Ok(config)
    }

    /// Regenerates the JSON representation of this config.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Applies the config-file layer on top of the current values.
    pub fn apply_file(&mut self, file: FileConfig) {
        let FileConfig {
            address,
            grpc_address,
            hash_key,
            crypto_key,
            trusted_subnet,
            store_interval,
            file_path,
            database_dsn,
            restore,
            poll_interval,
            report_interval,
            rate_limit,
            log_level,
        } = file;

        if let Some(address) = address {
            self.address = address;
        }
        if let Some(grpc_address) = grpc_address {
            self.grpc_address = non_empty(grpc_address);
        }
        if let Some(hash_key) = hash_key {
            self.hash_key = non_empty(hash_key);
        }
        if let Some(crypto_key) = crypto_key {
            self.crypto_key = Some(crypto_key);
        }
        if let Some(trusted_subnet) = trusted_subnet {
            self.trusted_subnet = Some(trusted_subnet);
        }
        if let Some(store_interval) = store_interval {
            self.store_interval = store_interval;
        }
        if let Some(file_path) = file_path {
            self.file_path = Some(file_path);
        }
        if let Some(database_dsn) = database_dsn {
            self.database_dsn = non_empty(database_dsn);
        }
        if let Some(restore) = restore {
            self.restore = restore;
        }
        if let Some(poll_interval) = poll_interval {
            self.poll_interval = poll_interval;
        }
        if let Some(report_interval) = report_interval {
            self.report_interval = report_interval;
        }
        if let Some(rate_limit) = rate_limit {
            self.rate_limit = rate_limit;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
    }

    /// Applies a set of overrides on top of the current values.
    ///
    /// Called once for CLI flags and once for environment variables; the
    /// later call wins, so apply in increasing precedence.
    pub fn apply_override(&mut self, mut overrides: OverridableConfig) -> Result<(), ConfigError> {
        if let Some(address) = overrides.address.take() {
            self.address = address;
        }
        if let Some(grpc_address) = overrides.grpc_address.take() {
            self.grpc_address = non_empty(grpc_address);
        }
        if let Some(hash_key) = overrides.hash_key.take() {
            self.hash_key = non_empty(hash_key);
        }
        if let Some(crypto_key) = overrides.crypto_key.take() {
            self.crypto_key = non_empty(crypto_key).map(PathBuf::from);
        }
        if let Some(trusted_subnet) = overrides.trusted_subnet.take() {
            self.trusted_subnet = match non_empty(trusted_subnet) {
                Some(raw) => Some(raw.parse().map_err(|_| ConfigError::field("trusted_subnet"))?),
                None => None,
            };
        }
        if let Some(store_interval) = overrides.store_interval.take() {
            self.store_interval = store_interval
                .parse()
                .map_err(|_| ConfigError::field("store_interval"))?;
        }
        if let Some(file_path) = overrides.file_path.take() {
            self.file_path = non_empty(file_path).map(PathBuf::from);
        }
        if let Some(database_dsn) = overrides.database_dsn.take() {
            self.database_dsn = non_empty(database_dsn);
        }
        if let Some(restore) = overrides.restore.take() {
            self.restore = restore
                .parse()
                .map_err(|_| ConfigError::field("restore"))?;
        }
        if let Some(poll_interval) = overrides.poll_interval.take() {
            self.poll_interval = poll_interval
                .parse()
                .map_err(|_| ConfigError::field("poll_interval"))?;
        }
        if let Some(report_interval) = overrides.report_interval.take() {
            self.report_interval = report_interval
                .parse()
                .map_err(|_| ConfigError::field("report_interval"))?;
        }
        if let Some(rate_limit) = overrides.rate_limit.take() {
            self.rate_limit = rate_limit
                .parse()
                .map_err(|_| ConfigError::field("rate_limit"))?;
        }
        if let Some(log_level) = overrides.log_level.take() {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Validates cross-field constraints after all layers are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval < 1 {
            return Err(ConfigError::invalid("poll_interval must be at least 1 second"));
        }
        if self.report_interval < 1 {
            return Err(ConfigError::invalid("report_interval must be at least 1 second"));
        }
        if self.rate_limit < 1 {
            return Err(ConfigError::invalid("rate_limit must be at least 1"));
        }
        if self.store_interval < 1 {
            return Err(ConfigError::invalid("store_interval must be at least 1 second"));
        }

        Ok(())
    }

    /// Returns the raw host:port the HTTP server binds.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Resolves the HTTP bind address to a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve_addr(&self.address).ok_or(ConfigError::field("address"))
    }

    /// Resolves the gRPC bind address, if gRPC is enabled.
    pub fn grpc_listen_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        match &self.grpc_address {
            Some(raw) => resolve_addr(raw)
                .map(Some)
                .ok_or(ConfigError::field("grpc_address")),
            None => Ok(None),
        }
    }

    /// Returns the raw gRPC address, if configured.
    pub fn grpc_address(&self) -> Option<&str> {
        self.grpc_address.as_deref()
    }

    /// Returns the shared HMAC secret, if hashing is enabled.
    pub fn hash_key(&self) -> Option<&str> {
        self.hash_key.as_deref()
    }

    /// Returns the path to the RSA key file, if encryption is enabled.
    pub fn crypto_key(&self) -> Option<&Path> {
        self.crypto_key.as_deref()
    }

    /// Returns the trusted subnet, if the origin filter is enabled.
    pub fn trusted_subnet(&self) -> Option<&IpNetwork> {
        self.trusted_subnet.as_ref()
    }

    /// Returns the interval between snapshot flushes.
    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval)
    }

    /// Returns the database DSN, if configured.
    pub fn database_dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref()
    }

    /// Returns whether the last snapshot is restored on startup.
    pub fn restore(&self) -> bool {
        self.restore
    }

    /// Returns where snapshots are persisted.
    ///
    /// The database wins over the file, the file over plain memory.
    pub fn store_place(&self) -> StorePlace {
        if let Some(dsn) = &self.database_dsn {
            StorePlace::Database(dsn.clone())
        } else if let Some(path) = &self.file_path {
            StorePlace::File(path.clone())
        } else {
            StorePlace::Memory
        }
    }

    /// Returns the interval between agent poll ticks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Returns the interval between agent report ticks.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }

    /// Returns the number of shipper workers.
    pub fn rate_limit(&self) -> usize {
        self.rate_limit
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> LogConfig {
        LogConfig::with_level(&self.log_level)
    }
}

/// Resolves `host:port` to a socket address, accepting hostnames.
fn resolve_addr(raw: &str) -> Option<SocketAddr> {
    use std::net::ToSocketAddrs;

    raw.to_socket_addrs().ok()?.next()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.address(), "localhost:8080");
        assert_eq!(config.store_place(), StorePlace::Memory);
        assert_eq!(config.store_interval(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.report_interval(), Duration::from_secs(10));
        assert_eq!(config.rate_limit(), 4);
        assert!(config.restore());
        assert!(config.hash_key().is_none());
        assert!(config.trusted_subnet().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn override_precedence() {
        let mut config = Config::default();

        // Flag layer.
        config
            .apply_override(OverridableConfig {
                address: Some("127.0.0.1:9000".to_owned()),
                store_interval: Some("60".to_owned()),
                ..Default::default()
            })
            .unwrap();

        // Env layer overrides the flag.
        config
            .apply_override(OverridableConfig {
                address: Some("127.0.0.1:9100".to_owned()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.address(), "127.0.0.1:9100");
        assert_eq!(config.store_interval(), Duration::from_secs(60));
    }

    #[test]
    fn empty_strings_disable_features() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                hash_key: Some(String::new()),
                trusted_subnet: Some(String::new()),
                database_dsn: Some(String::new()),
                ..Default::default()
            })
            .unwrap();

        assert!(config.hash_key().is_none());
        assert!(config.trusted_subnet().is_none());
        assert_eq!(config.store_place(), StorePlace::Memory);
    }

    #[test]
    fn invalid_override_names_field() {
        let mut config = Config::default();
        let err = config
            .apply_override(OverridableConfig {
                store_interval: Some("soon".to_owned()),
                ..Default::default()
            })
            .unwrap_err();

        assert!(err.to_string().contains("store_interval"));
    }

    #[test]
    fn store_place_precedence() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                file_path: Some("/tmp/metrics.json".to_owned()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            config.store_place(),
            StorePlace::File(PathBuf::from("/tmp/metrics.json"))
        );

        config
            .apply_override(OverridableConfig {
                database_dsn: Some("postgres://localhost/outpost".to_owned()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            config.store_place(),
            StorePlace::Database("postgres://localhost/outpost".to_owned())
        );
    }

    #[test]
    fn file_layer_overrides_flags() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                address: Some("127.0.0.1:1111".to_owned()),
                store_interval: Some("60".to_owned()),
                ..Default::default()
            })
            .unwrap();

        config.apply_file(FileConfig {
            address: Some("127.0.0.1:2222".to_owned()),
            ..Default::default()
        });

        assert_eq!(config.address(), "127.0.0.1:2222");
        // Fields absent from the file keep the flag layer.
        assert_eq!(config.store_interval(), Duration::from_secs(60));
    }

    #[test]
    fn from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"address": "0.0.0.0:8888", "store_interval": 30, "restore": false}}"#
        )
        .unwrap();

        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.address(), "0.0.0.0:8888");
        assert_eq!(config.store_interval(), Duration::from_secs(30));
        assert!(!config.restore());
        // Unspecified fields keep their defaults.
        assert_eq!(config.rate_limit(), 4);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            Config::from_path("/definitely/not/here.json"),
            Err(ConfigError::CouldNotOpenFile { .. })
        ));
    }

    #[test]
    fn validation_rejects_zero_intervals() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                poll_interval: Some("0".to_owned()),
                ..Default::default()
            })
            .unwrap();

        assert!(config.validate().is_err());
    }
}
