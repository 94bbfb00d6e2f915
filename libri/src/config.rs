//! Node configuration (spec §6), a cascading builder in the spirit of the source's
//! `NewDefaultConfig()`/`WithX` chain, rendered as an idiomatic Rust consuming builder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use libri_core::error::{ConfigError, LibriError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub local_port: u16,
    pub public_addr: String,
    pub bootstrap_addrs: Vec<String>,
    pub k: usize,
    pub concurrency: usize,
    pub n_max_errors: usize,
    #[serde(with = "duration_secs")]
    pub query_timeout: Duration,
    pub n_closest_responses: usize,
    pub put_parallelism: usize,
    pub put_quorum: usize,
    pub page_size: usize,
    pub compression_buffer_size: usize,
    pub pipeline_parallelism: usize,
    pub log_level: String,
    pub report_metrics: bool,
    pub profile: bool,
    pub data_dir: PathBuf,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Consuming builder over [`Config`]: every `with_*` validates and takes `self` by value, so
/// a caller chains `Config::new(dir).with_k(30)?.with_concurrency(5)?.build()?`.
pub struct ConfigBuilder {
    inner: Config,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            inner: Config {
                local_port: 11000,
                public_addr: "127.0.0.1:11000".to_string(),
                bootstrap_addrs: Vec::new(),
                k: libri_core::routing::DEFAULT_K,
                concurrency: libri_core::lookup::DEFAULT_CONCURRENCY,
                n_max_errors: libri_core::lookup::DEFAULT_N_MAX_ERRORS,
                query_timeout: libri_core::lookup::DEFAULT_QUERY_TIMEOUT,
                n_closest_responses: libri_core::lookup::DEFAULT_N_CLOSEST_RESPONSES,
                put_parallelism: 3,
                put_quorum: 1,
                page_size: libri_pipeline::params::DEFAULT_PAGE_SIZE,
                compression_buffer_size: libri_pipeline::params::DEFAULT_BUFFER_SIZE,
                pipeline_parallelism: libri_pipeline::params::DEFAULT_PARALLELISM,
                log_level: "info".to_string(),
                report_metrics: false,
                profile: false,
                data_dir: data_dir.into(),
            },
        }
    }
}

impl ConfigBuilder {
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.inner.local_port = port;
        self
    }

    pub fn with_public_addr(mut self, addr: impl Into<String>) -> Self {
        self.inner.public_addr = addr.into();
        self
    }

    pub fn with_bootstrap_addrs(mut self, addrs: Vec<String>) -> Self {
        self.inner.bootstrap_addrs = addrs;
        self
    }

    pub fn with_k(mut self, k: usize) -> Result<Self, LibriError> {
        if k == 0 {
            return Err(ConfigError::InvalidParameter("k".to_string()).into());
        }
        self.inner.k = k;
        Ok(self)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, LibriError> {
        if concurrency == 0 {
            return Err(ConfigError::InvalidParameter("concurrency".to_string()).into());
        }
        self.inner.concurrency = concurrency;
        Ok(self)
    }

    pub fn with_n_max_errors(mut self, n: usize) -> Self {
        self.inner.n_max_errors = n;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.inner.query_timeout = timeout;
        self
    }

    pub fn with_n_closest_responses(mut self, n: usize) -> Result<Self, LibriError> {
        if n == 0 {
            return Err(ConfigError::InvalidParameter("n_closest_responses".to_string()).into());
        }
        self.inner.n_closest_responses = n;
        Ok(self)
    }

    pub fn with_put_parallelism(mut self, n: usize) -> Result<Self, LibriError> {
        if n == 0 {
            return Err(ConfigError::InvalidParameter("put_parallelism".to_string()).into());
        }
        self.inner.put_parallelism = n;
        Ok(self)
    }

    pub fn with_put_quorum(mut self, n: usize) -> Result<Self, LibriError> {
        if n == 0 {
            return Err(ConfigError::InvalidParameter("put_quorum".to_string()).into());
        }
        self.inner.put_quorum = n;
        Ok(self)
    }

    pub fn with_page_size(mut self, bytes: usize) -> Result<Self, LibriError> {
        if bytes < libri_pipeline::params::MIN_PAGE_SIZE {
            return Err(ConfigError::InvalidParameter("page_size".to_string()).into());
        }
        self.inner.page_size = bytes;
        Ok(self)
    }

    pub fn with_compression_buffer_size(mut self, bytes: usize) -> Result<Self, LibriError> {
        if bytes < libri_pipeline::params::MIN_BUFFER_SIZE {
            return Err(ConfigError::InvalidParameter("compression_buffer_size".to_string()).into());
        }
        self.inner.compression_buffer_size = bytes;
        Ok(self)
    }

    pub fn with_pipeline_parallelism(mut self, n: usize) -> Result<Self, LibriError> {
        if n == 0 {
            return Err(ConfigError::InvalidParameter("pipeline_parallelism".to_string()).into());
        }
        self.inner.pipeline_parallelism = n;
        Ok(self)
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.inner.log_level = level.into();
        self
    }

    pub fn with_report_metrics(mut self, enabled: bool) -> Self {
        self.inner.report_metrics = enabled;
        self
    }

    pub fn with_profile(mut self, enabled: bool) -> Self {
        self.inner.profile = enabled;
        self
    }

    pub fn build(self) -> Result<Config, LibriError> {
        Ok(self.inner)
    }
}

/// Layers a TOML file (if present) and `LIBRI_*` environment variables over the built-in
/// defaults, with `overrides` (typically parsed CLI flags) taking final precedence.
pub fn load(data_dir: &Path, toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Config, LibriError> {
    let mut builder = ::config::Config::builder().add_source(ConfigDefaults::new(data_dir));

    if let Some(path) = toml_path {
        if path.exists() {
            builder = builder.add_source(::config::File::from(path.to_path_buf()));
        }
    }
    builder = builder.add_source(::config::Environment::with_prefix("LIBRI").separator("__"));

    let layered = builder
        .build()
        .map_err(|e| ConfigError::InvalidParameter(format!("config source error: {e}")))?;
    let mut config: Config = layered
        .try_deserialize()
        .map_err(|e| ConfigError::InvalidParameter(format!("config deserialization error: {e}")))?;

    overrides.apply(&mut config);
    Ok(config)
}

/// CLI-flag overrides (see `cli.rs`), applied last so they win over file and environment.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub local_port: Option<u16>,
    pub bootstrap_addrs: Option<Vec<String>>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.local_port {
            config.local_port = port;
        }
        if let Some(addrs) = self.bootstrap_addrs {
            config.bootstrap_addrs = addrs;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

/// A `config::Source` seeded from [`Config::new`]'s defaults, so file/env layering always
/// starts from the same baseline the programmatic builder produces.
#[derive(Debug, Clone)]
struct ConfigDefaults {
    defaults: Config,
}

impl ConfigDefaults {
    fn new(data_dir: &Path) -> Self {
        ConfigDefaults { defaults: Config::new(data_dir).build().expect("defaults are always valid") }
    }
}

impl ::config::Source for ConfigDefaults {
    fn clone_into_box(&self) -> Box<dyn ::config::Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<::config::Map<String, ::config::Value>, ::config::ConfigError> {
        Ok(defaults_as_config_map(&self.defaults))
    }
}

/// Converts `Config`'s fields into the `config` crate's loosely-typed `Value` map via a
/// round-trip through `toml::Value`, reusing the serde impl rather than hand-writing one
/// field at a time.
fn defaults_as_config_map(config: &Config) -> ::config::Map<String, ::config::Value> {
    let toml_value = toml::Value::try_from(config).expect("Config always serializes to TOML");
    let toml::Value::Table(table) = toml_value else {
        return ::config::Map::new();
    };
    table
        .into_iter()
        .map(|(k, v)| (k, ::config::Value::from(toml_to_config_value(v))))
        .collect()
}

fn toml_to_config_value(value: toml::Value) -> ::config::ValueKind {
    match value {
        toml::Value::String(s) => ::config::ValueKind::String(s),
        toml::Value::Integer(i) => ::config::ValueKind::I64(i),
        toml::Value::Float(f) => ::config::ValueKind::Float(f),
        toml::Value::Boolean(b) => ::config::ValueKind::Boolean(b),
        toml::Value::Array(arr) => ::config::ValueKind::Array(
            arr.into_iter().map(|v| ::config::Value::from(toml_to_config_value(v))).collect(),
        ),
        toml::Value::Table(t) => ::config::ValueKind::Table(
            t.into_iter().map(|(k, v)| (k, ::config::Value::from(toml_to_config_value(v)))).collect(),
        ),
        toml::Value::Datetime(dt) => ::config::ValueKind::String(dt.to_string()),
    }
}
