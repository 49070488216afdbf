use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use relay_log::LogConfig;
use relay_sink::{DEFAULT_CONCURRENCY, DEFAULT_QUEUE_CAPACITY, RelayConfig, SendFailurePolicy};
use serde::{Deserialize, Serialize};

/// The basename of the config file within the config folder.
const CONFIG_FILE_NAME: &str = "config.yml";

/// Defines the source of a config error
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (an env var, or a CLI parameter).
    FieldOverride(String),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            inner: Some(Box::new(inner)),
            ..Self::new(kind)
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => self.kind.fmt(f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to serialize the configuration.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
    /// No DSN was configured, so there is nowhere to relay to.
    #[error("no sentry dsn configured")]
    MissingDsn,
}

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The DSN records are relayed to.
    pub dsn: Option<String>,
    /// The number of forwarding workers.
    pub concurrency: Option<String>,
    /// The capacity of the record queue.
    pub queue_capacity: Option<String>,
    /// The queue occupancy above which records are dropped.
    pub overflow_threshold: Option<String>,
    /// What a worker does after a failed send.
    pub send_failure: Option<String>,
}

/// Controls the relay pipeline.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Relay {
    /// The DSN of the Sentry project records are relayed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
    /// The number of forwarding workers, each with its own connection.
    pub concurrency: usize,
    /// The maximum number of records waiting to be forwarded.
    pub queue_capacity: usize,
    /// The queue occupancy above which new records are dropped.
    ///
    /// Defaults to the capacity minus two records per worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow_threshold: Option<usize>,
    /// What a worker does after the backend failed to accept a record.
    pub send_failure: SendFailurePolicy,
}

impl Default for Relay {
    fn default() -> Self {
        Relay {
            dsn: None,
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_threshold: None,
            send_failure: SendFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct ConfigValues {
    relay: Relay,
    logging: LogConfig,
}

impl ConfigValues {
    fn path(base: &Path) -> PathBuf {
        base.join(CONFIG_FILE_NAME)
    }

    /// Loads the config file from the given directory, falling back to defaults if it is absent.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path));
            }
        };

        serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }
}

/// Config struct.
#[derive(Debug)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl Config {
    /// Loads a config from a given config folder.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        Ok(Config {
            values: ConfigValues::load(&path)?,
            path,
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let relay = &mut self.values.relay;

        if let Some(dsn) = overrides.dsn {
            relay.dsn = Some(dsn);
        }

        if let Some(concurrency) = overrides.concurrency {
            relay.concurrency = concurrency
                .parse()
                .map_err(|err| ConfigError::for_field(err, "concurrency"))?;
        }

        if let Some(queue_capacity) = overrides.queue_capacity {
            relay.queue_capacity = queue_capacity
                .parse()
                .map_err(|err| ConfigError::for_field(err, "queue_capacity"))?;
        }

        if let Some(overflow_threshold) = overrides.overflow_threshold {
            relay.overflow_threshold = Some(
                overflow_threshold
                    .parse()
                    .map_err(|err| ConfigError::for_field(err, "overflow_threshold"))?,
            );
        }

        if let Some(send_failure) = overrides.send_failure {
            relay.send_failure = send_failure
                .parse()
                .map_err(|err| ConfigError::for_field(err, "send_failure"))?;
        }

        Ok(self)
    }

    /// Returns the path of the config folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the relay pipeline section.
    pub fn relay(&self) -> &Relay {
        &self.values.relay
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Builds and validates the configuration of the relay sink.
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let relay = &self.values.relay;
        let dsn = relay
            .dsn
            .as_deref()
            .filter(|dsn| !dsn.is_empty())
            .ok_or_else(|| ConfigError::new(ConfigErrorKind::MissingDsn))?;

        let mut config = RelayConfig::new(dsn)
            .concurrency(relay.concurrency)
            .queue_capacity(relay.queue_capacity)
            .send_failure(relay.send_failure);

        if let Some(overflow_threshold) = relay.overflow_threshold {
            config = config.overflow_threshold(overflow_threshold);
        }

        config
            .validate()
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::InvalidValue))
    }
}
