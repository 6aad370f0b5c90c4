use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Settings for talking to the KYC backend.
///
/// The configuration lives in `config.toml` inside the state directory. A
/// missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Versions", into = "Versions")]
pub struct Config {
    /// Origin of the backend, for example `http://localhost:8080`.
    ///
    /// The API lives under `/api` on this origin.
    pub server: String,

    /// Delay between screening status polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Give up waiting on a screening after this many seconds.
    ///
    /// Zero waits forever.
    pub poll_timeout_secs: u64,

    /// Default page size for paged listings.
    pub page_size: u32,

    /// Timeout applied to every HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Directory that exports are written to.
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            export_dir: default_export_dir(),
        }
    }
}

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read or written.
    #[error("failed to access config file {path}: {source}")]
    Io {
        /// Location of the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The file is not a valid configuration document.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Location of the file.
        path: PathBuf,
        /// TOML decoder error.
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `config set` was given a key that does not exist.
    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    /// A setting holds a value it cannot take, either from `config set` or
    /// from the file.
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue {
        /// The key being set.
        key: String,
        /// The rejected value.
        value: String,
    },
}

impl Config {
    /// Names of the keys accepted by [`Config::get`] and [`Config::set`].
    pub const KEYS: [&'static str; 6] = [
        "server",
        "poll_interval_ms",
        "poll_timeout_secs",
        "page_size",
        "request_timeout_secs",
        "export_dir",
    ];

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, if the TOML content is
    /// invalid, or if a setting is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration, falling back to the defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The base URL of the REST API (`<server>/api`).
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/api", self.server.trim_end_matches('/'))
    }

    /// Interval between screening status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Overall limit on waiting for a screening, if any.
    #[must_use]
    pub const fn poll_timeout(&self) -> Option<Duration> {
        if self.poll_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.poll_timeout_secs))
        }
    }

    /// Timeout applied to each HTTP request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reads a single setting as a display string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] for names not in [`Config::KEYS`].
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        Ok(match key {
            "server" => self.server.clone(),
            "poll_interval_ms" => self.poll_interval_ms.to_string(),
            "poll_timeout_secs" => self.poll_timeout_secs.to_string(),
            "page_size" => self.page_size.to_string(),
            "request_timeout_secs" => self.request_timeout_secs.to_string(),
            "export_dir" => self.export_dir.display().to_string(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        })
    }

    /// Updates a single setting from its string form.
    ///
    /// The setting is only changed when the result passes
    /// [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, unparseable numbers and values
    /// rejected by [`Config::validate`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let number = |value: &str| value.trim().parse::<u64>().map_err(|_| invalid());

        let mut updated = self.clone();
        match key {
            "server" => updated.server = value.trim_end_matches('/').to_string(),
            "poll_interval_ms" => updated.poll_interval_ms = number(value)?,
            "poll_timeout_secs" => updated.poll_timeout_secs = number(value)?,
            "page_size" => updated.page_size = u32::try_from(number(value)?).map_err(|_| invalid())?,
            "request_timeout_secs" => updated.request_timeout_secs = number(value)?,
            "export_dir" => updated.export_dir = PathBuf::from(value),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Checks that every setting is usable.
    ///
    /// The server must be an `http://` or `https://` origin. The poll
    /// interval, page size and request timeout must be non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        };

        if !(self.server.starts_with("http://") || self.server.starts_with("https://")) {
            return Err(invalid("server", self.server.clone()));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "0".to_string()));
        }
        if self.page_size == 0 {
            return Err(invalid("page_size", "0".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "0".to_string()));
        }
        Ok(())
    }
}

fn default_server() -> String {
    "http://localhost:8080".to_string()
}

const fn default_poll_interval_ms() -> u64 {
    2000
}

const fn default_poll_timeout_secs() -> u64 {
    300
}

const fn default_page_size() -> u32 {
    10
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_server")]
        server: String,

        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,

        #[serde(default = "default_poll_timeout_secs")]
        poll_timeout_secs: u64,

        #[serde(default = "default_page_size")]
        page_size: u32,

        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,

        #[serde(default = "default_export_dir")]
        export_dir: PathBuf,
    },
}

impl TryFrom<Versions> for Config {
    type Error = ConfigError;

    fn try_from(versions: Versions) -> Result<Self, Self::Error> {
        let config = match versions {
            Versions::V1 {
                server,
                poll_interval_ms,
                poll_timeout_secs,
                page_size,
                request_timeout_secs,
                export_dir,
            } => Self {
                server,
                poll_interval_ms,
                poll_timeout_secs,
                page_size,
                request_timeout_secs,
                export_dir,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            server: config.server,
            poll_interval_ms: config.poll_interval_ms,
            poll_timeout_secs: config.poll_timeout_secs,
            page_size: config.page_size,
            request_timeout_secs: config.request_timeout_secs,
            export_dir: config.export_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use test_case::test_case;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nserver = \"https://kyc.example.com\"\npoll_interval_ms = 500\npage_size = 25\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server, "https://kyc.example.com");
        assert_eq!(config.api_base(), "https://kyc.example.com/api");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("config.toml");

        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\npage_size = \"ten\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_file_returns_default() {
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, Config::default());
        assert_eq!(actual.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.set("server", "http://10.0.0.5:9000/").unwrap();
        config.set("poll_timeout_secs", "0").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server, "http://10.0.0.5:9000");
        assert_eq!(loaded.poll_timeout(), None);
    }

    #[test_case("poll_interval_ms = 0"; "zero poll interval")]
    #[test_case("page_size = 0"; "zero page size")]
    #[test_case("request_timeout_secs = 0"; "zero request timeout")]
    #[test_case("server = \"localhost:8080\""; "server without scheme")]
    fn load_rejects_out_of_range_values(line: &str) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "_version = \"1\"\n{line}").unwrap();

        let error = Config::load(file.path()).unwrap_err();

        assert!(matches!(error, ConfigError::Parse { .. }));
        let key = line.split(' ').next().unwrap();
        assert!(error.to_string().contains(&format!("for '{key}'")), "{error}");
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("page_size", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("server", "localhost"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("request_timeout_secs", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config, Config::default());
        assert!(matches!(
            config.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
        for key in Config::KEYS {
            assert!(config.get(key).is_ok());
        }
    }
}
