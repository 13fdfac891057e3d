//! Configuration consumed by `ProcessLifecycleController::create`.
//!
//! ```yaml
//! loggerHint: default        # default | compact | json
//! logDirectory: /var/log/ember
//! consoleCaptureEnabled: true
//! ```
//!
//! Unknown keys are rejected.

use ember_common::{ProcessError, ProcessResult};
use ember_logging::{
    BootstrapLogging, FormatterSpec, LogLevel, COMPACT_PATTERN, DEFAULT_PATTERN, SERVER_LOG,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod validation;

pub use validation::validate_configuration;

/// Selects the logging provider a server uses before its management tree
/// accepts operations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoggerHint {
    #[default]
    Default,
    Compact,
    Json,
}

impl LoggerHint {
    pub fn formatter(&self) -> FormatterSpec {
        match self {
            LoggerHint::Default => FormatterSpec::Pattern(DEFAULT_PATTERN.to_string()),
            LoggerHint::Compact => FormatterSpec::Pattern(COMPACT_PATTERN.to_string()),
            LoggerHint::Json => FormatterSpec::Json,
        }
    }
}

impl fmt::Display for LoggerHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerHint::Default => write!(f, "default"),
            LoggerHint::Compact => write!(f, "compact"),
            LoggerHint::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LoggerHint {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(LoggerHint::Default),
            "compact" => Ok(LoggerHint::Compact),
            "json" => Ok(LoggerHint::Json),
            _ => Err(ProcessError::configuration(format!(
                "Unknown logger hint '{}', must be one of: default, compact, json",
                s
            ))),
        }
    }
}

/// Embedded server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub logger_hint: LoggerHint,

    /// Base directory for `server.log` and relative handler paths.
    pub log_directory: PathBuf,

    /// Whether the host captures stdout/stderr and expects them to stay
    /// empty. When disabled the server also logs to the console.
    #[serde(default = "default_console_capture_enabled")]
    pub console_capture_enabled: bool,
}

fn default_console_capture_enabled() -> bool {
    true
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Load configuration from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> ProcessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProcessError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> ProcessResult<Self> {
        let config: Configuration = serde_yaml::from_str(content).map_err(|e| {
            ProcessError::configuration(format!("Failed to parse YAML config: {}", e))
        })?;
        validate_configuration(&config)?;
        Ok(config)
    }

    /// Build from string options as handed over by a test harness or CLI.
    pub fn from_options<I, K, V>(options: I) -> ProcessResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = Configuration::builder();
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            builder = match key {
                "loggerHint" => builder.logger_hint(value.parse()?),
                "logDirectory" => builder.log_directory(value),
                "consoleCaptureEnabled" => {
                    let enabled = value.parse::<bool>().map_err(|_| {
                        ProcessError::configuration(format!(
                            "consoleCaptureEnabled must be true or false, got '{}'",
                            value
                        ))
                    })?;
                    builder.console_capture_enabled(enabled)
                }
                other => {
                    return Err(ProcessError::configuration(format!(
                        "Unrecognized option '{}'",
                        other
                    )))
                }
            };
        }
        builder.build()
    }

    pub fn to_yaml(&self) -> ProcessResult<String> {
        serde_yaml::to_string(self).map_err(|e| {
            ProcessError::configuration(format!("Failed to serialize config: {}", e))
        })
    }

    /// Logging installed by the server at boot.
    pub fn bootstrap_logging(&self) -> BootstrapLogging {
        BootstrapLogging {
            formatter: self.logger_hint.formatter(),
            level: LogLevel::Info,
            file_name: SERVER_LOG.to_string(),
            console: !self.console_capture_enabled,
        }
    }

    pub fn server_log_path(&self) -> PathBuf {
        self.log_directory.join(SERVER_LOG)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    logger_hint: LoggerHint,
    log_directory: Option<PathBuf>,
    console_capture_enabled: Option<bool>,
}

impl ConfigurationBuilder {
    pub fn logger_hint(mut self, hint: LoggerHint) -> Self {
        self.logger_hint = hint;
        self
    }

    pub fn log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(dir.into());
        self
    }

    pub fn console_capture_enabled(mut self, enabled: bool) -> Self {
        self.console_capture_enabled = Some(enabled);
        self
    }

    pub fn build(self) -> ProcessResult<Configuration> {
        let log_directory = self
            .log_directory
            .ok_or_else(|| ProcessError::configuration("logDirectory is required"))?;
        let config = Configuration {
            logger_hint: self.logger_hint,
            log_directory,
            console_capture_enabled: self
                .console_capture_enabled
                .unwrap_or_else(default_console_capture_enabled),
        };
        validate_configuration(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
loggerHint: compact
logDirectory: /tmp/ember/log
"#;
        let config = Configuration::from_yaml_str(yaml).unwrap();
        assert_eq!(config.logger_hint, LoggerHint::Compact);
        assert_eq!(config.log_directory, PathBuf::from("/tmp/ember/log"));
        assert!(config.console_capture_enabled);
        assert_eq!(
            config.server_log_path(),
            PathBuf::from("/tmp/ember/log/server.log")
        );
    }

    #[test]
    fn test_unknown_yaml_key_rejected() {
        let yaml = r#"
logDirectory: /tmp/ember/log
colorOutput: true
"#;
        let err = Configuration::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ProcessError::Configuration { .. }));
        assert!(err.to_string().contains("colorOutput"));
    }

    #[test]
    fn test_unknown_hint_rejected() {
        let yaml = "loggerHint: log4j\nlogDirectory: /tmp/x\n";
        assert!(Configuration::from_yaml_str(yaml).is_err());
        assert!(matches!(
            "log4j".parse::<LoggerHint>(),
            Err(ProcessError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_options() {
        let options = HashMap::from([
            ("loggerHint", "json"),
            ("logDirectory", "/tmp/ember"),
            ("consoleCaptureEnabled", "false"),
        ]);
        let config = Configuration::from_options(options).unwrap();
        assert_eq!(config.logger_hint, LoggerHint::Json);
        assert!(!config.console_capture_enabled);
        assert!(config.bootstrap_logging().console);
        assert_eq!(config.bootstrap_logging().formatter, FormatterSpec::Json);

        let err = Configuration::from_options([("logDir", "/tmp")]).unwrap_err();
        assert!(err.to_string().contains("Unrecognized option 'logDir'"));

        let err =
            Configuration::from_options([("logDirectory", "/tmp"), ("consoleCaptureEnabled", "yes")])
                .unwrap_err();
        assert!(matches!(err, ProcessError::Configuration { .. }));
    }

    #[test]
    fn test_builder_requires_log_directory() {
        assert!(Configuration::builder().build().is_err());

        let config = Configuration::builder()
            .log_directory("/tmp/ember")
            .build()
            .unwrap();
        assert_eq!(config.logger_hint, LoggerHint::Default);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(Configuration::from_yaml_str(&yaml).unwrap(), config);
    }
}
