//! Logging
//!
//! One `tracing` subscriber per process, built from the `[logging]` config
//! table. `FINDOC_LOG` replaces the whole filter; the other `FINDOC_LOG_*`
//! variables override single fields.

use crate::config::paths;
use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// HTTP stack crates that are chatty at `debug` and below.
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper", "reqwest", "h2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(OrchestratorError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOutput {
    #[serde(rename = "stdout")]
    Stdout,
    #[serde(rename = "stderr")]
    Stderr,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "file+stderr")]
    FileAndStderr,
    #[serde(rename = "both")]
    Both,
}

impl LogOutput {
    fn stdout(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }

    fn stderr(self) -> bool {
        matches!(self, LogOutput::Stderr | LogOutput::FileAndStderr | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }
}

impl FromStr for LogOutput {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(OrchestratorError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr' or 'both')",
                other
            ))),
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
            LogOutput::File => "file",
            LogOutput::FileAndStderr => "file+stderr",
            LogOutput::Both => "both",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: LogFormat,

    #[serde(default = "default_output")]
    pub output: LogOutput,

    /// Used when `output` includes a file. Defaults to `findoc.log` in the state dir.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// ANSI colors for text output on a terminal stream.
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-target levels, e.g. `"findoc::monitor" = "debug"`.
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> LogFormat {
    LogFormat::Text
}

fn default_output() -> LogOutput {
    LogOutput::Stderr
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Apply `FINDOC_LOG_FORMAT`, `FINDOC_LOG_OUTPUT`, `FINDOC_LOG_FILE` and
    /// `FINDOC_LOG_MODULES` (comma-separated `target=level` pairs).
    pub fn with_env_overrides(self) -> Result<Self, OrchestratorError> {
        self.with_overrides_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OrchestratorError> {
        if let Some(format) = lookup("FINDOC_LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Some(output) = lookup("FINDOC_LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Some(file) = lookup("FINDOC_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(modules) = lookup("FINDOC_LOG_MODULES") {
            for spec in modules.split(',') {
                if let Some((target, level)) = spec.split_once('=') {
                    self.modules
                        .insert(target.trim().to_string(), level.trim().to_string());
                }
            }
        }
        Ok(self)
    }

    pub fn log_file_path(&self) -> Result<PathBuf, OrchestratorError> {
        match &self.file {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Ok(paths::state_dir()?.join("findoc.log")),
        }
    }

    /// Filter directives: the base level, quiet HTTP crates, then per-target levels.
    fn directives(&self) -> Vec<String> {
        let mut directives = vec![self.level.clone()];
        if self.level != "off" {
            directives.extend(QUIET_DEPENDENCIES.iter().map(|krate| format!("{}=warn", krate)));
        }
        directives.extend(
            self.modules
                .iter()
                .map(|(target, level)| format!("{}={}", target, level)),
        );
        directives
    }

    fn env_filter(&self) -> Result<EnvFilter, OrchestratorError> {
        if let Ok(filter) = EnvFilter::try_from_env("FINDOC_LOG") {
            return Ok(filter);
        }
        let mut directives = self.directives().into_iter();
        let mut filter = EnvFilter::new(directives.next().unwrap_or_default());
        for directive in directives {
            filter = filter.add_directive(directive.parse().map_err(|e| {
                OrchestratorError::ConfigError(format!("Invalid log directive {}: {}", directive, e))
            })?);
        }
        Ok(filter)
    }

    fn writer(&self) -> Result<BoxMakeWriter, OrchestratorError> {
        let output = self.output;
        if output.file() {
            let file = open_log_file(&self.log_file_path()?)?;
            return Ok(if output.stderr() {
                BoxMakeWriter::new(file.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file)
            });
        }
        Ok(match (output.stdout(), output.stderr()) {
            (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (true, false) => BoxMakeWriter::new(std::io::stdout),
            _ => BoxMakeWriter::new(std::io::stderr),
        })
    }
}

/// Install the global subscriber. `None` means defaults plus environment.
///
/// A second call in the same process leaves the first subscriber in place.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), OrchestratorError> {
    let config = config.cloned().unwrap_or_default().with_env_overrides()?;
    if !config.enabled {
        let _ = Registry::default().with(EnvFilter::new("off")).try_init();
        return Ok(());
    }

    let filter = config.env_filter()?;
    let writer = config.writer()?;
    let registry = Registry::default().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                layer_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                layer_fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color && !config.output.file())
                    .with_writer(writer),
            )
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<Arc<std::fs::File>, OrchestratorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            OrchestratorError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            OrchestratorError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e))
        })?;
    Ok(Arc::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_output_destinations() {
        let both: LogOutput = "both".parse().unwrap();
        assert!(both.stdout() && both.stderr() && !both.file());

        let tee: LogOutput = "file+stderr".parse().unwrap();
        assert!(!tee.stdout() && tee.stderr() && tee.file());
        assert_eq!(tee.to_string(), "file+stderr");

        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_toml_table_deserializes() {
        let config: LoggingConfig = toml::from_str(
            "format = \"json\"\noutput = \"file+stderr\"\n[modules]\n\"findoc::monitor\" = \"debug\"\n",
        )
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::FileAndStderr);
        assert_eq!(config.modules["findoc::monitor"], "debug");
    }

    #[test]
    fn test_env_overrides_fields() {
        let config = LoggingConfig::default()
            .with_overrides_from(lookup(&[
                ("FINDOC_LOG_FORMAT", "JSON"),
                ("FINDOC_LOG_OUTPUT", "file"),
                ("FINDOC_LOG_FILE", "/tmp/findoc-test.log"),
                ("FINDOC_LOG_MODULES", "findoc::router=trace, findoc::agent = warn"),
            ]))
            .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.log_file_path().unwrap(), PathBuf::from("/tmp/findoc-test.log"));
        assert_eq!(config.modules["findoc::router"], "trace");
        assert_eq!(config.modules["findoc::agent"], "warn");
    }

    #[test]
    fn test_invalid_env_format_is_rejected() {
        let result = LoggingConfig::default()
            .with_overrides_from(lookup(&[("FINDOC_LOG_FORMAT", "yaml")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_directives_quiet_http_crates_unless_off() {
        let mut config = LoggingConfig::default();
        config.modules.insert("findoc::monitor".into(), "debug".into());
        let directives = config.directives();
        assert_eq!(directives[0], "info");
        assert!(directives.contains(&"reqwest=warn".to_string()));
        assert_eq!(directives.last().map(String::as_str), Some("findoc::monitor=debug"));

        config.level = "off".to_string();
        config.modules.clear();
        assert_eq!(config.directives(), vec!["off".to_string()]);
    }

    #[test]
    fn test_default_log_file_lives_in_state_dir() {
        let path = LoggingConfig::default().log_file_path().unwrap();
        assert!(path.ends_with("findoc.log"));
    }
}
