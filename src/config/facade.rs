//! ConfigLoader facade delegating to the merge service.

use super::merge::MergeService;
use super::FindocConfig;
use crate::error::OrchestratorError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, `./findoc.toml` and the environment.
    pub fn load() -> Result<FindocConfig, OrchestratorError> {
        let config = MergeService::load(Path::new("."))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration rooted at a working directory.
    pub fn load_in(working_dir: &Path) -> Result<FindocConfig, OrchestratorError> {
        let config = MergeService::load(working_dir)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<FindocConfig, OrchestratorError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> FindocConfig {
        FindocConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[factory]\nmax_retry_attempts = 5\n\n[monitor]\ncheck_interval_secs = 15\n"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.factory.max_retry_attempts, 5);
        assert_eq!(config.monitor.check_interval_secs, 15);
        assert_eq!(config.generation.default_model, "openai:gpt-4o-mini");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load_from_file(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
