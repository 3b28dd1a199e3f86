//! MergeService: orchestrates sources, applies precedence, deserializes to FindocConfig.

use crate::config::sources::{environment, files};
use crate::config::FindocConfig;
use crate::error::OrchestratorError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> global file -> working-dir file -> environment (highest).
    pub fn load(working_dir: &Path) -> Result<FindocConfig, OrchestratorError> {
        let builder = Self::builder_with_defaults()?;
        let builder = files::add_global_file(builder);
        let builder = files::add_local_file(builder, working_dir);
        let builder = environment::add_to_builder(builder);

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<FindocConfig, OrchestratorError> {
        if !path.exists() {
            return Err(OrchestratorError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = Self::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        let builder = environment::add_to_builder(builder);

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, OrchestratorError> {
        let defaults = Config::try_from(&FindocConfig::default())?;
        Ok(Config::builder().add_source(defaults))
    }
}
