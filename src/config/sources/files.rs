//! File sources: the global config.toml and a working-directory findoc.toml.

use crate::config::paths;
use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = "findoc.toml";

/// Add the global config file if the platform directory resolves.
pub fn add_global_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match paths::global_config_path() {
        Ok(path) => builder.add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping global config file");
            builder
        }
    }
}

/// Add `<working_dir>/findoc.toml` when present.
pub fn add_local_file(
    builder: ConfigBuilder<DefaultState>,
    working_dir: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        File::from(working_dir.join(LOCAL_CONFIG_FILE))
            .format(FileFormat::Toml)
            .required(false),
    )
}
