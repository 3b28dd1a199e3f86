//! Environment variable source: FINDOC_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Add environment variable overlay to builder.
/// Uses FINDOC_ prefix and __ as separator for nested keys, e.g.
/// `FINDOC_FACTORY__MAX_RETRY_ATTEMPTS=5`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("FINDOC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}
