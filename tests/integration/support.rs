use findoc::config::FindocConfig;
use findoc::Services;
use tempfile::TempDir;

/// Offline services rooted in a fresh temp dir. Keep the dir alive for the test.
pub fn offline_services() -> (TempDir, Services) {
    let dir = TempDir::new().unwrap();
    let mut config = FindocConfig::default().rooted_at(dir.path());
    config.factory.retry_delay_ms = 1;
    config.ensure_directories_exist().unwrap();
    let services = Services::bootstrap(config).unwrap();
    (dir, services)
}

pub const ISM_REQUEST: &str =
    "Create an investor summary for principal protected notes issued by Acme Bank linked to the S&P 500 Index";
