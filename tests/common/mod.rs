use moviedb::SessionFactory;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const FIXTURE_CONFIG: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/persistence.toml"
);

pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
}

/// Session factory over the small bundled store
#[allow(dead_code)]
pub fn fixture() -> moviedb::Result<SessionFactory> {
    SessionFactory::from_config(Path::new(FIXTURE_CONFIG), "fixture")
}

/// Config file used for the full movie store, overridable through MOVIEDB_CONFIG
#[allow(dead_code)]
pub fn full_config() -> PathBuf {
    std::env::var_os("MOVIEDB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("persistence.toml"))
}
