pub mod fake_provider;
pub mod fixtures;

pub use fake_provider::{FakeMetadataProvider, FakeProviderStats};

/// Routes `log` output through `env_logger` for the current test binary.
/// Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
