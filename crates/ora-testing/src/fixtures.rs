//! Test fixture utilities.

use ora_client::{Driver, DriverConfig, Result};

use crate::mock_native::MockNative;

/// Connect string using database authentication.
pub const DATABASE_CONNECT: &str = "scott/tiger@orcl";

/// Connect string using external authentication.
pub const EXTERNAL_CONNECT: &str = "/@orcl";

/// Create a driver over a fresh mock, returning both.
///
/// The mock shares state with the copy inside the driver, so the returned
/// handle sees every call the driver makes.
#[must_use]
pub fn driver_with_mock() -> (Driver, MockNative) {
    let native = MockNative::new();
    (Driver::new(native.clone()), native)
}

/// Create a driver with custom configuration over a fresh mock.
pub fn driver_with_config(config: DriverConfig) -> Result<(Driver, MockNative)> {
    let native = MockNative::new();
    let driver = Driver::with_config(native.clone(), config)?;
    Ok((driver, native))
}

/// Route `tracing` output to the test harness.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Set `RUST_LOG` to control verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
