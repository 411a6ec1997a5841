//! Client configuration.

use ora_driver_pool::PoolConfig;

use crate::error::{Error, Result};

/// Default number of rows prefetched per round trip.
pub const DEFAULT_PREFETCH_ROWS: u32 = 0;

/// Default prefetch memory budget in bytes (128 MiB).
pub const DEFAULT_PREFETCH_MEMORY: u32 = 128 * 1024 * 1024;

/// Default buffer size for LONG and LONG RAW columns in bytes (16 MiB).
pub const DEFAULT_LONG_BUFFER_SIZE: u32 = 16 * 1024 * 1024;

/// Default buffer size for character columns in bytes.
pub const DEFAULT_STRING_BUFFER_SIZE: u32 = 4000;

/// Statement defaults carried down the resource hierarchy.
///
/// An environment holds the default; servers take a copy when they open and
/// sessions take a copy from their server. Changing the environment's
/// default through
/// [`Environment::set_statement_config`](crate::Environment::set_statement_config)
/// pushes the new value to every open server.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct StatementConfig {
    /// Rows prefetched per round trip (0 lets the native layer decide).
    pub prefetch_rows: u32,
    /// Memory budget for prefetched rows, in bytes.
    pub prefetch_memory: u32,
    /// Buffer size for LONG and LONG RAW columns, in bytes.
    pub long_buffer_size: u32,
    /// Buffer size for character columns, in bytes.
    pub string_buffer_size: u32,
    /// Whether statements commit automatically.
    pub auto_commit: bool,
    /// Character stored for `true` in a CHAR(1) boolean column.
    pub true_char: char,
    /// Character stored for `false` in a CHAR(1) boolean column.
    pub false_char: char,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            prefetch_rows: DEFAULT_PREFETCH_ROWS,
            prefetch_memory: DEFAULT_PREFETCH_MEMORY,
            long_buffer_size: DEFAULT_LONG_BUFFER_SIZE,
            string_buffer_size: DEFAULT_STRING_BUFFER_SIZE,
            auto_commit: true,
            true_char: 'T',
            false_char: 'F',
        }
    }
}

impl StatementConfig {
    /// Create a statement configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefetch row count.
    #[must_use]
    pub fn prefetch_rows(mut self, rows: u32) -> Self {
        self.prefetch_rows = rows;
        self
    }

    /// Set the prefetch memory budget.
    #[must_use]
    pub fn prefetch_memory(mut self, bytes: u32) -> Self {
        self.prefetch_memory = bytes;
        self
    }

    /// Set the LONG column buffer size.
    #[must_use]
    pub fn long_buffer_size(mut self, bytes: u32) -> Self {
        self.long_buffer_size = bytes;
        self
    }

    /// Set the character column buffer size.
    #[must_use]
    pub fn string_buffer_size(mut self, bytes: u32) -> Self {
        self.string_buffer_size = bytes;
        self
    }

    /// Enable or disable auto-commit.
    #[must_use]
    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    /// Set the characters used for CHAR(1) booleans.
    #[must_use]
    pub fn bool_chars(mut self, true_char: char, false_char: char) -> Self {
        self.true_char = true_char;
        self.false_char = false_char;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.long_buffer_size == 0 {
            return Err(Error::Config("long_buffer_size must be greater than 0".into()));
        }
        if self.string_buffer_size == 0 {
            return Err(Error::Config(
                "string_buffer_size must be greater than 0".into(),
            ));
        }
        if self.true_char == self.false_char {
            return Err(Error::Config(
                "true_char and false_char must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Driver-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DriverConfig {
    /// Configuration shared by every resource pool.
    pub pool: PoolConfig,
    /// Statement defaults every new environment starts with.
    pub statement: StatementConfig,
}

impl DriverConfig {
    /// Create a driver configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource pool configuration.
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the statement defaults for new environments.
    #[must_use]
    pub fn statement(mut self, statement: StatementConfig) -> Self {
        self.statement = statement;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.statement.validate()
    }
}
