//! Application constants for the measurement merger
//!
//! Default values, file names and wire-format markers used throughout
//! the merger.

// =============================================================================
// Settings and Output Files
// =============================================================================

/// Settings file created by the bootstrap wizard, next to the executable
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// Default results log name, resolved relative to the settings file
pub const DEFAULT_RESULTS_FILE_NAME: &str = "result.csv";

/// Extension of station result files (compared case-insensitively)
pub const DEFAULT_RESULT_EXTENSION: &str = "csv";

// =============================================================================
// Polling
// =============================================================================

/// Seconds between poll cycles
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// Seconds before an HTTP register request is abandoned
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Register value meaning "no part currently checked"
pub const NO_PART_ID: i64 = 0;

// =============================================================================
// Register Dump Format
// =============================================================================

pub mod registers {
    /// Path of the numeric register dump on the controller
    pub const DUMP_PATH: &str = "MD/NUMREG.VA";

    /// Marker on the line that precedes the register entries
    pub const HEADER_MARKER: &str = "OF Numeric Reg";

    /// Number of entries taken after the header marker
    pub const ENTRY_COUNT: usize = 201;

    /// Register holding the part ID checked by the marposs station
    pub const DEFAULT_MARPOSS_REGISTER: usize = 1;

    /// Register holding the part ID checked by the kogame station
    pub const DEFAULT_KOGAME_REGISTER: usize = 2;
}

// =============================================================================
// Results Log Format
// =============================================================================

pub mod results {
    /// Field delimiter of the results log
    pub const DELIMITER: u8 = b';';

    /// Timestamp format of the first column
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Characters that split a raw station line into fields; both fold into the log delimiter
    pub const SOURCE_SEPARATORS: [char; 2] = [',', ';'];

    /// Decimal separator written to the results log
    pub const DECIMAL_SEPARATOR: char = ',';
}

// =============================================================================
// Tail Reading
// =============================================================================

/// Block size for backward reads from the end of a result file
pub const TAIL_CHUNK_SIZE: usize = 1024;
