//! Configuration management and validation.
//!
//! Settings live in a TOML file next to the executable. On first run the
//! file does not exist yet: a template is written for the operator to fill
//! in and the program exits. Loaded settings are validated into a
//! [`MergerConfig`] before the poll loop starts.

use crate::constants::registers::{DEFAULT_KOGAME_REGISTER, DEFAULT_MARPOSS_REGISTER};
use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RESULT_EXTENSION,
    DEFAULT_RESULTS_FILE_NAME, SETTINGS_FILE_NAME,
};
use crate::error::{MergerError, Result};
use crate::models::Station;
use crate::registers::RegisterLayout;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MergerConfig {
    /// Directory tree the marposs station writes results into
    pub marposs_dir: PathBuf,

    /// Directory tree the kogame station writes results into
    pub kogame_dir: PathBuf,

    /// Base address of the cell controller
    pub controller_url: String,

    /// Static register dump read instead of the controller, when set
    pub register_dump: Option<PathBuf>,

    /// Results log the merged rows are appended to
    pub results_path: PathBuf,

    /// Delay between poll cycles
    pub poll_interval: Duration,

    /// Give up on a controller request after this long
    pub http_timeout: Duration,

    /// Register holding the marposs part ID
    pub marposs_register: usize,

    /// Register holding the kogame part ID
    pub kogame_register: usize,

    /// Extension of station result files
    pub extension: String,

    /// Drop unmatched results older than this (zero = keep forever)
    pub max_pending_age: Duration,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            marposs_dir: PathBuf::new(),
            kogame_dir: PathBuf::new(),
            controller_url: String::new(),
            register_dump: None,
            results_path: PathBuf::from(DEFAULT_RESULTS_FILE_NAME),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            marposs_register: DEFAULT_MARPOSS_REGISTER,
            kogame_register: DEFAULT_KOGAME_REGISTER,
            extension: DEFAULT_RESULT_EXTENSION.to_string(),
            max_pending_age: Duration::ZERO,
        }
    }
}

impl MergerConfig {
    /// Create configuration for the given station directories and controller
    pub fn new(
        marposs_dir: PathBuf,
        kogame_dir: PathBuf,
        controller_url: impl Into<String>,
    ) -> Self {
        Self {
            marposs_dir,
            kogame_dir,
            controller_url: controller_url.into(),
            ..Default::default()
        }
    }

    /// Set the results log path
    pub fn with_results_path(mut self, path: PathBuf) -> Self {
        self.results_path = path;
        self
    }

    /// Set the delay between poll cycles
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read registers from a static dump file instead of the controller
    pub fn with_register_dump(mut self, path: PathBuf) -> Self {
        self.register_dump = Some(path);
        self
    }

    /// Set the age after which unmatched results are dropped
    pub fn with_max_pending_age(mut self, age: Duration) -> Self {
        self.max_pending_age = age;
        self
    }

    /// Directory a station writes into
    pub fn station_dir(&self, station: Station) -> &Path {
        match station {
            Station::Marposs => &self.marposs_dir,
            Station::Kogame => &self.kogame_dir,
        }
    }

    pub fn register_layout(&self) -> RegisterLayout {
        RegisterLayout {
            marposs: self.marposs_register,
            kogame: self.kogame_register,
        }
    }

    /// Check everything the poll loop relies on before it starts
    pub fn validate(&self) -> Result<()> {
        for station in Station::ALL {
            let dir = self.station_dir(station);
            if dir.as_os_str().is_empty() {
                return Err(MergerError::configuration(format!(
                    "missing path for '{}'",
                    station.key()
                )));
            }
            if !dir.is_dir() {
                return Err(MergerError::PathValidation {
                    path: dir.to_path_buf(),
                });
            }
        }

        if self.controller_url.trim().is_empty() {
            return Err(MergerError::configuration("missing controller address 'ip'"));
        }

        if self.marposs_register == 0 || self.kogame_register == 0 {
            return Err(MergerError::configuration("register numbers start at 1"));
        }

        if self.poll_interval.is_zero() {
            return Err(MergerError::configuration(
                "poll_interval_secs must be greater than zero",
            ));
        }

        if self.extension.trim().is_empty() {
            return Err(MergerError::configuration("extension must not be empty"));
        }

        Ok(())
    }
}

/// Settings file layout
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    settings: Option<RawSettings>,
}

/// The `[settings]` table as written by the operator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSettings {
    marposs: String,
    kogame: String,
    ip: String,
    poll_interval_secs: u64,
    results_file: String,
    marposs_register: usize,
    kogame_register: usize,
    extension: String,
    register_dump: String,
    http_timeout_secs: u64,
    max_pending_age_secs: u64,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            marposs: String::new(),
            kogame: String::new(),
            ip: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            results_file: DEFAULT_RESULTS_FILE_NAME.to_string(),
            marposs_register: DEFAULT_MARPOSS_REGISTER,
            kogame_register: DEFAULT_KOGAME_REGISTER,
            extension: DEFAULT_RESULT_EXTENSION.to_string(),
            register_dump: String::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_pending_age_secs: 0,
        }
    }
}

impl RawSettings {
    /// Resolve against the settings file directory, rejecting empty required keys
    fn into_config(self, base_dir: &Path) -> Result<MergerConfig> {
        let required = [
            ("marposs", &self.marposs),
            ("kogame", &self.kogame),
            ("ip", &self.ip),
        ];
        if let Some((key, _)) = required
            .iter()
            .find(|(_, value)| clean_value(value).is_empty())
        {
            return Err(MergerError::configuration(format!(
                "missing value for '{}' in settings",
                key
            )));
        }

        let register_dump = clean_value(&self.register_dump);

        Ok(MergerConfig {
            marposs_dir: PathBuf::from(clean_value(&self.marposs)),
            kogame_dir: PathBuf::from(clean_value(&self.kogame)),
            controller_url: clean_value(&self.ip).to_string(),
            register_dump: (!register_dump.is_empty()).then(|| base_dir.join(register_dump)),
            results_path: base_dir.join(clean_value(&self.results_file)),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            marposs_register: self.marposs_register,
            kogame_register: self.kogame_register,
            extension: clean_value(&self.extension)
                .trim_start_matches('.')
                .to_string(),
            max_pending_age: Duration::from_secs(self.max_pending_age_secs),
        })
    }
}

/// Outcome of looking for the settings file
#[derive(Debug, Clone)]
pub enum SettingsLoad {
    /// Settings were present and valid
    Loaded(MergerConfig),
    /// No settings existed; a template was written at this path
    Bootstrapped(PathBuf),
}

/// Settings file next to the running executable, or in the working directory
pub fn default_settings_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
        .join(SETTINGS_FILE_NAME)
}

/// Load and validate the settings at `path`, writing a template if it is absent
pub fn load_or_bootstrap(path: &Path) -> Result<SettingsLoad> {
    if !path.exists() {
        info!("Settings file {} not found, creating template", path.display());
        write_template(path)?;
        return Ok(SettingsLoad::Bootstrapped(path.to_path_buf()));
    }

    load_settings(path).map(SettingsLoad::Loaded)
}

/// Load and validate the settings at `path`
pub fn load_settings(path: &Path) -> Result<MergerConfig> {
    let text = fs::read_to_string(path)?;
    let file: SettingsFile =
        toml::from_str(&text).map_err(|source| MergerError::SettingsFormat {
            path: path.to_path_buf(),
            source,
        })?;

    let raw = file.settings.ok_or_else(|| {
        MergerError::configuration(format!("no [settings] table in {}", path.display()))
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = raw.into_config(base_dir)?;
    config.validate()?;

    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

/// Write an editable settings template with the required keys left empty
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, settings_template())?;
    Ok(())
}

fn settings_template() -> String {
    format!(
        "\
# Measurement merger settings
#
# marposs, kogame: folders the stations write their result files into
# ip: address of the cell controller serving MD/NUMREG.VA
# Use single quotes so Windows paths need no escaping, e.g. 'D:\\Marposs\\Results'

[settings]
marposs = ''
kogame = ''
ip = ''

# Optional settings
# poll_interval_secs = {poll}
# results_file = '{results}'
# marposs_register = {marposs_register}
# kogame_register = {kogame_register}
# extension = '{extension}'
# register_dump = ''
# http_timeout_secs = {timeout}
# max_pending_age_secs = 0
",
        poll = DEFAULT_POLL_INTERVAL_SECS,
        results = DEFAULT_RESULTS_FILE_NAME,
        marposs_register = DEFAULT_MARPOSS_REGISTER,
        kogame_register = DEFAULT_KOGAME_REGISTER,
        extension = DEFAULT_RESULT_EXTENSION,
        timeout = DEFAULT_HTTP_TIMEOUT_SECS,
    )
}

/// Trim whitespace and stray double quotes pasted around a value
fn clean_value(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}
