//! Numeric register snapshots read from the cell controller.
//!
//! The controller publishes its numeric registers as a text dump. Each
//! station's current part ID lives in a fixed register; this module fetches
//! the dump (over HTTP or from a file) and extracts those two values.

use crate::constants::registers::{DUMP_PATH, ENTRY_COUNT, HEADER_MARKER};
use crate::error::{MergerError, Result};
use crate::models::StationIds;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("register label pattern is valid"));

/// Something that can produce the raw register dump text
pub trait RegisterSource {
    /// Where the dump comes from, for log messages
    fn describe(&self) -> String;

    /// Retrieve the current dump
    fn fetch(&self) -> Result<String>;
}

impl<T: RegisterSource + ?Sized> RegisterSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn fetch(&self) -> Result<String> {
        (**self).fetch()
    }
}

/// Live register dump served by the controller's web server
#[derive(Debug)]
pub struct HttpRegisterSource {
    url: String,
    agent: ureq::Agent,
}

impl HttpRegisterSource {
    /// Create a source for the controller at `base_url`, abandoning requests after `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: dump_url(base_url),
            agent,
        }
    }
}

impl RegisterSource for HttpRegisterSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<String> {
        let response =
            self.agent
                .get(&self.url)
                .call()
                .map_err(|e| MergerError::RegisterFetch {
                    url: self.url.clone(),
                    source: Box::new(e),
                })?;
        Ok(response.into_string()?)
    }
}

/// Register dump kept in a file, re-read on every fetch
#[derive(Debug, Clone)]
pub struct FileRegisterSource {
    path: PathBuf,
}

impl FileRegisterSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RegisterSource for FileRegisterSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

/// Build the dump URL from the configured controller address
pub fn dump_url(base_url: &str) -> String {
    let base = base_url.trim().trim_matches('"').trim_end_matches('/');
    if base.contains("://") {
        format!("{}/{}", base, DUMP_PATH)
    } else {
        format!("http://{}/{}", base, DUMP_PATH)
    }
}

/// Register entries following the header marker of a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDump {
    entries: Vec<String>,
}

impl RegisterDump {
    /// Parse the entries that follow the `OF Numeric Reg` header line
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();

        if !lines.any(|line| line.contains(HEADER_MARKER)) {
            return Err(MergerError::register_parse(format!(
                "header marker '{}' not found",
                HEADER_MARKER
            )));
        }

        let entries: Vec<String> = lines
            .map(clean_line)
            .filter(|line| !line.is_empty())
            .take(ENTRY_COUNT)
            .collect();

        if entries.is_empty() {
            return Err(MergerError::register_parse(
                "no register entries after header marker",
            ));
        }

        debug!("Parsed {} register entries", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Integer value of a register (1-based).
    ///
    /// Entries carrying a `[n]` label are matched by label; unlabeled dumps
    /// are indexed by position.
    pub fn value(&self, register: usize) -> Result<i64> {
        let labeled = self.entries.iter().any(|entry| label_of(entry).is_some());

        let entry = if labeled {
            self.entries
                .iter()
                .find(|entry| label_of(entry) == Some(register))
        } else {
            register
                .checked_sub(1)
                .and_then(|index| self.entries.get(index))
        };

        let entry = entry.ok_or_else(|| {
            MergerError::register_parse(format!("register {} not present in dump", register))
        })?;

        parse_value(entry).ok_or_else(|| {
            MergerError::register_parse(format!(
                "register {} has no integer value: '{}'",
                register, entry
            ))
        })
    }
}

/// Which register carries each station's current part ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLayout {
    pub marposs: usize,
    pub kogame: usize,
}

impl RegisterLayout {
    /// Read both stations' part IDs from a dump
    pub fn read_ids(&self, dump: &RegisterDump) -> Result<StationIds> {
        Ok(StationIds::new(
            dump.value(self.marposs)?,
            dump.value(self.kogame)?,
        ))
    }
}

/// Strip escaped line continuations and wrapping quotes from a dump line
fn clean_line(raw: &str) -> String {
    let line = raw.replace("\\n", "").replace("\\r", "").replace("\\\"", "\"");
    line.trim()
        .trim_end_matches('\\')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn label_of(entry: &str) -> Option<usize> {
    let head = entry.split('=').next()?;
    LABEL_PATTERN
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Value after the last `=` that precedes the trailing comment quote
fn parse_value(entry: &str) -> Option<i64> {
    let code = entry.split(['\'', '"']).next().unwrap_or_default();
    let (_, value) = code.rsplit_once('=')?;
    let value = value.trim();

    if let Ok(number) = value.parse::<i64>() {
        return Some(number);
    }

    // Real registers holding whole numbers print as e.g. `41.000000`
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.fract() == 0.0 && number.is_finite())
        .map(|number| number as i64)
}
