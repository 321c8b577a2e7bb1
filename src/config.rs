// src/config.rs
//
// Capture session configuration: markers, relay capacity, persistence mode
// and serial settings. Loadable from a TOML file; every field has a default
// so a bare `--port` invocation works.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::port::SerialSettings;

/// What the sink writes for each forwarded line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// The raw decoded line, verbatim.
    RawLines,
    /// The parsed record as delimited text; raw line when parsing fails.
    Records,
    /// The raw line followed by the parsed record when it parses.
    RecordsAndRaw,
}

impl Default for PersistMode {
    fn default() -> Self {
        PersistMode::RawLines
    }
}

impl FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "raw_lines" => Ok(PersistMode::RawLines),
            "records" => Ok(PersistMode::Records),
            "records_and_raw" | "both" => Ok(PersistMode::RecordsAndRaw),
            other => Err(format!(
                "invalid persist mode '{}' (raw, records, records_and_raw)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Substring that opens the capture gate.
    #[serde(default = "default_start_marker")]
    pub start_marker: String,
    /// Exact line that ends the session. Compared by value; the sentinel
    /// line itself is not persisted.
    #[serde(default = "default_end_sentinel")]
    pub end_sentinel: String,
    /// Bound on in-flight lines between reader and sink.
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,
    /// Frame terminator on the wire, also appended to persisted lines.
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,
    /// Forced split length for terminator-less streams.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default)]
    pub persist_mode: PersistMode,
    /// Field delimiter when rendering parsed records.
    #[serde(default = "default_record_delimiter")]
    pub record_delimiter: String,
    /// Abort the session when no line arrives for this long. `None`
    /// waits indefinitely (the base design).
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    /// Output file name prefix; the timestamp and extension are appended.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    #[serde(default)]
    pub serial: SerialSettings,
}

fn default_start_marker() -> String {
    "main_task: Calling app_main".to_string()
}
fn default_end_sentinel() -> String {
    "TEST ENDED".to_string()
}
fn default_relay_capacity() -> usize {
    crate::relay::DEFAULT_CAPACITY
}
fn default_line_terminator() -> String {
    "\r\n".to_string()
}
fn default_max_line_length() -> usize {
    crate::framer::DEFAULT_MAX_LINE_LENGTH
}
fn default_record_delimiter() -> String {
    ",".to_string()
}
fn default_output_prefix() -> String {
    "capture".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            start_marker: default_start_marker(),
            end_sentinel: default_end_sentinel(),
            relay_capacity: default_relay_capacity(),
            line_terminator: default_line_terminator(),
            max_line_length: default_max_line_length(),
            persist_mode: PersistMode::default(),
            record_delimiter: default_record_delimiter(),
            idle_timeout_ms: None,
            output_prefix: default_output_prefix(),
            serial: SerialSettings::default(),
        }
    }
}

impl CaptureConfig {
    /// Load a capture configuration from a TOML file.
    pub fn load(path: &Path) -> Result<CaptureConfig, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Timestamped output file name, e.g. `capture_20260830_153012.txt`.
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_{}.txt",
            self.output_prefix,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }
}
