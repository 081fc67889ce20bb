//! Run configuration
//!
//! Defaults mirror the historical tool: 4000-row chunks, `part` prefix, `./temp` scratch
//! root, comma-delimited UTF-8 inputs and a `log.txt` report.

use crate::error::{PipelineError, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 4000;
pub const DEFAULT_OUTPUT_PREFIX: &str = "part";
pub const DEFAULT_TEMP_DIR: &str = "./temp";
pub const DEFAULT_REPORT_PATH: &str = "log.txt";

/// One side of the comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    pub delimiter: char,
    /// WHATWG encoding label, e.g. `utf-8`, `latin1`, `utf-16le`
    pub charset: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./file.csv"),
            delimiter: ',',
            charset: "utf-8".to_string(),
        }
    }
}

impl InputConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Delimiter as the single byte the tokenizer expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(PipelineError::Config(format!(
                "delimiter {:?} for {} must be a single-byte (ASCII) character",
                self.delimiter,
                self.path.display()
            )))
        }
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        resolve_encoding(&self.charset)
    }

    /// Dataset name: the input's file stem
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows per ingest batch and per on-disk chunk
    pub chunk_size: usize,
    /// Chunk file name prefix
    pub output_prefix: String,
    /// Scratch root, wiped and recreated on every run
    pub temp_dir: PathBuf,
    pub left: InputConfig,
    pub right: InputConfig,
    /// Column position used as the sort key for both tables
    pub sort_key_column_index: usize,
    pub report_path: PathBuf,
    pub json_report_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            left: InputConfig::default(),
            right: InputConfig::default(),
            sort_key_column_index: 0,
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            json_report_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>) -> Self {
        Self {
            left: InputConfig::new(left),
            right: InputConfig::new(right),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            PipelineError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Check every option before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.output_prefix.is_empty() {
            return Err(PipelineError::Config(
                "output_prefix must not be empty".to_string(),
            ));
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err(PipelineError::Config(format!(
                "output_prefix '{}' must not contain path separators",
                self.output_prefix
            )));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(PipelineError::Config("temp_dir must not be empty".to_string()));
        }
        for input in [&self.left, &self.right] {
            input.delimiter_byte()?;
            input.encoding()?;
        }
        Ok(())
    }
}

/// Look up an encoding by WHATWG label (`utf8`, `latin1`, `cp1252`, ...)
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| PipelineError::UnknownEncoding {
        label: label.to_string(),
    })
}
