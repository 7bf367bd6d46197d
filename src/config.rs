//! Configuration for a measurement run.

use crate::allocate::DEFAULT_FILL_PAGES;
use crate::evict::EvictorKind;
use std::path::PathBuf;
use std::str::FromStr;

/// Size of the target file: 128 MiB.
pub const DEFAULT_FILE_SIZE: u64 = 128 * 1024 * 1024;

/// How the result is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `file_size .. write_unit .. write_bytes .. read_bytes ..`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Configuration for a measurement run.
#[derive(Debug, Clone)]
pub struct MeasureConfig {
    /// Bytes to allocate and rewrite.
    pub file_size: u64,
    /// Directory for the temporary target file.
    pub tmp_dir: PathBuf,
    /// Cache eviction strategy.
    pub evictor: EvictorKind,
    /// Fail instead of falling back to zero counters.
    pub strict_counters: bool,
    /// Result format on stdout.
    pub format: OutputFormat,
    /// Pages per block for the initial fill.
    pub fill_pages: usize,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            file_size: DEFAULT_FILE_SIZE,
            tmp_dir: std::env::temp_dir(),
            evictor: EvictorKind::default(),
            strict_counters: false,
            format: OutputFormat::default(),
            fill_pages: DEFAULT_FILL_PAGES,
        }
    }
}

impl MeasureConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `PCW_FILE_SIZE`: target file size in bytes (default: 134217728)
    /// - `PCW_TMP_DIR`: directory for the target file (default: system temp dir)
    /// - `PCW_EVICTOR`: `vmtouch`, `fadvise` or `none` (default: vmtouch)
    /// - `PCW_STRICT_COUNTERS`: fail when I/O counters are unavailable (default: false)
    /// - `PCW_FORMAT`: `text` or `json` (default: text)
    /// - `PCW_ALLOC_PAGES`: pages per initial fill block (default: 32)
    ///
    /// Values that fail to parse keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = get("PCW_FILE_SIZE") {
            match v.trim().parse::<u64>() {
                Ok(n) if n > 0 => cfg.file_size = n,
                _ => tracing::warn!(value = %v, "ignoring invalid PCW_FILE_SIZE"),
            }
        }
        if let Some(v) = get("PCW_TMP_DIR") {
            cfg.tmp_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PCW_EVICTOR") {
            match v.parse() {
                Ok(kind) => cfg.evictor = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring PCW_EVICTOR"),
            }
        }
        if let Some(v) = get("PCW_STRICT_COUNTERS") {
            cfg.strict_counters = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("PCW_FORMAT") {
            match v.parse() {
                Ok(format) => cfg.format = format,
                Err(e) => tracing::warn!(error = %e, "ignoring PCW_FORMAT"),
            }
        }
        if let Some(v) = get("PCW_ALLOC_PAGES") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => cfg.fill_pages = n,
                _ => tracing::warn!(value = %v, "ignoring invalid PCW_ALLOC_PAGES"),
            }
        }

        cfg
    }

    /// Set the target file size.
    pub fn file_size(mut self, bytes: u64) -> Self {
        self.file_size = bytes;
        self
    }

    /// Set the directory for the target file.
    pub fn tmp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_dir = path.into();
        self
    }

    /// Set the cache eviction strategy.
    pub fn evictor(mut self, kind: EvictorKind) -> Self {
        self.evictor = kind;
        self
    }

    /// Set whether unavailable I/O counters abort the run.
    pub fn strict_counters(mut self, strict: bool) -> Self {
        self.strict_counters = strict;
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set pages per initial fill block.
    pub fn fill_pages(mut self, pages: usize) -> Self {
        self.fill_pages = pages;
        self
    }
}
