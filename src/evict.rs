//! Page-cache eviction for the target file.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

/// Something that can drop a file's pages from the page cache.
///
/// Eviction is best effort: callers log failures and keep going.
pub trait CacheDropper {
    /// Short name used in logs and results.
    fn name(&self) -> &str;

    /// Ask the environment to evict the cached pages of `path`.
    fn drop_cache(&self, path: &Path) -> io::Result<()>;
}

/// Runs `vmtouch -e <path>`.
#[derive(Debug, Clone)]
pub struct VmtouchDropper {
    program: String,
}

impl VmtouchDropper {
    pub fn new() -> Self {
        Self::with_program("vmtouch")
    }

    /// Use a different executable that takes the same `-e <path>` arguments.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for VmtouchDropper {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheDropper for VmtouchDropper {
    fn name(&self) -> &str {
        "vmtouch"
    }

    fn drop_cache(&self, path: &Path) -> io::Result<()> {
        // Output is captured so stdout keeps only the result line.
        let output = Command::new(&self.program).arg("-e").arg(path).output()?;
        tracing::debug!(
            program = %self.program,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "evictor finished"
        );
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Flushes dirty pages with `fdatasync` and then drops them with
/// `posix_fadvise(POSIX_FADV_DONTNEED)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FadviseDropper;

impl CacheDropper for FadviseDropper {
    fn name(&self) -> &str {
        "fadvise"
    }

    fn drop_cache(&self, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        file.sync_data()?;
        let ret = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
        if ret != 0 {
            return Err(io::Error::from_raw_os_error(ret));
        }
        Ok(())
    }
}

/// Leaves the cache alone, for warm-cache runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDropper;

impl CacheDropper for NoopDropper {
    fn name(&self) -> &str {
        "none"
    }

    fn drop_cache(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Evictor selection from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictorKind {
    #[default]
    Vmtouch,
    Fadvise,
    None,
}

impl EvictorKind {
    pub fn build(self) -> Box<dyn CacheDropper> {
        match self {
            Self::Vmtouch => Box::new(VmtouchDropper::new()),
            Self::Fadvise => Box::new(FadviseDropper),
            Self::None => Box::new(NoopDropper),
        }
    }
}

impl FromStr for EvictorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vmtouch" => Ok(Self::Vmtouch),
            "fadvise" => Ok(Self::Fadvise),
            "none" | "off" => Ok(Self::None),
            other => Err(format!("unknown evictor '{}'", other)),
        }
    }
}
