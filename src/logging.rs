//! Diagnostic logging to a file under the state directory.
//!
//! The terminal belongs to the console, so nothing is ever written to
//! stdout or stderr once the screen is up.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "uacnet=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Returns the log path, or `None` when the
/// file cannot be opened and logging stays off.
pub fn init(path: &Path) -> Option<PathBuf> {
    let file = open_log(path).ok()?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false),
        )
        .try_init()
        .ok()?;

    Some(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_creates_state_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("opt/uac-controller/uacnet.log");
        open_log(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_fails_under_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("state");
        fs::write(&blocker, "").unwrap();
        assert!(open_log(&blocker.join("uacnet.log")).is_err());
    }
}
