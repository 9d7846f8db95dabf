pub mod engine;
pub mod model;
pub mod service;
pub mod tools;

pub use engine::{
    ApprovalCoordinator, ConversationStore, Decision, DecisionMap, EngineError, Item,
    PendingInterruption, RunState, TopologyCache, TurnOutcome, TurnRunner,
};
pub use service::{ServiceConfig, TurnRequest, TurnResponse, TurnService};
pub use tools::{AuthBridgeConfig, ToolError, ToolSelection, TOOLS_WITH_APPROVAL};

/// Return the platform-standard data directory for Liaison.
///
/// - macOS: `~/Library/Application Support/liaison/`
/// - Windows: `{FOLDERID_RoamingAppData}\liaison\`
/// - Linux: `$XDG_DATA_HOME/liaison/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.liaison/` only if none of the above can be resolved.
pub(crate) fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("liaison");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".liaison")
}

/// Initialize the tracing subscriber — writes structured logs to the app data directory.
///
/// On each startup:
/// 1. Rotates existing logs (liaison.log → liaison.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh liaison.log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the data directory path for discoverability.
///
/// Falls back to a stderr subscriber if the log file cannot be opened.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("liaison=info,warn"))
    };

    let log_dir = data_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    let log_path = log_dir.join("liaison.log");

    // Rotate: liaison.log.2 → .3, .1 → .2, liaison.log → .1
    rotate_log_file(&log_path, 3);

    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            fmt::fmt().with_env_filter(filter()).init();
            tracing::warn!(
                log_file = %log_path.display(),
                error = %e,
                "failed to open log file, logging to stderr"
            );
            return;
        }
    };

    let flushing_writer = FlushingWriter::new(log_file);

    fmt::fmt()
        .with_env_filter(filter())
        .with_writer(flushing_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    // Startup banner — makes it easy to find the right log file
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== Liaison starting ==="
    );
}

/// Rotate log files: `liaison.log` → `liaison.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    // Delete the oldest
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Current → .1
    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// `tracing-subscriber` buffers log output internally. Without explicit
/// flushing, log entries may sit in OS buffers and be lost on crash.
/// This wrapper ensures each log line is on disk immediately.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_log_file_shifts_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("liaison.log");

        std::fs::write(&base, "current").unwrap();
        std::fs::write(format!("{}.1", base.display()), "one").unwrap();
        std::fs::write(format!("{}.3", base.display()), "three").unwrap();

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        assert_eq!(
            std::fs::read_to_string(format!("{}.1", base.display())).unwrap(),
            "current"
        );
        assert_eq!(
            std::fs::read_to_string(format!("{}.2", base.display())).unwrap(),
            "one"
        );
        // The old .3 was deleted and nothing shifted into its place.
        assert!(!std::path::Path::new(&format!("{}.3", base.display())).exists());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();

        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"one line\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one line\n");
    }
}
