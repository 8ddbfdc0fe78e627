//! File-backed schedule state and ping log.

pub mod ping_log;
pub mod state_file;

pub use ping_log::JsonlPingLog;
pub use state_file::JsonStateStore;

use std::io::Write;
use std::path::Path;

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, even across power loss.
///
/// The temp file is synced before the rename; on Unix the directory entry
/// is synced after it.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}
