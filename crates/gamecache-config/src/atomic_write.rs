//! Crash-safe replace-a-whole-file helper shared by the state store and
//! the operation registry's persisted history.

use crate::CoreResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write `contents` to `tmp_path`, fsync it, then atomically rename it onto
/// `final_path`. On POSIX and on NTFS same-volume renames this is atomic;
/// a crash before the rename leaves `final_path` untouched, a crash after
/// leaves it fully replaced. There is no window where `final_path` is
/// partially written.
pub fn atomic_write(final_path: &Path, tmp_path: &Path, contents: &str) -> CoreResult<()> {
    {
        let mut file = File::create(tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(tmp_path, final_path)?;
    Ok(())
}
