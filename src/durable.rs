use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fault::{self, points};

/// Replace the contents of `path` with `data`, all or nothing.
///
/// Steps:
/// 1. Write `data` to a sibling temp file `<name>.tmp.<random>`
/// 2. fsync the temp file
/// 3. Rename it over `path`
/// 4. fsync the parent directory so the rename itself is durable
///
/// If anything fails before the rename the temp file is removed and `path`
/// keeps its previous content. A reader never observes a half-written file,
/// even after a crash mid-write.
pub fn atomic_replace(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = TempFile::new(temp_path(path));

    fault::check(points::ATOMIC_REPLACE_BEFORE_WRITE)?;
    let file = File::create(tmp.path())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;

    fault::check(points::ATOMIC_REPLACE_BEFORE_FSYNC)?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fault::check(points::ATOMIC_REPLACE_BEFORE_RENAME)?;
    fs::rename(tmp.path(), path)?;
    tmp.disarm();

    sync_parent_dir(path)?;
    Ok(())
}

/// Append `data` to `path` (created if absent) and fsync before returning.
///
/// Either the whole buffer is durable or, on error, the file is cut back to
/// its length before the call. Only a crash can leave a torn tail behind;
/// level recovery trims that on open.
pub fn durable_append(path: &Path, data: &[u8]) -> Result<()> {
    // Unbuffered: nothing may reach the file after the rollback below.
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let original_len = file.metadata()?.len();

    if let Err(e) = append_and_sync(&mut file, data) {
        if let Err(trunc) = file.set_len(original_len) {
            tracing::warn!(
                path = %path.display(),
                error = %trunc,
                "could not roll back failed append"
            );
        }
        return Err(e);
    }
    Ok(())
}

fn append_and_sync(file: &mut File, data: &[u8]) -> Result<()> {
    fault::check(points::DURABLE_APPEND_BEFORE_WRITE)?;
    file.write_all(data)?;

    fault::check(points::DURABLE_APPEND_BEFORE_FSYNC)?;
    file.sync_all()?;
    Ok(())
}

/// Create `path` as an empty file if it does not exist yet.
pub fn ensure_file(path: &Path) -> Result<()> {
    if !path.exists() {
        durable_append(path, &[])?;
        sync_parent_dir(path)?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}", rand::random::<u64>()));
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Removes the temp file on drop unless the rename already consumed it.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        TempFile { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
