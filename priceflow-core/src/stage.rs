//! Stage traits.
//!
//! Each stage type exposes exactly one operation. Pipelines hold stages as
//! trait objects chosen at construction time, so any stage can be swapped
//! (live source instead of mock data, database instead of files) without
//! touching the others. All stages are `Send + Sync` so independent
//! pipelines can run on separate threads.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::domain::Frame;
use crate::error::StageError;

/// Produces a raw frame for a set of symbols.
///
/// Symbols the source does not know yield no rows, not an error. Rows come
/// back in no particular order.
pub trait Extractor: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, symbols: &BTreeSet<String>) -> Result<Frame, StageError>;
}

/// Normalizes and repairs a raw frame.
pub trait Cleaner: Send + Sync {
    fn clean(&self, frame: Frame) -> Result<Frame, StageError>;
}

/// Derives feature columns.
pub trait Transformer: Send + Sync {
    fn transform(&self, frame: Frame) -> Result<Frame, StageError>;
}

/// Persists a frame, one artifact per symbol, under a target location.
pub trait Loader: Send + Sync {
    /// Write every symbol partition under `target`, creating it if absent.
    /// Returns the resolved target.
    fn load(&self, frame: &Frame, target: &Path) -> Result<PathBuf, StageError>;

    /// Where the artifact for `symbol` lands under `target`.
    fn artifact_path(&self, target: &Path, symbol: &str) -> PathBuf;
}

/// True when `symbol` is a single plain file name, so `<dir>/<symbol>.<ext>`
/// stays directly inside `dir`.
pub fn is_file_safe_symbol(symbol: &str) -> bool {
    let mut components = Path::new(symbol).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name == OsStr::new(symbol),
        _ => false,
    }
}

/// Rejects symbols that would place an artifact outside `target`.
pub fn check_artifact_symbol(target: &Path, symbol: &str) -> Result<(), StageError> {
    if is_file_safe_symbol(symbol) {
        Ok(())
    } else {
        Err(StageError::persistence(
            target,
            format!("symbol '{symbol}' is not a plain file name"),
        ))
    }
}

/// Runs `write` against `tmp_path`, then renames the result onto `path`.
///
/// On failure the temp file is removed and `path` is left as it was.
pub fn write_atomically<F>(tmp_path: &Path, path: &Path, write: F) -> Result<(), StageError>
where
    F: FnOnce(&Path) -> Result<(), StageError>,
{
    if let Err(e) = write(tmp_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(e);
    }
    fs::rename(tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        StageError::persistence(path, format!("atomic rename failed: {e}"))
    })
}
