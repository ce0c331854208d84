pub mod models;
pub mod users;

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Writes `value` as pretty JSON to a temporary sibling file and renames it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> carnage_nn::Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = std::fs::File::create(&tmp)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Locks a store, recovering the guard if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
