//! Writing the plan to disk.
//!
//! The plan is written next to its final location as `<name>.json.tmp`,
//! flushed, then renamed over the target. A crash mid-write leaves any
//! previous plan intact.

use crate::error::{Error, Result};
use crate::plan::ConversionPlan;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the emitted plan inside the output directory
pub const PLAN_FILE_NAME: &str = "conversion-plan.json";

/// Serialize a plan as pretty JSON with a trailing newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(plan: &ConversionPlan) -> Result<String> {
    let mut json = serde_json::to_string_pretty(plan).map_err(|source| Error::Json {
        path: PathBuf::from(PLAN_FILE_NAME),
        source,
    })?;
    json.push('\n');
    Ok(json)
}

/// Write `plan` into `dir`, creating the directory if needed.
///
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written and renamed into place.
pub fn write_plan(dir: &Path, plan: &ConversionPlan) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(PLAN_FILE_NAME);
    let temp_path = make_temp_path(&path);

    let json = to_json(plan)?;
    if let Err(e) = write_to_temp_file(&temp_path, json.as_bytes()) {
        // Best-effort cleanup
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    std::fs::rename(&temp_path, &path)?;

    tracing::info!(path = %path.display(), bytes = json.len(), "Wrote conversion plan");
    Ok(path)
}

fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_os_string();
    temp.push(".tmp");
    PathBuf::from(temp)
}

fn write_to_temp_file(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(temp_path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
