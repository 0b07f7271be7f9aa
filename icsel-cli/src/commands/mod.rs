//! The four CLI subcommands of §6 and the file-I/O helpers they share. Every
//! subcommand here is a thin translation layer: it reads JSON, calls into
//! `icsel-core`, and writes JSON (or, for `plot`, Graphviz DOT) back out.
//! None of this logic lives in the core crate itself.

pub mod check;
pub mod make;
pub mod plot;
pub mod transform;

use failure::{Error, ResultExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and deserializes a JSON file, with the failing path named in the
/// error context per §7 taxonomy item 4 ("parsing/serialization error...
/// reported with the offending key path").
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = fs::read_to_string(path)
        .with_context(|_| format!("reading `{}`", path.display()))?;
    let value: T = serde_json::from_str(&text)
        .with_context(|_| format!("parsing JSON in `{}`", path.display()))?;
    Ok(value)
}

/// Serializes `value` as pretty JSON and writes it to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(value)
        .with_context(|_| format!("serializing output for `{}`", path.display()))?;
    fs::write(path, text).with_context(|_| format!("writing `{}`", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Writes `text` verbatim (used by `plot`, whose output is DOT, not JSON).
pub fn write_text(path: &Path, text: &str) -> Result<(), Error> {
    fs::write(path, text).with_context(|_| format!("writing `{}`", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Derives the Nth output file name for one CLI invocation: `base`'s stem
/// gets `-{id}` appended before its extension (§6: "output files whose names
/// are suffixed with a per-output ID"). The first output of an invocation
/// uses ID 0, the second ID 1, and so on.
pub fn output_path(base: &Path, id: usize) -> PathBuf {
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = base.extension().map(|s| s.to_string_lossy().into_owned());
    let file_name = match ext {
        Some(ext) => format!("{}-{}.{}", stem, id, ext),
        None => format!("{}-{}", stem, id),
    };
    match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_inserts_id_before_extension() {
        assert_eq!(output_path(Path::new("out.json"), 0), PathBuf::from("out-0.json"));
        assert_eq!(output_path(Path::new("dir/out.json"), 1), PathBuf::from("dir/out-1.json"));
        assert_eq!(output_path(Path::new("noext"), 2), PathBuf::from("noext-2"));
    }
}
