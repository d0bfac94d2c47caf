use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::error::FetchError;

pub const PART_SUFFIX: &str = ".part";

const RAND_LEN: usize = 6;

// tempfile opens with 0600, which would survive the rename. Ask for 0666 so
// the umask decides, the same as for any file the process creates.
pub fn temp_file_in(
    dir: &Utf8Path,
    prefix: &str,
    suffix: &str,
) -> Result<NamedTempFile, FetchError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(suffix).rand_bytes(RAND_LEN);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
        .tempfile_in(dir.as_std_path())
        .map_err(|err| FetchError::Filesystem(format!("create temp file in {dir}: {err}")))
}

// A transfer killed outright leaves its `.<filename>*.part` file behind.
pub fn remove_stale_parts(dir: &Utf8Path, filename: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir.as_std_path()) else {
        return 0;
    };
    let prefix = format!(".{filename}");
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.len() == prefix.len() + RAND_LEN + PART_SUFFIX.len()
            && name.starts_with(&prefix)
            && name.ends_with(PART_SUFFIX)
            && std::fs::remove_file(entry.path()).is_ok()
        {
            removed += 1;
        }
    }
    removed
}
