//! Storage infrastructure: settings and key files on the local file system.
//!
//! - `settings_file` – [`TomlSettingsRepository`], the TOML settings document
//!   in the platform config directory.
//! - `key_file` – [`FsKeyStore`], per-user key files.
//!
//! Both write through [`write_atomically`] so a crash mid-write never leaves
//! a truncated file in place of a good one.

pub mod key_file;
pub mod settings_file;

pub use key_file::FsKeyStore;
pub use settings_file::TomlSettingsRepository;

use std::io::Write;
use std::path::Path;

use uuid::Uuid;

/// Writes `bytes` to `path` by writing a sibling temp file, syncing it and
/// renaming it over the target.
///
/// The temp file lives in the same directory so the rename stays on one
/// file system.  On failure the temp file is removed and `path` is left as
/// it was.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.tmp", Uuid::new_v4()));
    let tmp = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
