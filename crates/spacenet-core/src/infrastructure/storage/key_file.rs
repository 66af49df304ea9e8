//! Per-user key files on the local file system.
//!
//! The core treats key material as opaque: a key file exists and is
//! non-empty, or it does not.  Its format belongs to whatever produces it,
//! so key generation is injected.

use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use super::write_atomically;
use crate::application::settings_store::{KeyError, KeyStore};

/// Produces fresh key bytes for [`FsKeyStore::create`].
pub type KeyGenerator = Box<dyn Fn() -> Vec<u8> + Send + Sync>;

/// [`KeyStore`] that reads and writes plain files.
pub struct FsKeyStore {
    generate: KeyGenerator,
}

impl FsKeyStore {
    /// Key store generating 32 random bytes per key.
    pub fn new() -> Self {
        Self::with_generator(Box::new(random_key))
    }

    pub fn with_generator(generate: KeyGenerator) -> Self {
        Self { generate }
    }
}

impl Default for FsKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 256 bits from two v4 UUIDs (122 random bits each).
fn random_key() -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(Uuid::new_v4().as_bytes());
    key.extend_from_slice(Uuid::new_v4().as_bytes());
    key
}

fn checked(path: &Path) -> Result<&Path, KeyError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(KeyError::InvalidPath);
    }
    Ok(path)
}

impl KeyStore for FsKeyStore {
    fn load(&self, path: &Path) -> Result<PathBuf, KeyError> {
        let path = checked(path)?;
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => Err(KeyError::Empty(path.to_path_buf())),
            Ok(_) => Ok(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KeyError::NotFound(path.to_path_buf()))
            }
            Err(source) => Err(KeyError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn create(&self, path: &Path) -> Result<PathBuf, KeyError> {
        let path = checked(path)?;
        let key = (self.generate)();
        if key.is_empty() {
            return Err(KeyError::Empty(path.to_path_buf()));
        }
        write_atomically(path, &key).map_err(|source| KeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("created key file {}", path.display());
        Ok(path.to_path_buf())
    }
}
