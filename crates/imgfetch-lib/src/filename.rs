use crate::reference::ImageReference;
use crate::resolve::ResolvedAddress;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const MAX_FILE_NAME_LEN: usize = 255;

/// Hands out local file names inside one target directory.
///
/// A name is checked against both the directory and the names already handed
/// out during this run, and reserved, under a single lock. Two workers can
/// therefore never be given the same path.
#[derive(Debug)]
pub struct FilenameRegistry {
    target_dir: PathBuf,
    reserved: Mutex<HashSet<String>>,
}

impl FilenameRegistry {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Reserves a path for `reference`. The final path segment is used when it
    /// is usable and free; otherwise the hex SHA-256 of `resolved` is used,
    /// with a numeric suffix if even that is taken.
    pub fn derive(&self, resolved: &ResolvedAddress, reference: &ImageReference) -> PathBuf {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);

        let candidate = reference.file_name();
        if !candidate.is_empty()
            && candidate.len() <= MAX_FILE_NAME_LEN
            && self.is_free(&reserved, candidate)
        {
            reserved.insert(candidate.to_string());
            return self.target_dir.join(candidate);
        }

        tracing::debug!(
            address = %resolved,
            candidate,
            "No usable file name or the name is taken, using the checksum as file name"
        );
        let digest = hex::encode(Sha256::digest(resolved.as_str().as_bytes()));
        let mut name = digest.clone();
        let mut suffix = 0u32;
        while !self.is_free(&reserved, &name) {
            suffix += 1;
            name = format!("{digest}-{suffix}");
        }
        let path = self.target_dir.join(&name);
        reserved.insert(name);
        path
    }

    /// Returns a name to the pool after its download failed and left nothing
    /// on disk.
    pub fn release(&self, path: &Path) {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return;
        };
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    fn is_free(&self, reserved: &HashSet<String>, name: &str) -> bool {
        !reserved.contains(name) && !self.target_dir.join(name).exists()
    }
}
