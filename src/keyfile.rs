//! Ordered keyfile sets combined with the password into a compound secret.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::hash::sha256_reader;
use crate::types::{HadesError, IoResultExt};

/// A keyfile: path plus the SHA-256 of its full content.
#[derive(Debug, Clone)]
pub struct Keyfile {
    pub path: PathBuf,
    pub digest: [u8; 32],
}

/// Ordered set of keyfiles. When `require_order` is set, the position of
/// each keyfile becomes part of the compound secret, making the ordering
/// an authentication factor.
#[derive(Debug, Clone, Default)]
pub struct KeyfileSet {
    entries: Vec<Keyfile>,
    pub require_order: bool,
}

impl KeyfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a keyfile and append it to the set.
    ///
    /// Directories, empty files, and unreadable paths are rejected with
    /// [`HadesError::InvalidKeyfile`].
    pub fn add(&mut self, path: &Path) -> Result<(), HadesError> {
        let meta = fs::metadata(path).map_err(|_| HadesError::InvalidKeyfile {
            path: path.to_path_buf(),
            reason: "unreadable",
        })?;
        if meta.is_dir() {
            return Err(HadesError::InvalidKeyfile {
                path: path.to_path_buf(),
                reason: "is a directory",
            });
        }
        if meta.len() == 0 {
            return Err(HadesError::InvalidKeyfile {
                path: path.to_path_buf(),
                reason: "is empty",
            });
        }

        let file = File::open(path).map_err(|_| HadesError::InvalidKeyfile {
            path: path.to_path_buf(),
            reason: "unreadable",
        })?;
        let digest = sha256_reader(BufReader::new(file)).at(path)?;
        self.entries.push(Keyfile {
            path: path.to_path_buf(),
            digest,
        });
        Ok(())
    }

    /// Remove the first entry with this path, if present.
    pub fn remove(&mut self, path: &Path) {
        if let Some(pos) = self.entries.iter().position(|kf| kf.path == path) {
            self.entries.remove(pos);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move an entry to a new position; out-of-range indices are ignored.
    pub fn move_entry(&mut self, from: usize, to: usize) {
        if from >= self.entries.len() || to >= self.entries.len() {
            return;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
    }

    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|kf| kf.path.clone()).collect()
    }

    /// Combine the password with the keyfile digests into the compound
    /// secret: SHA-256 over the password bytes, then each digest in order,
    /// each followed by its position byte when `require_order` is set.
    pub fn combine(&self, password: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(password);
        for (i, kf) in self.entries.iter().enumerate() {
            hasher.update(kf.digest);
            if self.require_order {
                hasher.update([i as u8]);
            }
        }
        Zeroizing::new(hasher.finalize().into())
    }
}

/// Write a keyfile of `size_kib` KiB of random bytes (minimum 1 KiB),
/// creating parent directories as needed.
pub fn generate_keyfile(path: &Path, size_kib: usize) -> Result<(), HadesError> {
    let size_kib = size_kib.max(1);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let mut file = File::create(path).at(path)?;
    let mut block = [0u8; 1024];
    for _ in 0..size_kib {
        getrandom::fill(&mut block).map_err(std::io::Error::from)?;
        file.write_all(&block).at(path)?;
    }
    Ok(())
}
