//! Core types, options, and the error taxonomy.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Plaintext bytes per chunk (1 MiB). Fixed by the writer; the header
/// records it so both sides agree on the split of the final chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Encryption modes. The discriminant is the on-disk mode id byte.
///
/// Ids 3..=5 are reserved (never written, rejected on read). `External`
/// selects the OpenPGP back-end collaborator and never appears on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// AES-256-GCM (12-byte nonce, 16-byte tag). Default.
    #[default]
    Aes256Gcm = 0,
    /// ChaCha20-Poly1305 (IETF, 12-byte nonce, 16-byte tag).
    ChaCha20Poly1305 = 1,
    /// Cascade: AES-256-GCM inner, ChaCha20-Poly1305 outer, independent keys.
    Cascade = 2,
    /// External OpenPGP back-end selector (opaque format, not handled here).
    External = 6,
}

impl Mode {
    /// On-disk mode id byte.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Parse a mode id read from a container header.
    pub fn from_id(id: u8) -> Result<Self, HadesError> {
        match id {
            0 => Ok(Mode::Aes256Gcm),
            1 => Ok(Mode::ChaCha20Poly1305),
            2 => Ok(Mode::Cascade),
            other => Err(HadesError::UnsupportedMode(other)),
        }
    }
}

/// Argon2id tuning (`mem_kib` in KiB).
///
/// These are NOT embedded in the container header: decryption only works
/// with the parameters the container was written with, so changing the
/// configured defaults breaks prior containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub time_cost: u32,
    pub mem_kib: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 1,
            mem_kib: 64 * 1024,
            parallelism: 4,
        }
    }
}

/// Options for a single encrypt or decrypt job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub mode: Mode,
    /// Directories: encrypt every file in place instead of archiving.
    pub recursive: bool,
    /// Remove the source file/tree after a successful operation.
    pub delete_after: bool,
    /// Recorded in history; authenticated decryption is never bypassed.
    pub force_decrypt: bool,
    pub kdf: KdfParams,
    // Accepted for host compatibility; no effect on the pipeline.
    pub reed_solomon: bool,
    pub split: bool,
    pub compress: bool,
    pub deniability: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            recursive: false,
            delete_after: false,
            force_decrypt: false,
            kdf: KdfParams::default(),
            reed_solomon: false,
            split: false,
            compress: false,
            deniability: false,
        }
    }
}

/// Cooperative cancellation flag: the host writes, the worker reads.
///
/// Observed between chunks inside the container codec and between items
/// inside the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Library error type (no panics for expected failures).
#[derive(Error, Debug)]
pub enum HadesError {
    #[error("invalid container format")]
    BadFormat,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported encryption mode {0}")]
    UnsupportedMode(u8),
    #[error("authentication failed (wrong password/keyfiles or corrupted data)")]
    AuthenticationFailed,
    #[error("archive hash mismatch (expected {expected}, got {actual})")]
    HashMismatch { expected: String, actual: String },
    #[error("size mismatch (header records {expected} bytes, output is {actual})")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("invalid keyfile {}: {reason}", .path.display())]
    InvalidKeyfile { path: PathBuf, reason: &'static str },
    #[error("canceled")]
    Canceled,
    #[error("trailing data after final chunk")]
    CorruptTrailingData,
    #[error("i/o error{}: {source}", fmt_io_path(.path))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("key derivation failed (out of memory)")]
    OutOfMemory,
}

fn fmt_io_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        String::new()
    } else {
        format!(" at {}", path.display())
    }
}

impl From<std::io::Error> for HadesError {
    fn from(source: std::io::Error) -> Self {
        HadesError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

/// Attach the offending path to an `io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T, HadesError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T, HadesError> {
        self.map_err(|source| HadesError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
