//! Suffix vocabulary, output-path derivation, and container detection.

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::format::MAGIC;
use crate::types::{HadesError, IoResultExt};

/// Extension written by the encrypt path.
pub const CONTAINER_SUFFIX: &str = ".hadescrypt";

/// Names treated as already encrypted: skipped when scanning plaintext,
/// collected when scanning for ciphertext.
pub const ENCRYPTED_SUFFIXES: &[&str] = &[".hadescrypt", ".heistcrypt", ".gpg", ".pgp"];

/// Suffixes stripped to derive a decrypt output path (includes the legacy
/// `.hades`); anything else gets `.dec` appended.
const DECRYPT_STRIP_SUFFIXES: &[&str] = &[".hadescrypt", ".heistcrypt", ".hades", ".gpg", ".pgp"];

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Does the file name carry one of the encrypted suffixes?
pub fn has_encrypted_suffix(path: &Path) -> bool {
    let name = file_name_lower(path);
    ENCRYPTED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// `<input>.hadescrypt` next to the input.
pub fn output_path_for_encrypt(input: &Path) -> PathBuf {
    let mut os = OsString::from(input.as_os_str());
    os.push(CONTAINER_SUFFIX);
    PathBuf::from(os)
}

/// Strip one recognized encrypted suffix (case-insensitive); unknown
/// names get `.dec` appended.
pub fn output_path_for_decrypt(input: &Path) -> PathBuf {
    let name = file_name_lower(input);
    for suffix in DECRYPT_STRIP_SUFFIXES {
        if name.ends_with(suffix) {
            let full = input.as_os_str().to_string_lossy();
            let stripped = full[..full.len() - suffix.len()].to_string();
            return PathBuf::from(stripped);
        }
    }
    let mut os = OsString::from(input.as_os_str());
    os.push(".dec");
    PathBuf::from(os)
}

/// What the first bytes of a file say about its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// Our container magic `HAD1`.
    Container,
    /// OpenPGP binary packet (first byte has the high bit set); handled by
    /// an external back-end, not this engine.
    External,
    Unknown,
}

/// Probe the leading bytes of `path`.
pub fn detect_format(path: &Path) -> Result<DetectedFormat, HadesError> {
    let mut file = File::open(path).at(path)?;
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).at(path)?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 4 && head == *MAGIC {
        return Ok(DetectedFormat::Container);
    }
    if filled >= 1 && head[0] & 0x80 != 0 {
        return Ok(DetectedFormat::External);
    }
    Ok(DetectedFormat::Unknown)
}

/// Removes a temporary file on drop unless disarmed. Keeps failed or
/// canceled jobs from leaving intermediate plaintext behind.
pub(crate) struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed
            && self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            log::warn!("failed to remove {}: {e}", self.path.display());
        }
    }
}

/// Container check used by scanners: recognized suffix AND magic bytes.
pub fn is_container_file(path: &Path) -> bool {
    let name = file_name_lower(path);
    if !name.ends_with(".hadescrypt") && !name.ends_with(".heistcrypt") {
        return false;
    }
    matches!(detect_format(path), Ok(DetectedFormat::Container))
}
