#![forbid(unsafe_code)]
//! # hadescrypt — password + keyfile authenticated encryption for files and folders.
//!
//! `hadescrypt` is the storage engine of a desktop encryption tool. It turns a
//! plaintext file or directory and a user secret (password, optionally combined
//! with ordered keyfiles) into a self-describing encrypted container, and back.
//!
//! ## Features
//! - **Streaming chunked AEAD containers** (1 MiB chunks, constant memory)
//! - **Three modes**: AES-256-GCM, ChaCha20-Poly1305, and a paranoid cascade
//!   (AES-GCM inner + ChaCha20-Poly1305 outer with independent keys)
//! - **Argon2id key derivation** from password + keyfile compound secrets
//! - **Folder encryption** via tar+gzip archival with a SHA-256 integrity
//!   sidecar, or recursive per-file encryption
//! - **Auto-detection on decrypt**: single files and archived folders are
//!   handled transparently
//! - **Batch orchestration** with cancellation, throttled progress, and
//!   per-item history reporting
//!
//! ## Example: encrypt and decrypt a file
//! ```no_run
//! use std::path::Path;
//! use hadescrypt::{decrypt_file, encrypt_file, KdfParams, Mode, SecretMaterial};
//! use secrecy::SecretString;
//!
//! let secret = SecretMaterial::new(SecretString::new("correct horse".into()));
//! encrypt_file(
//!     Path::new("report.pdf"),
//!     Path::new("report.pdf.hadescrypt"),
//!     &secret,
//!     Mode::Aes256Gcm,
//!     KdfParams::default(),
//! ).unwrap();
//! decrypt_file(
//!     Path::new("report.pdf.hadescrypt"),
//!     Path::new("report.pdf"),
//!     &secret,
//!     KdfParams::default(),
//! ).unwrap();
//! ```
//!
//! Safety notes
//! - Protects data at rest. Does not hide file sizes or defend against
//!   compromised hosts or side channels.

mod archive;
mod config;
mod crypto;
mod file;
mod format;
mod hash;
mod kdf;
mod keyfile;
mod orchestrator;
mod pipeline;
mod sidecar;
mod streaming;
mod types;

use std::fs::File;
use std::path::Path;

// Re-export public types.
pub use config::{Argon2Defaults, Config, HistoryEntry, Profile, default_config_path};
pub use file::{
    CONTAINER_SUFFIX, ENCRYPTED_SUFFIXES, DetectedFormat, detect_format, has_encrypted_suffix,
    is_container_file, output_path_for_decrypt, output_path_for_encrypt,
};
pub use format::{HEADER_LEN, Header, MAGIC, VERSION};
pub use keyfile::{Keyfile, KeyfileSet, generate_keyfile};
pub use orchestrator::{JobHooks, JobOutcome, JobSummary, SecretMaterial, decrypt, encrypt};
pub use sidecar::{SidecarMeta, sidecar_path};
pub use types::{CancelToken, DEFAULT_CHUNK_SIZE, HadesError, JobOptions, KdfParams, Mode};

// Re-export streaming and pipeline entry points for hosts that drive
// single operations themselves.
pub use archive::{create_tar_gz, extract_tar_gz, is_archive};
pub use pipeline::decrypt_file_auto;
pub use streaming::{read_container, write_container};

use types::IoResultExt;

/// Encrypt a single file into a container at `output`.
///
/// Convenience wrapper over [`write_container`] with no cancellation or
/// progress reporting; batch jobs go through [`encrypt`].
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    secret: &SecretMaterial,
    mode: Mode,
    params: KdfParams,
) -> Result<(), HadesError> {
    let total_size = std::fs::metadata(input).at(input)?.len();
    let in_file = File::open(input).at(input)?;
    let out_file = File::create(output).at(output)?;
    let secret_bytes = secret.secret_bytes();
    write_container(
        in_file,
        out_file,
        total_size,
        mode,
        &secret_bytes,
        params,
        &CancelToken::new(),
        |_, _| {},
    )
}

/// Decrypt a container at `input`, auto-detecting archived folders.
///
/// Convenience wrapper over [`decrypt_file_auto`]; batch jobs go through
/// [`decrypt`].
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    secret: &SecretMaterial,
    params: KdfParams,
) -> Result<(), HadesError> {
    let secret_bytes = secret.secret_bytes();
    decrypt_file_auto(
        input,
        output,
        &secret_bytes,
        params,
        false,
        &CancelToken::new(),
        |_, _| {},
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tempfile::tempdir;

    fn test_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_kib: 8 * 1024,
            parallelism: 1,
        }
    }

    #[test]
    fn file_round_trip_default_mode() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.bin");
        std::fs::write(&input, b"abc").unwrap();

        let secret = SecretMaterial::new(SecretString::new("pw".into()));
        let container = dir.path().join("in.bin.hadescrypt");
        encrypt_file(&input, &container, &secret, Mode::default(), test_params()).unwrap();

        let back = dir.path().join("back.bin");
        decrypt_file(&container, &back, &secret, test_params()).unwrap();
        assert_eq!(std::fs::read(&back).unwrap(), b"abc");
    }

    #[test]
    fn wrong_password_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.bin");
        std::fs::write(&input, b"abc").unwrap();

        let container = dir.path().join("in.bin.hadescrypt");
        let secret = SecretMaterial::new(SecretString::new("pw1".into()));
        encrypt_file(&input, &container, &secret, Mode::default(), test_params()).unwrap();

        let wrong = SecretMaterial::new(SecretString::new("pw2".into()));
        let result = decrypt_file(&container, &dir.path().join("out"), &wrong, test_params());
        assert!(matches!(result, Err(HadesError::AuthenticationFailed)));
    }
}
