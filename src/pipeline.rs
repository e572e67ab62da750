//! Decrypt pipeline with auto-detection of archived folders.
//!
//! Containers decrypt to a temporary file first; if the plaintext looks
//! like a tar.gz archive the sidecar hash is verified and the tree is
//! extracted, otherwise the temporary file becomes the output.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::archive::{extract_tar_gz, is_archive};
use crate::file::{DetectedFormat, TempFileGuard, detect_format};
use crate::hash::{sha256_file, to_hex_lower};
use crate::sidecar::{SidecarMeta, sidecar_path};
use crate::streaming::read_container;
use crate::types::{CancelToken, HadesError, IoResultExt, KdfParams, Mode};

/// Suffix of the intermediate plaintext file.
const DEC_TMP_SUFFIX: &str = ".__dec_tmp__";

fn dec_tmp_path(container: &Path) -> PathBuf {
    let mut os = OsString::from(container.as_os_str());
    os.push(DEC_TMP_SUFFIX);
    PathBuf::from(os)
}

/// Decrypt `input` to `output`, transparently handling single files and
/// archived folders.
///
/// Archives are verified against the sidecar hash (when one exists) before
/// extraction into the `output` directory; the sidecar and temporary file
/// are removed afterwards. Plain files are renamed into place and checked
/// against the header's recorded size. The temporary file is removed on
/// every exit path.
pub fn decrypt_file_auto(
    input: &Path,
    output: &Path,
    secret: &[u8],
    params: KdfParams,
    force: bool,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64, u64),
) -> Result<(), HadesError> {
    if detect_format(input)? == DetectedFormat::External {
        return Err(HadesError::UnsupportedMode(Mode::External.id()));
    }

    let tmp_path = dec_tmp_path(input);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    let header = {
        let in_file = File::open(input).at(input)?;
        let tmp_file = File::create(&tmp_path).at(&tmp_path)?;
        read_container(in_file, tmp_file, secret, params, force, cancel, &mut progress)?
    };

    if is_archive(&tmp_path) {
        let meta_path = sidecar_path(input);
        if meta_path.exists() {
            let meta = SidecarMeta::load(&meta_path)?;
            if !meta.archive_sha256.is_empty() {
                let actual = to_hex_lower(&sha256_file(&tmp_path)?);
                if actual != meta.archive_sha256 {
                    return Err(HadesError::HashMismatch {
                        expected: meta.archive_sha256,
                        actual,
                    });
                }
            }
        }

        fs::create_dir_all(output).at(output)?;
        extract_tar_gz(&tmp_path, output, cancel, progress)?;

        if meta_path.exists()
            && let Err(e) = fs::remove_file(&meta_path)
        {
            log::warn!("failed to remove sidecar {}: {e}", meta_path.display());
        }
        return Ok(());
    }

    fs::rename(&tmp_path, output).at(output)?;
    guard.disarm();

    let actual = fs::metadata(output).at(output)?.len();
    if actual != header.total_size {
        return Err(HadesError::SizeMismatch {
            expected: header.total_size,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::write_container;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn test_params() -> KdfParams {
        KdfParams {
            time_cost: 1,
            mem_kib: 8 * 1024,
            parallelism: 1,
        }
    }

    fn encrypt_to(path: &Path, data: &[u8]) {
        let out = File::create(path).unwrap();
        write_container(
            Cursor::new(data),
            out,
            data.len() as u64,
            Mode::Aes256Gcm,
            b"pw",
            test_params(),
            &CancelToken::new(),
            |_, _| {},
        )
        .unwrap();
    }

    #[test]
    fn plain_file_renames_into_place() {
        let dir = tempdir().unwrap();
        let container = dir.path().join("doc.txt.hadescrypt");
        encrypt_to(&container, b"contents");

        let output = dir.path().join("doc.txt");
        decrypt_file_auto(
            &container,
            &output,
            b"pw",
            test_params(),
            false,
            &CancelToken::new(),
            |_, _| {},
        )
        .unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"contents");
        assert!(!dec_tmp_path(&container).exists());
    }

    #[test]
    fn failed_decrypt_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let container = dir.path().join("doc.txt.hadescrypt");
        encrypt_to(&container, b"contents");

        let output = dir.path().join("doc.txt");
        let err = decrypt_file_auto(
            &container,
            &output,
            b"wrong",
            test_params(),
            false,
            &CancelToken::new(),
            |_, _| {},
        )
        .unwrap_err();

        assert!(matches!(err, HadesError::AuthenticationFailed));
        assert!(!dec_tmp_path(&container).exists());
        assert!(!output.exists());
    }

    #[test]
    fn openpgp_marker_is_refused() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("x.gpg");
        fs::write(&input, [0x8Cu8, 0x0D]).unwrap();

        let err = decrypt_file_auto(
            &input,
            &dir.path().join("x"),
            b"pw",
            test_params(),
            false,
            &CancelToken::new(),
            |_, _| {},
        )
        .unwrap_err();
        assert!(matches!(err, HadesError::UnsupportedMode(6)));
    }
}
