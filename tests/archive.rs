//! Folder archive encryption: sidecar metadata, hash verification, and
//! tree round-trips.

use std::fs;
use std::path::{Path, PathBuf};

use hadescrypt::{
    CancelToken, HadesError, JobHooks, JobOptions, JobOutcome, KdfParams, SecretMaterial,
    SidecarMeta, create_tar_gz, decrypt_file, sidecar_path,
};
use secrecy::SecretString;
use tempfile::tempdir;

fn test_params() -> KdfParams {
    KdfParams {
        time_cost: 1,
        mem_kib: 8 * 1024,
        parallelism: 1,
    }
}

fn secret(pw: &str) -> SecretMaterial {
    SecretMaterial::new(SecretString::new(pw.into()))
}

fn options() -> JobOptions {
    JobOptions {
        kdf: test_params(),
        ..JobOptions::default()
    }
}

fn build_tree(root: &Path) {
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), b"A").unwrap();
    fs::write(root.join("sub/b.txt"), b"BB").unwrap();
}

/// Archive-encrypt a folder through the orchestrator; returns the container.
fn encrypt_folder(folder: &Path, pw: &str) -> PathBuf {
    let items = vec![folder.to_path_buf()];
    let mut hooks = JobHooks::new();
    let summary = hadescrypt::encrypt(
        &items,
        &secret(pw),
        &options(),
        &mut hooks,
        &CancelToken::new(),
    );
    assert!(matches!(summary.outcome, JobOutcome::Completed), "{summary:?}");

    let mut container = folder.as_os_str().to_os_string();
    container.push(".hadescrypt");
    PathBuf::from(container)
}

#[test]
fn folder_round_trip_with_sidecar() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("d");
    build_tree(&folder);

    let container = encrypt_folder(&folder, "pw");
    assert!(container.exists());

    // Sidecar reports the tree statistics and the archive hash.
    let meta_path = sidecar_path(&container);
    let meta = SidecarMeta::load(&meta_path).unwrap();
    assert_eq!(meta.original_folder, "d");
    assert_eq!(meta.file_count, 2);
    assert_eq!(meta.total_size, 3);
    assert_eq!(meta.archive_sha256.len(), 64);

    // The recorded hash matches a freshly built archive of the same tree.
    let rebuilt = dir.path().join("rebuilt.tar.gz");
    create_tar_gz(&folder, &rebuilt, &CancelToken::new(), |_, _| {}).unwrap();
    let digest = {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(fs::read(&rebuilt).unwrap()))
    };
    assert_eq!(meta.archive_sha256, digest);

    // Decrypt into a fresh directory and compare the tree.
    let out = dir.path().join("restored");
    decrypt_file(&container, &out, &secret("pw"), test_params()).unwrap();
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"A");
    assert_eq!(fs::read(out.join("sub/b.txt")).unwrap(), b"BB");

    // Sidecar and temporary plaintext are gone after a verified extract.
    assert!(!meta_path.exists());
    assert!(!dir.path().join("d.hadescrypt.__dec_tmp__").exists());
}

#[test]
fn sidecar_mismatch_aborts_extraction() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("d");
    build_tree(&folder);

    let container = encrypt_folder(&folder, "pw");
    let meta_path = sidecar_path(&container);

    // Corrupt the recorded hash.
    let mut meta = SidecarMeta::load(&meta_path).unwrap();
    meta.archive_sha256 = "00".repeat(32);
    meta.write(&meta_path).unwrap();

    let out = dir.path().join("restored");
    let err = decrypt_file(&container, &out, &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::HashMismatch { .. }));

    // Nothing was extracted and the sidecar is kept for inspection.
    assert!(!out.exists());
    assert!(meta_path.exists());
}

#[test]
fn missing_sidecar_still_decrypts() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("d");
    build_tree(&folder);

    let container = encrypt_folder(&folder, "pw");
    fs::remove_file(sidecar_path(&container)).unwrap();

    let out = dir.path().join("restored");
    decrypt_file(&container, &out, &secret("pw"), test_params()).unwrap();
    assert_eq!(fs::read(out.join("sub/b.txt")).unwrap(), b"BB");
}

#[test]
fn empty_folder_round_trips() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("empty");
    fs::create_dir_all(&folder).unwrap();

    let container = encrypt_folder(&folder, "pw");
    let meta = SidecarMeta::load(&sidecar_path(&container)).unwrap();
    assert_eq!(meta.file_count, 0);
    assert_eq!(meta.total_size, 0);

    let out = dir.path().join("restored");
    decrypt_file(&container, &out, &secret("pw"), test_params()).unwrap();
    assert!(out.is_dir());
}
