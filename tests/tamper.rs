//! Tamper and authentication-rejection tests.

use std::fs;
use std::path::Path;

use hadescrypt::{HEADER_LEN, HadesError, KdfParams, Mode, SecretMaterial, decrypt_file, encrypt_file};
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

fn encrypt_sample(dir: &Path, mode: Mode) -> std::path::PathBuf {
    let infile = dir.join("in.bin");
    fs::write(&infile, vec![0x41u8; 4096]).unwrap();
    let enc = dir.join("in.bin.hadescrypt");
    encrypt_file(&infile, &enc, &secret("pw"), mode, test_params()).unwrap();
    enc
}

/// Flip one byte in the ciphertext body and expect auth failure.
#[test]
fn body_tamper_fails_all_modes() {
    for mode in [Mode::Aes256Gcm, Mode::ChaCha20Poly1305, Mode::Cascade] {
        let dir = tempdir().unwrap();
        let enc = encrypt_sample(dir.path(), mode);

        let ct = fs::read(&enc).unwrap();
        // First body byte, a middle byte, and the final tag byte.
        for &pos in &[HEADER_LEN, HEADER_LEN + 2048, ct.len() - 1] {
            let mut tampered = ct.clone();
            tampered[pos] ^= 0x01;
            fs::write(&enc, &tampered).unwrap();

            let out = dir.path().join("out.bin");
            let err = decrypt_file(&enc, &out, &secret("pw"), test_params()).unwrap_err();
            assert!(
                matches!(err, HadesError::AuthenticationFailed),
                "mode={mode:?} pos={pos} err={err:?}"
            );
            // No output is left behind on failure.
            assert!(!out.exists(), "mode={mode:?} pos={pos}");
        }
    }
}

/// Flipping version, mode, salt, or nonce-prefix bytes must trip a
/// structured error or auth failure, never a silent wrong decryption.
/// (The chunk-size and total-size fields are framing hints only; they are
/// not bound into the AEAD and are covered separately below.)
#[test]
fn header_tamper_never_decrypts() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::Aes256Gcm);
    let ct = fs::read(&enc).unwrap();

    // Bytes 4..30: version, mode, salt, nonce prefix.
    for pos in 4..30 {
        let mut tampered = ct.clone();
        tampered[pos] ^= 0x01;
        fs::write(&enc, &tampered).unwrap();

        let out = dir.path().join("out.bin");
        let err = decrypt_file(&enc, &out, &secret("pw"), test_params()).unwrap_err();
        assert!(
            matches!(
                err,
                HadesError::AuthenticationFailed
                    | HadesError::UnsupportedVersion(_)
                    | HadesError::UnsupportedMode(_)
                    | HadesError::BadFormat
            ),
            "pos={pos} err={err:?}"
        );
    }
}

/// Corrupting the recorded plaintext size breaks framing loudly.
#[test]
fn total_size_tamper_breaks_framing() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::Aes256Gcm);
    let ct = fs::read(&enc).unwrap();

    // Zeroed size: the body becomes unexpected trailing data.
    let mut zeroed = ct.clone();
    zeroed[34..42].fill(0);
    fs::write(&enc, &zeroed).unwrap();
    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::CorruptTrailingData));

    // Inflated size: the reader runs out of ciphertext.
    let mut inflated = ct.clone();
    inflated[34..42].copy_from_slice(&(1u64 << 30).to_be_bytes());
    fs::write(&enc, &inflated).unwrap();
    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::BadFormat));
}

#[test]
fn magic_tamper_is_bad_format() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::Aes256Gcm);
    let mut ct = fs::read(&enc).unwrap();
    ct[0] ^= 0xFF;
    fs::write(&enc, &ct).unwrap();

    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::BadFormat));
}

#[test]
fn wrong_password_fails_on_first_chunk() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::Aes256Gcm);

    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("nope"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::AuthenticationFailed));
}

#[test]
fn trailing_bytes_are_rejected() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::ChaCha20Poly1305);
    let mut ct = fs::read(&enc).unwrap();
    ct.push(0xAA);
    fs::write(&enc, &ct).unwrap();

    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::CorruptTrailingData));
}

#[test]
fn truncated_container_is_bad_format() {
    let dir = tempdir().unwrap();
    let enc = encrypt_sample(dir.path(), Mode::Aes256Gcm);
    let mut ct = fs::read(&enc).unwrap();
    ct.truncate(ct.len() - 7);
    fs::write(&enc, &ct).unwrap();

    let err = decrypt_file(&enc, &dir.path().join("out"), &secret("pw"), test_params()).unwrap_err();
    assert!(matches!(err, HadesError::BadFormat));
}
