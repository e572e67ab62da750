//! SHA-256 helpers shared by keyfiles and the integrity sidecar.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::{HadesError, IoResultExt};

/// Hash everything a reader yields.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Stream a file through SHA-256.
pub fn sha256_file(path: &Path) -> Result<[u8; 32], HadesError> {
    let file = File::open(path).at(path)?;
    sha256_reader(BufReader::new(file)).at(path)
}

/// Lowercase hex encoding of a digest.
pub fn to_hex_lower(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
