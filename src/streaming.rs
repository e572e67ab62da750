//! Streaming container encryption and decryption.
//!
//! Containers are processed one chunk at a time: the writer seals up to
//! [`DEFAULT_CHUNK_SIZE`] plaintext bytes per frame, the reader knows every
//! frame length from the header fields alone. Memory stays bounded by one
//! plaintext chunk plus one ciphertext chunk regardless of file size.

use std::io::{BufReader, BufWriter, Read, Write};

use zeroize::Zeroize;

use crate::crypto::{AeadEngine, generate_nonce_prefix, generate_salt};
use crate::format::{HEADER_LEN, Header, chunk_nonce};
use crate::types::{CancelToken, DEFAULT_CHUNK_SIZE, HadesError, KdfParams, Mode};

/// Upper bound accepted from a header's chunk-size field. Writers emit
/// 1 MiB chunks; the slack tolerates future writers without letting a
/// corrupt header demand an absurd allocation.
const MAX_CHUNK_SIZE: u32 = 1 << 26;

/// Fill `buf` from `reader`, short only at EOF. Returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Encrypt `total_size` plaintext bytes from `input` into a container on
/// `output`.
///
/// The plaintext size must be known up front (the header records it), so
/// file inputs are stat-ed by the caller. Cancellation is polled between
/// chunks; a canceled run leaves a partial output file for the caller to
/// remove. `progress` receives cumulative plaintext bytes against
/// `total_size`.
pub fn write_container<R: Read, W: Write>(
    input: R,
    output: W,
    total_size: u64,
    mode: Mode,
    secret: &[u8],
    params: KdfParams,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64, u64),
) -> Result<(), HadesError> {
    let salt = generate_salt()?;
    let nonce_prefix = generate_nonce_prefix()?;
    let engine = AeadEngine::for_mode(mode, secret, &salt, params)?;

    let header = Header {
        mode,
        salt,
        nonce_prefix,
        chunk_size: DEFAULT_CHUNK_SIZE as u32,
        total_size,
    };

    let mut reader = BufReader::with_capacity(64 * 1024, input);
    let mut writer = BufWriter::with_capacity(64 * 1024, output);
    writer.write_all(&header.encode())?;

    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut processed = 0u64;
    let mut counter = 0u32;

    loop {
        if cancel.is_canceled() {
            buf.zeroize();
            return Err(HadesError::Canceled);
        }

        let n = read_full(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }

        let nonce = chunk_nonce(&nonce_prefix, counter);
        let sealed = engine.seal(&nonce, &buf[..n])?;
        writer.write_all(&sealed)?;
        buf[..n].zeroize();

        processed += n as u64;
        counter = counter.wrapping_add(1);
        progress(processed, total_size);

        if n < DEFAULT_CHUNK_SIZE {
            break;
        }
    }
    buf.zeroize();

    writer.flush()?;
    Ok(())
}

/// Decrypt a container from `input` into `output`, returning the parsed
/// header.
///
/// The header's salt re-derives the key material, so the same secret that
/// produced the container opens it. `force` never bypasses authentication;
/// it is accepted for interface parity and noted when an open fails.
pub fn read_container<R: Read, W: Write>(
    input: R,
    output: W,
    secret: &[u8],
    params: KdfParams,
    force: bool,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64, u64),
) -> Result<Header, HadesError> {
    let mut reader = BufReader::with_capacity(64 * 1024, input);
    let mut writer = BufWriter::with_capacity(64 * 1024, output);

    let mut header_buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_buf).map_err(map_truncation)?;
    let header = Header::decode(&header_buf)?;
    if header.chunk_size > MAX_CHUNK_SIZE {
        return Err(HadesError::BadFormat);
    }

    let engine = AeadEngine::for_mode(header.mode, secret, &header.salt, params)?;
    let overhead = engine.overhead();
    let chunk_size = header.chunk_size as u64;
    let full_chunks = header.total_size / chunk_size;
    let last_chunk = (header.total_size % chunk_size) as usize;

    let mut cipher_buf = vec![0u8; header.chunk_size as usize + overhead];
    let mut processed = 0u64;
    let mut counter = 0u32;

    let mut open_chunk = |reader: &mut BufReader<R>,
                          writer: &mut BufWriter<W>,
                          cipher_buf: &mut [u8],
                          counter: u32,
                          plain_len: usize|
     -> Result<u64, HadesError> {
        let frame = &mut cipher_buf[..plain_len + overhead];
        reader.read_exact(frame).map_err(map_truncation)?;
        let nonce = chunk_nonce(&header.nonce_prefix, counter);
        let mut plain = engine.open(&nonce, frame).map_err(|e| {
            if force && matches!(e, HadesError::AuthenticationFailed) {
                log::warn!("force requested, but an authenticated container cannot be salvaged");
            }
            e
        })?;
        writer.write_all(&plain)?;
        let n = plain.len() as u64;
        plain.zeroize();
        Ok(n)
    };

    for _ in 0..full_chunks {
        if cancel.is_canceled() {
            return Err(HadesError::Canceled);
        }
        processed += open_chunk(
            &mut reader,
            &mut writer,
            &mut cipher_buf,
            counter,
            header.chunk_size as usize,
        )?;
        counter = counter.wrapping_add(1);
        progress(processed, header.total_size);
    }

    if last_chunk > 0 {
        if cancel.is_canceled() {
            return Err(HadesError::Canceled);
        }
        processed += open_chunk(&mut reader, &mut writer, &mut cipher_buf, counter, last_chunk)?;
        progress(processed, header.total_size);
    }

    // The body length is fully determined by the header; anything after
    // the final chunk is corruption.
    let mut probe = [0u8; 1];
    match reader.read(&mut probe)? {
        0 => {}
        _ => return Err(HadesError::CorruptTrailingData),
    }

    writer.flush()?;
    Ok(header)
}

/// A truncated container is a format error, not a plain i/o error.
fn map_truncation(e: std::io::Error) -> HadesError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        HadesError::BadFormat
    } else {
        HadesError::from(e)
    }
}
