//! Directory archival: tar wrapped in gzip, with byte-level progress.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use crate::types::{CancelToken, HadesError, IoResultExt};

/// Gzip stream magic.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Regular-file statistics of a directory tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirStats {
    pub file_count: u64,
    pub total_size: u64,
}

/// Walk `dir` counting regular files and their plaintext bytes.
pub fn dir_stats(dir: &Path) -> Result<DirStats, HadesError> {
    let mut stats = DirStats::default();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            stats.file_count += 1;
            stats.total_size += entry.metadata().map_err(std::io::Error::from)?.len();
        }
    }
    Ok(stats)
}

/// Forwards reads while reporting cumulative bytes to a callback.
struct ProgressReader<'a, R> {
    inner: R,
    processed: &'a mut u64,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        *self.processed += n as u64;
        Ok(n)
    }
}

/// Build a gzip-compressed tar archive of `src_dir` at `dest`.
///
/// Entries are stored relative to `src_dir` with forward slashes and their
/// Unix mode bits. Symlinks and special files are skipped with a warning.
/// Progress runs over total plaintext bytes, computed by a walk up front.
pub fn create_tar_gz(
    src_dir: &Path,
    dest: &Path,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64, u64),
) -> Result<(), HadesError> {
    let total = dir_stats(src_dir)?.total_size;

    let file = File::create(dest).at(dest)?;
    let gz = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(gz);
    builder.follow_symlinks(false);

    let mut processed = 0u64;
    for entry in WalkDir::new(src_dir).min_depth(1) {
        if cancel.is_canceled() {
            return Err(HadesError::Canceled);
        }
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|_| HadesError::BadFormat)?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder.append_dir(rel, entry.path()).at(entry.path())?;
        } else if file_type.is_file() {
            let src = File::open(entry.path()).at(entry.path())?;
            let meta = src.metadata().at(entry.path())?;
            let mut header = tar::Header::new_gnu();
            header.set_metadata(&meta);
            let reader = ProgressReader {
                inner: BufReader::new(src),
                processed: &mut processed,
            };
            builder.append_data(&mut header, rel, reader).at(entry.path())?;
            progress(processed, total);
        } else {
            log::warn!("skipping non-regular entry {}", entry.path().display());
        }
    }

    let gz = builder.into_inner()?;
    let mut file = gz.finish()?;
    file.flush().at(dest)?;
    Ok(())
}

/// Extract a gzip-compressed tar archive into `dest_dir` (created if
/// missing). Entries escaping the destination are refused.
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64, u64),
) -> Result<(), HadesError> {
    let total = fs::metadata(archive_path).at(archive_path)?.len();
    let file = File::open(archive_path).at(archive_path)?;
    let gz = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(gz);
    archive.set_preserve_permissions(true);

    fs::create_dir_all(dest_dir).at(dest_dir)?;

    let mut processed = 0u64;
    for entry in archive.entries()? {
        if cancel.is_canceled() {
            return Err(HadesError::Canceled);
        }
        let mut entry = entry.map_err(|_| HadesError::BadFormat)?;
        let size = entry.header().size().unwrap_or(0);
        if !entry.unpack_in(dest_dir)? {
            log::warn!("refused to unpack entry outside destination");
            continue;
        }
        processed += size;
        progress(processed, total);
    }
    Ok(())
}

/// Heuristic archive probe used by the decrypt pipeline: a gzip magic,
/// then one 512-byte tar header block containing either the literal
/// `ustar` or a NUL terminator inside the 100-byte name field. False
/// positives on arbitrary gzipped data are tolerated; extraction fails
/// cleanly on them.
pub fn is_archive(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 2];
    if file.read_exact(&mut magic).is_err() || magic != GZIP_MAGIC {
        return false;
    }

    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut gz = GzDecoder::new(BufReader::new(file));
    let mut block = [0u8; 512];
    if gz.read_exact(&mut block).is_err() {
        return false;
    }
    block.windows(5).any(|w| w == b"ustar") || block[..100].contains(&0)
}
