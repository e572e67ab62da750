//! Integrity sidecar for archived-folder containers.
//!
//! A small key/value document stored at `<container>.meta`, holding the
//! SHA-256 of the plaintext tar.gz archive. Written after archiving,
//! removed only after a successful verify-and-extract.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{HadesError, IoResultExt};

/// Sidecar file name suffix, appended to the container path.
pub const SIDECAR_SUFFIX: &str = ".meta";

/// The document's `type` field for archived folders.
const ARCHIVE_FOLDER_TYPE: &str = "archive-folder";

/// Parsed sidecar document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarMeta {
    /// Base name of the folder that was archived.
    pub original_folder: String,
    pub file_count: u64,
    pub total_size: u64,
    /// Lowercase hex SHA-256 of the plaintext archive; empty when the
    /// writer could not hash it.
    pub archive_sha256: String,
}

/// `<container>.meta` next to the container.
pub fn sidecar_path(container: &Path) -> PathBuf {
    let mut os = OsString::from(container.as_os_str());
    os.push(SIDECAR_SUFFIX);
    PathBuf::from(os)
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}

impl SidecarMeta {
    /// Render the on-disk document.
    pub fn render(&self) -> String {
        format!(
            "{{\n  \"type\": {},\n  \"original_folder\": {},\n  \"file_count\": {},\n  \"total_size\": {},\n  \"archive_sha256\": {}\n}}",
            quote(ARCHIVE_FOLDER_TYPE),
            quote(&self.original_folder),
            self.file_count,
            self.total_size,
            quote(&self.archive_sha256),
        )
    }

    /// Parse a sidecar document.
    ///
    /// One field per line; tolerant of surrounding whitespace and trailing
    /// commas. A document whose `type` is not `archive-folder` is rejected
    /// as [`HadesError::BadFormat`].
    pub fn parse(text: &str) -> Result<Self, HadesError> {
        let mut doc_type = None;
        let mut meta = SidecarMeta {
            original_folder: String::new(),
            file_count: 0,
            total_size: 0,
            archive_sha256: String::new(),
        };

        for line in text.lines() {
            let line = line.trim().trim_end_matches(',').trim();
            if line.is_empty() || line == "{" || line == "}" {
                continue;
            }
            let Some((raw_key, raw_value)) = line.split_once(':') else {
                continue;
            };
            let key = unquote(raw_key.trim());
            let value = raw_value.trim().trim_end_matches(',').trim();
            match key.as_str() {
                "type" => doc_type = Some(unquote(value)),
                "original_folder" => meta.original_folder = unquote(value),
                "file_count" => {
                    meta.file_count = value.parse().map_err(|_| HadesError::BadFormat)?;
                }
                "total_size" => {
                    meta.total_size = value.parse().map_err(|_| HadesError::BadFormat)?;
                }
                "archive_sha256" => meta.archive_sha256 = unquote(value).to_lowercase(),
                _ => {}
            }
        }

        match doc_type.as_deref() {
            Some(ARCHIVE_FOLDER_TYPE) => Ok(meta),
            _ => Err(HadesError::BadFormat),
        }
    }

    /// Write the document next to its container (0600 on Unix).
    pub fn write(&self, path: &Path) -> Result<(), HadesError> {
        fs::write(path, self.render()).at(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).at(path)?;
        }
        Ok(())
    }

    /// Load and parse a sidecar file.
    pub fn load(path: &Path) -> Result<Self, HadesError> {
        let text = fs::read_to_string(path).at(path)?;
        Self::parse(&text)
    }
}
