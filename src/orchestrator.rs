//! Job orchestration: single, batch, and recursive flows with
//! cancellation, aggregated progress, and history reporting.
//!
//! The orchestrator is the only surface a host talks to. It exposes pure
//! callbacks (progress, status, history); the host adapts them to its own
//! thread model. All work happens on the calling thread, which hosts are
//! expected to make a background worker.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, SecretString};
use walkdir::WalkDir;
use zeroize::Zeroizing;

use crate::archive::{create_tar_gz, dir_stats};
use crate::config::HistoryEntry;
use crate::file::{
    TempFileGuard, has_encrypted_suffix, output_path_for_decrypt, output_path_for_encrypt,
};
use crate::hash::{sha256_file, to_hex_lower};
use crate::keyfile::KeyfileSet;
use crate::pipeline::decrypt_file_auto;
use crate::sidecar::{SidecarMeta, sidecar_path};
use crate::streaming::write_container;
use crate::types::{CancelToken, HadesError, IoResultExt, JobOptions, Mode};

/// Suffix of the temporary archive built for folder encryption.
const TEMP_ARCHIVE_SUFFIX: &str = ".temp.tar.gz";

/// Minimum interval between progress emissions (~30 Hz).
const PROGRESS_INTERVAL: Duration = Duration::from_millis(33);

/// Password plus the ordered keyfile set for one job.
pub struct SecretMaterial {
    password: SecretString,
    pub keyfiles: KeyfileSet,
}

impl SecretMaterial {
    pub fn new(password: SecretString) -> Self {
        Self {
            password,
            keyfiles: KeyfileSet::new(),
        }
    }

    pub fn with_keyfiles(password: SecretString, keyfiles: KeyfileSet) -> Self {
        Self { password, keyfiles }
    }

    /// The bytes fed to the KDF: the raw password, or the compound secret
    /// when keyfiles are present.
    pub(crate) fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        if self.keyfiles.has_entries() {
            let compound = self.keyfiles.combine(self.password.expose_secret().as_bytes());
            Zeroizing::new(compound.to_vec())
        } else {
            Zeroizing::new(self.password.expose_secret().as_bytes().to_vec())
        }
    }
}

/// Host callbacks for one job. All optional; emissions are throttled and
/// progress is monotone non-decreasing.
#[derive(Default)]
pub struct JobHooks<'a> {
    progress: Option<Box<dyn FnMut(u64, u64) + 'a>>,
    status: Option<Box<dyn FnMut(&str) + 'a>>,
    history: Option<Box<dyn FnMut(HistoryEntry) + 'a>>,
    last_progress: Option<Instant>,
    high_water: u64,
}

impl<'a> JobHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl FnMut(u64, u64) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_status(mut self, f: impl FnMut(&str) + 'a) -> Self {
        self.status = Some(Box::new(f));
        self
    }

    pub fn on_history(mut self, f: impl FnMut(HistoryEntry) + 'a) -> Self {
        self.history = Some(Box::new(f));
        self
    }

    fn emit_progress(&mut self, processed: u64, total: u64) {
        let processed = processed.max(self.high_water);
        self.high_water = processed;
        let Some(f) = self.progress.as_mut() else {
            return;
        };
        let now = Instant::now();
        let due = match self.last_progress {
            Some(last) => now.duration_since(last) >= PROGRESS_INTERVAL,
            None => true,
        };
        // Terminal updates always go through.
        if due || processed >= total {
            self.last_progress = Some(now);
            f(processed, total);
        }
    }

    fn emit_status(&mut self, status: &str) {
        if let Some(f) = self.status.as_mut() {
            f(status);
        }
    }

    fn emit_history(&mut self, entry: HistoryEntry) {
        if let Some(f) = self.history.as_mut() {
            f(entry);
        }
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed,
    Canceled,
    Failed(HadesError),
}

/// Result of a batch job. Items are processed in submission order and the
/// job stops at the first failure, so `completed` counts a prefix of the
/// submitted items.
#[derive(Debug)]
pub struct JobSummary {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub outcome: JobOutcome,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn temp_archive_path(out: &Path) -> PathBuf {
    let mut os = OsString::from(out.as_os_str());
    os.push(TEMP_ARCHIVE_SUFFIX);
    PathBuf::from(os)
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

/// Encrypt a batch of files and/or directories.
pub fn encrypt(
    items: &[PathBuf],
    secret: &SecretMaterial,
    options: &JobOptions,
    hooks: &mut JobHooks<'_>,
    cancel: &CancelToken,
) -> JobSummary {
    let start = Instant::now();
    hooks.emit_status("Encrypting");

    if options.mode == Mode::External {
        let err = HadesError::UnsupportedMode(Mode::External.id());
        hooks.emit_status(&format!("❌ {err}"));
        return JobSummary {
            completed: 0,
            total: items.len(),
            elapsed: start.elapsed(),
            outcome: JobOutcome::Failed(err),
        };
    }

    let mut runner = Runner {
        secret: secret.secret_bytes(),
        options: options.clone(),
        cancel: cancel.clone(),
        hooks: &mut *hooks,
        total: eligible_plaintext_bytes(items),
        processed: 0,
    };

    let mut completed = 0;
    let mut outcome = JobOutcome::Completed;
    for (idx, item) in items.iter().enumerate() {
        if cancel.is_canceled() {
            outcome = JobOutcome::Canceled;
            break;
        }
        match runner.encrypt_item(item, idx, items.len()) {
            Ok(()) => completed += 1,
            Err(HadesError::Canceled) => {
                outcome = JobOutcome::Canceled;
                break;
            }
            Err(e) => {
                outcome = JobOutcome::Failed(e);
                break;
            }
        }
    }

    let elapsed = start.elapsed();
    match &outcome {
        JobOutcome::Completed => hooks.emit_status(&format!(
            "✅ Encrypted {completed} item(s) in {:?}",
            round_to_millis(elapsed)
        )),
        JobOutcome::Canceled => hooks.emit_status("⏹ Canceled"),
        JobOutcome::Failed(e) => hooks.emit_status(&format!("❌ {e}")),
    }

    JobSummary {
        completed,
        total: items.len(),
        elapsed,
        outcome,
    }
}

/// Decrypt a batch of containers and/or directories holding them.
pub fn decrypt(
    items: &[PathBuf],
    secret: &SecretMaterial,
    options: &JobOptions,
    hooks: &mut JobHooks<'_>,
    cancel: &CancelToken,
) -> JobSummary {
    let start = Instant::now();
    hooks.emit_status("Decrypting");

    let mut runner = Runner {
        secret: secret.secret_bytes(),
        options: options.clone(),
        cancel: cancel.clone(),
        hooks: &mut *hooks,
        total: eligible_ciphertext_bytes(items),
        processed: 0,
    };

    let mut completed = 0;
    let mut outcome = JobOutcome::Completed;
    for (idx, item) in items.iter().enumerate() {
        if cancel.is_canceled() {
            outcome = JobOutcome::Canceled;
            break;
        }
        match runner.decrypt_item(item, idx, items.len()) {
            Ok(()) => completed += 1,
            Err(HadesError::Canceled) => {
                outcome = JobOutcome::Canceled;
                break;
            }
            Err(e) => {
                outcome = JobOutcome::Failed(e);
                break;
            }
        }
    }

    let elapsed = start.elapsed();
    match &outcome {
        JobOutcome::Completed => hooks.emit_status(&format!(
            "✅ Decrypted {completed} item(s) in {:?}",
            round_to_millis(elapsed)
        )),
        JobOutcome::Canceled => hooks.emit_status("⏹ Canceled"),
        JobOutcome::Failed(e) => hooks.emit_status(&format!("❌ {e}")),
    }

    JobSummary {
        completed,
        total: items.len(),
        elapsed,
        outcome,
    }
}

/// Total plaintext bytes a job will touch, skipping already-encrypted
/// names. Best effort: unreadable entries are ignored here and surface
/// during processing instead.
fn eligible_plaintext_bytes(items: &[PathBuf]) -> u64 {
    let mut total = 0u64;
    for item in items {
        let Ok(meta) = fs::metadata(item) else {
            continue;
        };
        if meta.is_dir() {
            for entry in WalkDir::new(item).into_iter().flatten() {
                if entry.file_type().is_file()
                    && !has_encrypted_suffix(entry.path())
                    && let Ok(m) = entry.metadata()
                {
                    total += m.len();
                }
            }
        } else if meta.is_file() && !has_encrypted_suffix(item) {
            total += meta.len();
        }
    }
    total
}

/// Total ciphertext bytes a decrypt job will read. Directories contribute
/// only files carrying a recognized encrypted suffix.
fn eligible_ciphertext_bytes(items: &[PathBuf]) -> u64 {
    let mut total = 0u64;
    for item in items {
        let Ok(meta) = fs::metadata(item) else {
            continue;
        };
        if meta.is_dir() {
            for entry in WalkDir::new(item).into_iter().flatten() {
                if entry.file_type().is_file()
                    && has_encrypted_suffix(entry.path())
                    && let Ok(m) = entry.metadata()
                {
                    total += m.len();
                }
            }
        } else if meta.is_file() {
            total += meta.len();
        }
    }
    total
}

/// Per-job state shared across items.
struct Runner<'a, 'h> {
    secret: Zeroizing<Vec<u8>>,
    options: JobOptions,
    cancel: CancelToken,
    hooks: &'a mut JobHooks<'h>,
    total: u64,
    processed: u64,
}

impl Runner<'_, '_> {
    fn record(&mut self, file_name: String, operation: &str, size: u64, error: Option<String>) {
        let result = if error.is_some() { "error" } else { "success" };
        self.hooks.emit_history(HistoryEntry {
            file_name,
            operation: operation.to_string(),
            size,
            timestamp: now_unix(),
            result: result.to_string(),
            error,
        });
    }

    fn encrypt_item(&mut self, item: &Path, idx: usize, count: usize) -> Result<(), HadesError> {
        let base = base_name(item);
        self.hooks
            .emit_status(&format!("Encrypting {}/{}: {base}", idx + 1, count));

        let meta = match fs::metadata(item).at(item) {
            Ok(meta) => meta,
            Err(e) => {
                self.record(base, "encrypt", 0, Some(e.to_string()));
                return Err(e);
            }
        };
        let result = if meta.is_dir() {
            if self.options.recursive {
                self.encrypt_dir_recursive(item).map(|size| ("encrypt-folder", size))
            } else {
                self.encrypt_dir_archive(item).map(|size| ("encrypt-folder", size))
            }
        } else if meta.is_file() {
            if has_encrypted_suffix(item) {
                log::debug!("skipping already-encrypted {}", item.display());
                return Ok(());
            }
            self.encrypt_one_file(item, &output_path_for_encrypt(item))
                .map(|size| ("encrypt", size))
        } else {
            log::warn!("skipping non-regular item {}", item.display());
            return Ok(());
        };

        match result {
            Ok((operation, size)) => {
                self.record(base, operation, size, None);
                if self.options.delete_after {
                    let removal = if meta.is_dir() {
                        fs::remove_dir_all(item)
                    } else {
                        fs::remove_file(item)
                    };
                    removal.at(item)?;
                }
                Ok(())
            }
            Err(HadesError::Canceled) => Err(HadesError::Canceled),
            Err(e) => {
                self.record(base, "encrypt", 0, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Encrypt one regular file into a container beside it.
    fn encrypt_one_file(&mut self, input: &Path, out: &Path) -> Result<u64, HadesError> {
        let size = fs::metadata(input).at(input)?.len();
        let in_file = File::open(input).at(input)?;
        let out_file = File::create(out).at(out)?;

        let base = self.processed;
        let total = self.total;
        let hooks = &mut *self.hooks;
        write_container(
            in_file,
            out_file,
            size,
            self.options.mode,
            &self.secret,
            self.options.kdf,
            &self.cancel,
            |done, _| hooks.emit_progress(base + done, total),
        )?;

        self.processed += size;
        Ok(size)
    }

    /// Archive a directory to a temporary tar.gz, encrypt the archive, and
    /// leave an integrity sidecar next to the container.
    fn encrypt_dir_archive(&mut self, dir: &Path) -> Result<u64, HadesError> {
        let out = output_path_for_encrypt(dir);
        let stats = dir_stats(dir)?;
        let tmp = temp_archive_path(&out);
        let _guard = TempFileGuard::new(tmp.clone());

        // Phase 1: archive (first half of this item's share).
        let base = self.processed;
        let total = self.total;
        let item_bytes = stats.total_size;
        let hooks = &mut *self.hooks;
        create_tar_gz(dir, &tmp, &self.cancel, |done, _| {
            hooks.emit_progress(base + done / 2, total)
        })?;

        let digest = sha256_file(&tmp)?;
        let archive_size = fs::metadata(&tmp).at(&tmp)?.len();

        // Phase 2: encrypt the archive (second half).
        let in_file = File::open(&tmp).at(&tmp)?;
        let out_file = File::create(&out).at(&out)?;
        let hooks = &mut *self.hooks;
        write_container(
            in_file,
            out_file,
            archive_size,
            self.options.mode,
            &self.secret,
            self.options.kdf,
            &self.cancel,
            |done, _| {
                let scaled = if archive_size == 0 {
                    0
                } else {
                    (done as u128 * (item_bytes / 2) as u128 / archive_size as u128) as u64
                };
                hooks.emit_progress(base + item_bytes / 2 + scaled, total)
            },
        )?;

        SidecarMeta {
            original_folder: base_name(dir),
            file_count: stats.file_count,
            total_size: stats.total_size,
            archive_sha256: to_hex_lower(&digest),
        }
        .write(&sidecar_path(&out))?;

        self.processed += item_bytes;
        self.hooks.emit_progress(self.processed, self.total);
        Ok(item_bytes)
    }

    /// Encrypt every plaintext file under `dir` in place, preserving the
    /// tree structure.
    fn encrypt_dir_recursive(&mut self, dir: &Path) -> Result<u64, HadesError> {
        let mut files = Vec::new();
        let mut folder_bytes = 0u64;
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && !has_encrypted_suffix(entry.path()) {
                folder_bytes += entry.metadata().map_err(std::io::Error::from)?.len();
                files.push(entry.into_path());
            }
        }
        if files.is_empty() {
            return Err(HadesError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no files to encrypt in directory",
                ),
            });
        }

        for file in files {
            if self.cancel.is_canceled() {
                return Err(HadesError::Canceled);
            }
            self.encrypt_one_file(&file, &output_path_for_encrypt(&file))?;
            if self.options.delete_after {
                fs::remove_file(&file).at(&file)?;
            }
        }
        Ok(folder_bytes)
    }

    fn decrypt_item(&mut self, item: &Path, idx: usize, count: usize) -> Result<(), HadesError> {
        let base = base_name(item);
        self.hooks
            .emit_status(&format!("Decrypting {}/{}: {base}", idx + 1, count));

        let meta = match fs::metadata(item).at(item) {
            Ok(meta) => meta,
            Err(e) => {
                self.record(base, "decrypt", 0, Some(e.to_string()));
                return Err(e);
            }
        };
        let result = if meta.is_dir() {
            self.decrypt_dir_recursive(item)
        } else {
            self.decrypt_one_file(item).map(|size| {
                self.processed += size;
                size
            })
        };

        match result {
            Ok(size) => {
                self.record(base, "decrypt", size, None);
                if self.options.delete_after && meta.is_file() {
                    fs::remove_file(item).at(item)?;
                }
                Ok(())
            }
            Err(HadesError::Canceled) => Err(HadesError::Canceled),
            Err(e) => {
                self.record(base, "decrypt", 0, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Decrypt one container through the auto pipeline.
    fn decrypt_one_file(&mut self, input: &Path) -> Result<u64, HadesError> {
        let size = fs::metadata(input).at(input)?.len();
        let out = output_path_for_decrypt(input);

        let base = self.processed;
        let total = self.total;
        let hooks = &mut *self.hooks;
        decrypt_file_auto(
            input,
            &out,
            &self.secret,
            self.options.kdf,
            self.options.force_decrypt,
            &self.cancel,
            |done, _| hooks.emit_progress(base + done, total),
        )?;
        Ok(size)
    }

    /// Decrypt every recognized encrypted file under `dir`.
    fn decrypt_dir_recursive(&mut self, dir: &Path) -> Result<u64, HadesError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && has_encrypted_suffix(entry.path()) {
                files.push(entry.into_path());
            }
        }
        if files.is_empty() {
            return Err(HadesError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no encrypted files found in folder",
                ),
            });
        }

        let mut folder_bytes = 0u64;
        for file in files {
            if self.cancel.is_canceled() {
                return Err(HadesError::Canceled);
            }
            let size = self.decrypt_one_file(&file)?;
            self.processed += size;
            folder_bytes += size;
            if self.options.delete_after {
                fs::remove_file(&file).at(&file)?;
            }
        }
        Ok(folder_bytes)
    }
}
