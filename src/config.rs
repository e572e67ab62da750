//! Persistent JSON configuration and operation history.
//!
//! The document lives at `~/.hadescrypt/config.json`. Most of it belongs
//! to the host UI; the engine reads only `argon2_defaults`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{HadesError, IoResultExt, KdfParams};

/// Entries kept in the operation history.
const HISTORY_CAP: usize = 100;

/// Argon2id parameters as stored in the config document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Argon2Defaults {
    /// Memory in KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Defaults {
    fn default() -> Self {
        Self {
            memory: 64 * 1024,
            iterations: 1,
            parallelism: 4,
        }
    }
}

impl Argon2Defaults {
    pub fn to_kdf_params(self) -> KdfParams {
        KdfParams {
            time_cost: self.iterations,
            mem_kib: self.memory,
            parallelism: self.parallelism,
        }
    }
}

/// One completed (or failed) operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub file_name: String,
    /// `encrypt`, `encrypt-folder`, or `decrypt`.
    pub operation: String,
    pub size: u64,
    /// Unix seconds.
    pub timestamp: i64,
    /// `success` or `error`.
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A saved option preset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub name: String,
    pub use_keyfiles: bool,
    pub paranoid_mode: bool,
    pub reed_solomon: bool,
    pub force_decrypt: bool,
    pub split_output: bool,
    pub compress_files: bool,
    pub deniability_mode: bool,
    pub recursive_mode: bool,
}

/// The persistent application state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: String,
    pub window_width: f32,
    pub window_height: f32,
    pub argon2_defaults: Argon2Defaults,
    pub last_used_profile: String,
    pub history: Vec<HistoryEntry>,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "dark".into(),
            window_width: 800.0,
            window_height: 600.0,
            argon2_defaults: Argon2Defaults::default(),
            last_used_profile: String::new(),
            history: Vec::new(),
            profiles: vec![
                Profile {
                    name: "Fast Archive".into(),
                    compress_files: true,
                    recursive_mode: true,
                    ..Profile::default()
                },
                Profile {
                    name: "Ultra Secure".into(),
                    use_keyfiles: true,
                    paranoid_mode: true,
                    reed_solomon: true,
                    deniability_mode: true,
                    ..Profile::default()
                },
                Profile {
                    name: "Cloud Upload".into(),
                    reed_solomon: true,
                    split_output: true,
                    compress_files: true,
                    ..Profile::default()
                },
            ],
        }
    }
}

/// `~/.hadescrypt/config.json`, when a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".hadescrypt").join("config.json"))
}

impl Config {
    /// Load a config document; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, HadesError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).at(path)?;
        serde_json::from_str(&data).map_err(|e| HadesError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Write the document, creating the parent directory as needed.
    pub fn save(&self, path: &Path) -> Result<(), HadesError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|e| HadesError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        fs::write(path, data).at(path)
    }

    /// Append a history entry, keeping only the most recent entries.
    pub fn add_history_entry(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
