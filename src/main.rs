#![forbid(unsafe_code)]
//! Command-line host for the hadescrypt engine.
//!
//! Adapts the orchestrator's callbacks to a terminal: progress goes to
//! stderr, history entries land in the persistent config store.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hadescrypt::{
    CancelToken, Config, HistoryEntry, JobHooks, JobOptions, JobOutcome, KeyfileSet, Mode,
    SecretMaterial, default_config_path, generate_keyfile,
};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

#[derive(Parser, Debug)]
#[command(
    name = "hadescrypt",
    version,
    about = "Encrypt/decrypt files and folders with password + keyfiles"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt files or folders
    Enc(EncArgs),
    /// Decrypt containers (auto-detects archived folders)
    Dec(DecArgs),
    /// Generate a random keyfile
    Keyfile(KeyfileArgs),
}

#[derive(Args, Debug)]
struct EncArgs {
    /// Files or folders to encrypt
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Encryption mode
    #[arg(short = 'm', long, value_enum, default_value_t = ModeChoice::Aes)]
    mode: ModeChoice,

    /// Encrypt folder contents file-by-file instead of archiving
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Delete sources after successful encryption
    #[arg(long = "delete")]
    delete_after: bool,

    /// Keyfile(s), combined with the password in order
    #[arg(short = 'k', long = "keyfile")]
    keyfiles: Vec<PathBuf>,

    /// Make the keyfile order part of the secret
    #[arg(long)]
    require_order: bool,

    /// Read password from file instead of interactive prompt
    #[arg(short = 'p', long = "password-file")]
    password_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecArgs {
    /// Containers or folders holding them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Delete containers after successful decryption
    #[arg(long = "delete")]
    delete_after: bool,

    /// Recorded in history; authenticated data cannot be salvaged
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// Keyfile(s), combined with the password in order
    #[arg(short = 'k', long = "keyfile")]
    keyfiles: Vec<PathBuf>,

    /// Make the keyfile order part of the secret
    #[arg(long)]
    require_order: bool,

    /// Read password from file instead of interactive prompt
    #[arg(short = 'p', long = "password-file")]
    password_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct KeyfileArgs {
    /// Where to write the keyfile
    #[arg(short = 'o', long = "out")]
    output: PathBuf,

    /// Size in KiB
    #[arg(long, default_value_t = 1)]
    size_kib: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeChoice {
    /// AES-256-GCM
    Aes,
    /// ChaCha20-Poly1305
    Chacha,
    /// AES-GCM + ChaCha20-Poly1305 cascade
    Cascade,
}

impl From<ModeChoice> for Mode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::Aes => Mode::Aes256Gcm,
            ModeChoice::Chacha => Mode::ChaCha20Poly1305,
            ModeChoice::Cascade => Mode::Cascade,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init(); // Log to stderr (run with `RUST_LOG=debug`).
    let cli = Cli::parse();
    match cli.cmd {
        Command::Enc(args) => run_enc(args),
        Command::Dec(args) => run_dec(args),
        Command::Keyfile(args) => {
            generate_keyfile(&args.output, args.size_kib)
                .with_context(|| format!("generate keyfile {}", args.output.display()))?;
            eprintln!("wrote {} KiB keyfile to {}", args.size_kib.max(1), args.output.display());
            Ok(())
        }
    }
}

fn read_password(password_file: &Option<PathBuf>, prompt: &str) -> Result<SecretString> {
    if let Some(path) = password_file {
        let mut contents = String::new();
        File::open(path)
            .with_context(|| format!("open password file {}", path.display()))?
            .read_to_string(&mut contents)?;
        let pw = contents.trim_end_matches(['\r', '\n']).to_string();
        contents.zeroize();
        Ok(SecretString::new(pw.into()))
    } else {
        let pw = rpassword::prompt_password(prompt)?;
        Ok(SecretString::new(pw.into()))
    }
}

fn build_secret(
    password_file: &Option<PathBuf>,
    keyfile_paths: &[PathBuf],
    require_order: bool,
    confirm: bool,
) -> Result<SecretMaterial> {
    let password = read_password(password_file, "Password: ")?;
    if confirm && password_file.is_none() {
        let again = rpassword::prompt_password("Confirm password: ")?;
        if again != password.expose_secret() {
            bail!("passwords do not match");
        }
    }

    let mut keyfiles = KeyfileSet::new();
    keyfiles.require_order = require_order;
    for path in keyfile_paths {
        keyfiles.add(path)?;
    }
    Ok(SecretMaterial::with_keyfiles(password, keyfiles))
}

fn load_config() -> (Option<PathBuf>, Config) {
    let path = default_config_path();
    let config = match &path {
        Some(p) => Config::load(p).unwrap_or_default(),
        None => Config::default(),
    };
    (path, config)
}

/// Run a job with terminal hooks and persist its history entries.
fn run_job(
    items: &[PathBuf],
    secret: &SecretMaterial,
    options: &JobOptions,
    config_path: Option<PathBuf>,
    mut config: Config,
    encrypting: bool,
) -> Result<()> {
    let mut entries: Vec<HistoryEntry> = Vec::new();
    let summary = {
        let mut hooks = JobHooks::new()
            .on_status(|s| eprintln!("{s}"))
            .on_progress(|done, total| {
                if total > 0 {
                    eprint!("\r{:>3}%", done * 100 / total);
                }
            })
            .on_history(|e| entries.push(e));
        let cancel = CancelToken::new();
        if encrypting {
            hadescrypt::encrypt(items, secret, options, &mut hooks, &cancel)
        } else {
            hadescrypt::decrypt(items, secret, options, &mut hooks, &cancel)
        }
    };
    eprintln!();

    for entry in entries {
        config.add_history_entry(entry);
    }
    if let Some(path) = &config_path
        && let Err(e) = config.save(path)
    {
        log::warn!("failed to save config: {e}");
    }

    match summary.outcome {
        JobOutcome::Completed => Ok(()),
        JobOutcome::Canceled => bail!("canceled after {} item(s)", summary.completed),
        JobOutcome::Failed(e) => Err(e).with_context(|| {
            format!(
                "{} of {} item(s) completed",
                summary.completed, summary.total
            )
        }),
    }
}

fn run_enc(args: EncArgs) -> Result<()> {
    let secret = build_secret(&args.password_file, &args.keyfiles, args.require_order, true)?;

    let (config_path, config) = load_config();
    let options = JobOptions {
        mode: args.mode.into(),
        recursive: args.recursive,
        delete_after: args.delete_after,
        kdf: config.argon2_defaults.to_kdf_params(),
        ..JobOptions::default()
    };

    run_job(&args.inputs, &secret, &options, config_path, config, true)
}

fn run_dec(args: DecArgs) -> Result<()> {
    let secret = build_secret(&args.password_file, &args.keyfiles, args.require_order, false)?;

    let (config_path, config) = load_config();
    let options = JobOptions {
        delete_after: args.delete_after,
        force_decrypt: args.force,
        kdf: config.argon2_defaults.to_kdf_params(),
        ..JobOptions::default()
    };

    run_job(&args.inputs, &secret, &options, config_path, config, false)
}
