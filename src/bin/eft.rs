// src/bin/eft.rs
//! eft: encrypt, decrypt or re-key every file under a working directory

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use encrypted_file_tree::{
    decrypt_all, default_config_path, encrypt_all, load_key, load_or_generate_key, rotate_key,
    rotate_key_in_place, store_key, Config, CoreError, ExceptionSet, KeyMaterial,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    EncryptAll,
    DecryptAll,
    RotateKey,
}

#[derive(Debug, Parser)]
#[command(name = "eft", version, about = "Encrypt every file under a directory with one key")]
struct Cli {
    /// The directory to work from
    #[arg(short = 'w', long = "working-dir")]
    working_dir: Option<PathBuf>,

    /// Config file (default: $EFT_CONFIG, else <working dir>/config.json)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Action to perform; without one an interactive menu is shown
    #[arg(short = 'a', long, value_enum)]
    action: Option<Action>,

    /// Exit instead of generating a key when the key file is missing
    #[arg(short = 'f', long)]
    fail_if_key_not_found: bool,

    /// Keep plaintext after encrypting and ciphertext after decrypting
    #[arg(long)]
    keep_source: bool,

    /// Rotate by re-encrypting each file directly, never writing plaintext
    #[arg(long)]
    in_place: bool,
}

struct Session {
    root: PathBuf,
    exceptions: ExceptionSet,
    key_path: PathBuf,
    pending_key_path: PathBuf,
    key: KeyMaterial,
    delete_source: bool,
    in_place: bool,
}

impl Session {
    fn run(&mut self, action: Action) -> Result<()> {
        match action {
            Action::EncryptAll => {
                let summary = encrypt_all(&self.root, &self.exceptions, &self.key, self.delete_source)?;
                println!("All files have been encrypted ({} file(s)).\n", summary.files);
            }
            Action::DecryptAll => {
                let summary = decrypt_all(&self.root, &self.exceptions, &self.key, self.delete_source)?;
                println!("All files have been decrypted ({} file(s)).\n", summary.files);
            }
            Action::RotateKey => {
                self.rotate()?;
                println!("Key has been rotated and used to encrypt all files.\n");
            }
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        let result = if self.in_place {
            rotate_key_in_place(&self.root, &self.exceptions, &self.key)
        } else {
            rotate_key(&self.root, &self.exceptions, &self.key)
        };

        match result {
            Ok(new_key) => {
                store_key(&self.key_path, &new_key).context("failed to store rotated key")?;
                self.key = new_key;
                Ok(())
            }
            Err(CoreError::RotationIncomplete { new_key, source }) => {
                // In-place leaves files under both keys, so the old key must stay too
                let target = if self.in_place {
                    self.pending_key_path.clone()
                } else {
                    self.key_path.clone()
                };
                store_key(&target, &new_key).context("failed to store partially used key")?;
                warn!(path = %target.display(), "new key saved despite failed rotation");
                if !self.in_place {
                    self.key = new_key;
                }
                Err(anyhow::Error::new(*source).context("key rotation did not finish"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Version {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let interactive = cli.action.is_none();
    let base_dir = match &cli.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let mut config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&base_dir));
    if interactive && !config_path.exists() {
        let answer = prompt(&format!(
            "Please enter the path to the config file ({}): ",
            config_path.display()
        ))?;
        if let Some(answer) = answer.filter(|a| !a.is_empty()) {
            config_path = PathBuf::from(answer);
        }
    }
    let config = Config::load_or_create(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let root = match (&cli.working_dir, &config.working_directory) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dir)) => dir.clone(),
        (None, None) => base_dir,
    };
    info!(root = %root.display(), config = %config_path.display(), "working directory resolved");

    let key_path = config.key_path(&root);
    let pending_key_path = config.pending_key_path(&root);
    let key = load_tree_key(&key_path, cli.fail_if_key_not_found)?;

    let mut session = Session {
        root,
        exceptions: config.exception_set(),
        key_path,
        pending_key_path,
        key,
        delete_source: !cli.keep_source,
        in_place: cli.in_place,
    };

    match cli.action {
        Some(action) => session.run(action),
        None => menu(&mut session),
    }
}

fn load_tree_key(key_path: &Path, fail_if_missing: bool) -> Result<KeyMaterial> {
    if fail_if_missing {
        return load_key(key_path)
            .with_context(|| format!("key file at {} could not be loaded", key_path.display()));
    }
    if !key_path.exists() {
        warn!(path = %key_path.display(), "key file not found, generating a new one");
    }
    load_or_generate_key(key_path)
        .with_context(|| format!("key file at {} could not be loaded", key_path.display()))
}

fn menu(session: &mut Session) -> Result<()> {
    static OPTIONS: [(Option<Action>, &str); 4] = [
        (Some(Action::EncryptAll), "Encrypt all files"),
        (Some(Action::DecryptAll), "Decrypt all files"),
        (Some(Action::RotateKey), "Rotate key"),
        (None, "Exit"),
    ];

    loop {
        println!("=======================================================");
        for (i, (_, label)) in OPTIONS.iter().enumerate() {
            println!("{}. {label}", i + 1);
        }
        let Some(input) = prompt("Please enter a value corresponding to an option above: ")? else {
            return Ok(());
        };

        let choice = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| OPTIONS.get(i));
        match choice {
            Some((Some(action), _)) => {
                if let Err(e) = session.run(*action) {
                    error!("{e:#}");
                }
            }
            Some((None, _)) => {
                println!("Exiting...");
                return Ok(());
            }
            None => println!("Invalid input. Please try again.\n"),
        }
    }
}

/// Print `question` and read one trimmed line; `None` on end of input
fn prompt(question: &str) -> Result<Option<String>> {
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}
