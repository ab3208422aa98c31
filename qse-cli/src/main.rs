// File:    main.rs
// Author:  apezoo
// Date:    2026-10-18
//
// Description: Command-line front end for the key ledger, the AES and OTP ciphers and the
//              envelope layering protocol.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

#![deny(missing_docs)]
//! A command-line interface for the layered AES/OTP envelope engine.

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use qse_core::config::Config;
use qse_core::envelope::AesAlgorithm;
use qse_core::ledger::{self, KeyLedger, KeySource, LedgerState};
use qse_core::protocol::EnvelopeProtocol;
use qse_core::{Error, cbc, gcm, keygen, otp};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Create a ledger\nqse-cli --ledger ./keys.json ledger init\n\n# Wrap a PQC payload\nqse-cli --ledger ./keys.json wrap --input inner.json --output outer.json\n\n# Unwrap it again\nqse-cli --ledger ./keys.json unwrap --input outer.json\n\n# Raw AES-GCM with explicit key and nonce\necho -n hello | qse-cli aes encrypt --mode gcm --key 000102030405060708090a0b0c0d0e0f --iv cafebabefacedbaddecaf888"
)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the key ledger store. Overrides the configuration file.
    #[arg(long, global = true, env = "QSE_LEDGER_PATH")]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the key ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Manage keys within the ledger
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Encrypt or decrypt with AES under an explicit key
    Aes {
        #[command(subcommand)]
        command: AesCommands,
    },
    /// Encrypt or decrypt a file with a one-time pad from the ledger
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },
    /// Wrap an inner PQC payload into an outer envelope
    Wrap {
        /// File holding the inner JSON payload
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the outer envelope. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Middle layer algorithm, e.g. AES-256-GCM. Overrides the configuration file.
        #[arg(long)]
        algorithm: Option<AesAlgorithm>,
    },
    /// Unwrap an outer envelope down to the inner payload
    Unwrap {
        /// File holding the outer envelope
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the recovered text. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LedgerCommands {
    /// Create an empty ledger store
    Init,
    /// Show totals for the ledger
    Status,
    /// List every key in the ledger
    List,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Mint a new key and print its id
    Issue {
        /// The size of the key in bytes
        #[arg(short, long, default_value_t = 32)]
        size: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Gcm,
    Cbc,
}

#[derive(Subcommand)]
enum AesCommands {
    /// Encrypt stdin
    Encrypt {
        /// Block cipher mode
        #[arg(long, value_enum, default_value_t = Mode::Gcm)]
        mode: Mode,
        /// Key, hex (16, 24 or 32 bytes)
        #[arg(long)]
        key: String,
        /// IV or nonce, hex
        #[arg(long)]
        iv: String,
        /// Associated data, hex (GCM only)
        #[arg(long, default_value = "")]
        aad: String,
    },
    /// Decrypt a hex ciphertext and print the plaintext
    Decrypt {
        /// Block cipher mode
        #[arg(long, value_enum, default_value_t = Mode::Gcm)]
        mode: Mode,
        /// Key, hex (16, 24 or 32 bytes)
        #[arg(long)]
        key: String,
        /// IV or nonce, hex
        #[arg(long)]
        iv: String,
        /// Ciphertext, hex. Read from stdin when omitted.
        #[arg(long)]
        ciphertext: Option<String>,
        /// Tag, hex (GCM only)
        #[arg(long)]
        tag: Option<String>,
        /// Associated data, hex (GCM only)
        #[arg(long, default_value = "")]
        aad: String,
    },
}

#[derive(Subcommand)]
enum OtpCommands {
    /// Encrypt a file, consuming pad bytes from the ledger
    Encrypt {
        /// Path to the input file to encrypt
        #[arg(short, long)]
        input: PathBuf,
        /// Path to the output file to save the encrypted content
        #[arg(short, long)]
        output: PathBuf,
        /// Key to take the pad from. A fresh id is minted when omitted.
        #[arg(long, value_name = "KEY_ID")]
        key_id: Option<String>,
    },
    /// Decrypt a file with a key already in the ledger
    Decrypt {
        /// Path to the input file to decrypt
        #[arg(short, long)]
        input: PathBuf,
        /// Path to the output file to save the decrypted content
        #[arg(short, long)]
        output: PathBuf,
        /// The key the file was encrypted with
        #[arg(long, value_name = "KEY_ID")]
        key_id: String,
    },
}

/// Logs `context` with the error and exits; authentication failures exit with 2.
fn or_exit<T>(result: qse_core::Result<T>, context: &str) -> T {
    result.unwrap_or_else(|e| {
        error!("{context}: {e}");
        exit(if matches!(e, Error::Authentication) { 2 } else { 1 });
    })
}

fn parse_hex(field: &str, value: &str) -> Vec<u8> {
    hex::decode(value.trim()).unwrap_or_else(|e| {
        error!("Bad {field}: {e}");
        exit(1);
    })
}

fn read_stdin() -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Err(e) = std::io::stdin().read_to_end(&mut buffer) {
        error!("Failed to read from stdin: {e}");
        exit(1);
    }
    buffer
}

fn write_output(output: Option<&Path>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, text) {
                error!("Failed to write '{}': {e}", path.display());
                exit(1);
            }
            info!("Wrote '{}'", path.display());
        }
        None => println!("{text}"),
    }
}

fn read_text(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        error!("Failed to read '{}': {e}", path.display());
        exit(1);
    })
}

fn open_ledger(config: &Config) -> KeyLedger {
    let Some(path) = &config.ledger.store_path else {
        error!("A --ledger path is required for this command.");
        exit(1);
    };
    if !path.exists() {
        error!(
            "Ledger '{}' does not exist. Please create it with 'ledger init'.",
            path.display()
        );
        exit(1);
    }
    or_exit(KeyLedger::open(&config.ledger), "Failed to open ledger")
}

fn print_status(path: &Path, state: &LedgerState) {
    let total = state.total_bytes();
    let used = state.total_used_bytes();
    println!("Ledger Status for: {}", path.display());
    println!("{:-<40}", "");
    println!("Total Keys: {}", state.total_keys());
    println!("  - Fully Used: {}", state.fully_used_keys());
    println!();
    println!("Total Key Material: {total} bytes");
    println!("  - Used: {used} bytes");
    println!("  - Remaining: {} bytes", total.saturating_sub(used));
}

fn print_list(path: &Path, state: &LedgerState) {
    if state.keys.is_empty() {
        println!("No keys found in ledger '{}'", path.display());
        return;
    }
    println!("Keys in ledger '{}':", path.display());
    println!(
        "{:<26} {:<10} {:<12} {:<16}",
        "ID", "Bytes", "Used", "Fingerprint"
    );
    println!("{:-<68}", "");
    let mut records: Vec<_> = state.keys.values().collect();
    records.sort_by_key(|r| r.created_at_ms);
    for record in records {
        println!(
            "{:<26} {:<10} {:<12} {:<16}",
            record.id,
            record.len(),
            record.total_used_bytes(),
            record.fingerprint()
        );
    }
}

fn run_aes(command: &AesCommands) {
    match command {
        AesCommands::Encrypt { mode, key, iv, aad } => {
            let key = parse_hex("key", key);
            let iv = parse_hex("IV", iv);
            let plaintext = read_stdin();
            match mode {
                Mode::Gcm => {
                    let aad = parse_hex("AAD", aad);
                    let (ciphertext, tag) =
                        or_exit(gcm::encrypt(&plaintext, &aad, &key, &iv), "Encrypt failed");
                    println!("CIPHERTEXT_HEX:\n{}", hex::encode(ciphertext));
                    println!("TAG_HEX:\n{}", hex::encode(tag));
                }
                Mode::Cbc => {
                    let ciphertext = or_exit(cbc::encrypt(&plaintext, &key, &iv), "Encrypt failed");
                    println!("CIPHERTEXT_HEX:\n{}", hex::encode(ciphertext));
                }
            }
        }
        AesCommands::Decrypt {
            mode,
            key,
            iv,
            ciphertext,
            tag,
            aad,
        } => {
            let key = parse_hex("key", key);
            let iv = parse_hex("IV", iv);
            let ciphertext = match ciphertext {
                Some(hex_text) => parse_hex("ciphertext", hex_text),
                None => parse_hex("ciphertext", &String::from_utf8_lossy(&read_stdin())),
            };
            let plaintext = match mode {
                Mode::Gcm => {
                    let Some(tag) = tag else {
                        error!("A --tag is required for GCM decryption.");
                        exit(1);
                    };
                    let tag = parse_hex("tag", tag);
                    let aad = parse_hex("AAD", aad);
                    or_exit(
                        gcm::decrypt(&ciphertext, &aad, &key, &iv, &tag),
                        "Decrypt failed",
                    )
                }
                Mode::Cbc => or_exit(cbc::decrypt(&ciphertext, &key, &iv), "Decrypt failed"),
            };
            let mut stdout = std::io::stdout();
            if let Err(e) = stdout
                .write_all(&plaintext)
                .and_then(|()| stdout.write_all(b"\n"))
            {
                error!("Failed to write plaintext: {e}");
                exit(1);
            }
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => or_exit(Config::load(path), "Failed to load configuration"),
        None => Config::default(),
    };
    if let Some(path) = cli.ledger {
        config.ledger.store_path = Some(path);
    }

    match cli.command {
        Commands::Ledger { command } => match command {
            LedgerCommands::Init => {
                let Some(path) = &config.ledger.store_path else {
                    error!("The --ledger path is required for 'ledger init'");
                    exit(1);
                };
                if path.exists() {
                    warn!("Ledger '{}' already exists; leaving it untouched.", path.display());
                    return;
                }
                info!("Initializing new ledger at '{}'", path.display());
                or_exit(
                    ledger::save_state(path, &LedgerState::default()),
                    "Failed to save initial state",
                );
                info!("Ledger initialized successfully.");
            }
            LedgerCommands::Status => {
                let keys = open_ledger(&config);
                let state = keys.snapshot();
                if let Some(path) = keys.store_path() {
                    print_status(path, &state);
                }
            }
            LedgerCommands::List => {
                let keys = open_ledger(&config);
                let state = keys.snapshot();
                if let Some(path) = keys.store_path() {
                    print_list(path, &state);
                }
            }
        },
        Commands::Key {
            command: KeyCommands::Issue { size },
        } => {
            if size == 0 {
                error!("Key size must be greater than zero.");
                exit(1);
            }
            let keys = open_ledger(&config);
            let (key_id, _) = or_exit(keys.issue(size), "Failed to issue key");
            info!("Issued {size}-byte key '{key_id}'");
            println!("{key_id}");
        }
        Commands::Aes { command } => run_aes(&command),
        Commands::Otp { command } => {
            let keys = open_ledger(&config);
            match command {
                OtpCommands::Encrypt {
                    input,
                    output,
                    key_id,
                } => {
                    let plaintext =
                        or_exit(fs::read(&input).map_err(Error::from), "Failed to read input");
                    let key_id = key_id.unwrap_or_else(keygen::new_key_id);
                    let sealed = or_exit(
                        otp::encrypt(&keys, &plaintext, &key_id),
                        "Encryption refused",
                    );
                    or_exit(
                        fs::write(&output, &sealed.ciphertext).map_err(Error::from),
                        "Failed to write output",
                    );
                    info!(
                        "Encrypted '{}' to '{}' with {} bytes of key '{}'",
                        input.display(),
                        output.display(),
                        sealed.bytes_used,
                        sealed.key_id
                    );
                    println!("{}", sealed.key_id);
                }
                OtpCommands::Decrypt {
                    input,
                    output,
                    key_id,
                } => {
                    let ciphertext =
                        or_exit(fs::read(&input).map_err(Error::from), "Failed to read input");
                    let pad = or_exit(keys.fetch_key(&key_id), "Failed to fetch key");
                    let plaintext = or_exit(otp::decrypt(&ciphertext, &pad), "Decryption failed");
                    or_exit(
                        fs::write(&output, plaintext).map_err(Error::from),
                        "Failed to write output",
                    );
                    info!(
                        "Successfully decrypted file '{}' to '{}'",
                        input.display(),
                        output.display()
                    );
                }
            }
        }
        Commands::Wrap {
            input,
            output,
            algorithm,
        } => {
            if let Some(algorithm) = algorithm {
                config.protocol.algorithm = algorithm;
            }
            let keys = open_ledger(&config);
            let protocol = EnvelopeProtocol::new(keys, config.protocol);
            let inner = read_text(&input);
            let outer = or_exit(protocol.wrap(inner.trim_end()), "Wrap failed");
            write_output(output.as_deref(), &outer);
        }
        Commands::Unwrap { input, output } => {
            let keys = open_ledger(&config);
            let protocol = EnvelopeProtocol::new(keys, config.protocol);
            let outer = read_text(&input);
            let recovered = or_exit(protocol.unwrap(&outer), "Unwrap failed");
            write_output(output.as_deref(), &recovered);
        }
    }
}
