// engram: terminal interface over engram-core.
//
//   engram hash --order 3 17 4 99      bucket of one window (or every window)
//   engram tokens "fn main() {}"       token ids from the built-in tokenizer
//   engram fingerprint src/*.rs        JSON map path → fingerprint
//   engram context "some prompt"       the `engram` metadata block
//   engram config                      effective engram.toml
//
// `--checkpoint model.ckpt` loads trained parameters instead of seeding.

use clap::{Parser, Subcommand};
use engram_core::atoms::engram_types::{AppConfig, NeuralFingerprint};
use engram_core::atoms::error::EngramResult;
use engram_core::engine::config::{load_config, to_toml};
use engram_core::engine::engram::{
    EngramModule, FingerprintExtractor, FsContentSource, NGramHasher,
    TokenEncoder, Tokenizer,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "engram", author, version, about, long_about = None)]
struct Cli {
    /// Path to engram.toml (defaults to the platform config dir)
    #[arg(long, global = true, env = "ENGRAM_CONFIG")]
    config: Option<PathBuf>,

    /// Trained parameters to load (overrides `engram.checkpoint`)
    #[arg(long, global = true, env = "ENGRAM_CHECKPOINT")]
    checkpoint: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash token ids. With exactly N ids prints one bucket, otherwise the
    /// bucket of every full window.
    Hash {
        #[arg(long, short = 'n')]
        order: usize,
        #[arg(required = true)]
        tokens: Vec<u32>,
    },
    /// Tokenize text with the configured built-in tokenizer
    Tokens { text: String },
    /// Fingerprint files; unreadable files are logged and skipped
    Fingerprint {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the engram metadata block for a context
    Context { text: String },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let checkpoint = cli.checkpoint;
    let result = load_config(cli.config.as_deref()).and_then(|mut config| {
        if checkpoint.is_some() {
            config.engram.checkpoint = checkpoint;
        }
        run(cli.command, config)
    });
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", json!({ "error": e.to_string() }));
            if e.is_caller_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(command: Command, config: AppConfig) -> EngramResult<ExitCode> {
    match command {
        Command::Hash { order, tokens } => {
            let hasher = NGramHasher::from_config(&config.engram)?;
            let value = if tokens.len() == order {
                json!(hasher.compute_hash(&tokens, order)?)
            } else {
                json!(hasher.hash_windows(&tokens, order)?)
            };
            println!("{}", value);
        }
        Command::Tokens { text } => {
            let tokenizer = Tokenizer::new(config.engram.tokenizer, config.engram.vocab_size);
            println!("{}", json!(tokenizer.encode(&text)));
        }
        Command::Fingerprint { paths } => return fingerprint(&config, &paths),
        Command::Context { text } => {
            let module = EngramModule::load(config.engram.clone(), config.engram.hidden_size)?;
            let tokenizer = Tokenizer::new(config.engram.tokenizer, config.engram.vocab_size);
            let meta = module.metadata(&tokenizer.encode(&text))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Command::Config => print!("{}", to_toml(&config)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn fingerprint(config: &AppConfig, paths: &[PathBuf]) -> EngramResult<ExitCode> {
    let module = EngramModule::load(config.engram.clone(), config.engram.hidden_size)?;
    let tokenizer = Arc::new(Tokenizer::new(config.engram.tokenizer, config.engram.vocab_size));
    let extractor = FingerprintExtractor::from_module(&module, tokenizer)?;
    let source = FsContentSource::new(config.fingerprint.max_file_bytes);

    let mut map: BTreeMap<String, NeuralFingerprint> = BTreeMap::new();
    let mut failed = 0usize;
    for path in paths {
        let key = path.to_string_lossy().to_string();
        match extractor.extract_file(&source, path) {
            Ok(fp) => {
                map.insert(key, fp);
            }
            Err(e) => {
                log::warn!("[engram:fingerprint] {}", e);
                failed += 1;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
