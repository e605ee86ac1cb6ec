// engram-server: loads engram.toml and serves the Engram HTTP API.
//
// Config path: first CLI argument, else $ENGRAM_CONFIG, else the platform
// config dir, else built-in defaults.

use engram_core::engine::config::load_config;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let explicit: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ENGRAM_CONFIG").ok())
        .map(PathBuf::from);

    let config = match load_config(explicit.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("[server] {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = openengram::serve(config).await {
        log::error!("[server] {}", e);
        std::process::exit(1);
    }
}
