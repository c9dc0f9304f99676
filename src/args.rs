use std::path::PathBuf;

use clap::Parser;

use crate::constants::{
    DEFAULT_CODES_API_BASE, DEFAULT_CODES_PATH, DEFAULT_CONFIG_PATH, DEFAULT_SERVER_PORT,
};

/// Process-level settings. Each flag falls back to its environment variable (a `.env` file is
/// loaded first if present), then to the default.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Relays new game redemption codes to chat webhooks")]
pub struct Cli {
    /// Path of the user configuration document
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config_path: PathBuf,

    /// Path of the sent-code history document
    #[arg(long, env = "CODES_PATH", default_value = DEFAULT_CODES_PATH)]
    pub codes_path: PathBuf,

    /// Control surface listen port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Base URL of the per-game code endpoints (`<base>/<game>/codes`)
    #[arg(long, env = "CODES_API_BASE", default_value = DEFAULT_CODES_API_BASE)]
    pub codes_api_base: String,

    /// Statistics endpoint that receives discovered codes. Discovery reporting is off by default
    /// and only runs when this is set.
    #[arg(long, env = "STATS_URL")]
    pub stats_url: Option<String>,

    /// Base URL for per-game webhook avatars (`<base>/<game>.png`)
    #[arg(long, env = "AVATAR_BASE_URL")]
    pub avatar_base_url: Option<String>,
}

pub fn parse_cli_args() -> Cli {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("[x] failed to read .env: {}", e);
    }

    Cli::parse()
}
