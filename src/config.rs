//! CLI arguments and server configuration defaults.

use clap::Parser;

use crate::naming::NameScheme;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_TEMP_TTL_SECS: u64 = 60 * 60;
pub const TEMP_CLEAN_INTERVAL_SECS: u64 = 900;
/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "meme-depot", version, about = "Meme image upload server")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "MEME_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        short = 'd',
        long,
        env = "MEME_UPLOAD_DIR",
        default_value = DEFAULT_UPLOAD_DIR,
        help = "Directory uploaded files are stored in"
    )]
    pub upload_dir: String,
    #[arg(
        long,
        env = "MEME_PUBLIC_URL",
        help = "Public base URL used in returned file URLs (defaults to the request host)"
    )]
    pub public_url: Option<String>,
    #[arg(
        long,
        env = "MEME_MAX_UPLOAD_SIZE",
        default_value_t = DEFAULT_MAX_UPLOAD_SIZE,
        help = "Max upload size in bytes (0 to disable)"
    )]
    pub max_upload_size: u64,
    #[arg(
        long,
        env = "MEME_NAME_SCHEME",
        value_enum,
        default_value_t = NameScheme::Unique,
        help = "Stored filename scheme"
    )]
    pub name_scheme: NameScheme,
    #[arg(
        long,
        env = "MEME_CORS_ORIGINS",
        help = "Comma separated CORS origins (any origin when unset)"
    )]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "MEME_TEMP_TTL_SECS",
        default_value_t = DEFAULT_TEMP_TTL_SECS,
        help = "Age after which leftover temp files are removed (0 to disable)"
    )]
    pub temp_ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["meme-depot"]).expect("parse defaults");
        assert_eq!(args.upload_dir, DEFAULT_UPLOAD_DIR);
        assert_eq!(args.max_upload_size, DEFAULT_MAX_UPLOAD_SIZE);
        assert_eq!(args.name_scheme, NameScheme::Unique);
        assert!(args.public_url.is_none());
    }

    #[test]
    fn name_scheme_parses_from_flag() {
        let args = Args::try_parse_from(["meme-depot", "--name-scheme", "timestamp", "-p", "8080"])
            .expect("parse flags");
        assert_eq!(args.name_scheme, NameScheme::Timestamp);
        assert_eq!(args.port, 8080);
    }
}
