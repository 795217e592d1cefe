//! Server configuration and CLI argument parsing
//!
//! This module handles all server configuration through a flexible system that supports:
//! - Command-line arguments
//! - Environment variables (with SHASTRARTHI_ prefix, plus the provider
//!   credentials under their conventional names)
//! - An optional prompt overrides file, loaded by [`crate::provider::prompts`]
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! shastrarthi --http-port 9090 --ai-rate-max-requests 10
//!
//! # Using environment variables
//! export SHASTRARTHI_HTTP_PORT=8080
//! export SHASTRARTHI_STORE=probabilistic
//! export GEMINI_API_KEY=...
//! shastrarthi
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the server
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Rate limiter store configuration
    pub store: StoreConfig,
    /// Channel buffer size for actor communication
    pub buffer_size: usize,
    /// Synthesis endpoint policy
    pub synthesis: SynthesisConfig,
    /// Text-completion provider settings
    pub provider: ProviderConfig,
    /// Identity provider settings
    pub identity: IdentityConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Rate limiter store configuration
///
/// - **Periodic**: Sweeps stale windows at fixed intervals
/// - **Probabilistic**: Sweeps on a random fraction of writes
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Type of store to use
    pub store_type: StoreType,
    /// Initial capacity of the store
    pub capacity: usize,
    /// Cleanup interval for periodic store (seconds)
    pub cleanup_interval: u64,
    /// Cleanup probability for probabilistic store (1 in N)
    pub cleanup_probability: u64,
}

/// Available store types for the rate limiter
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Fixed interval cleanup
    Periodic,
    /// Random cleanup based on probability
    Probabilistic,
}

impl std::str::FromStr for StoreType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "periodic" => Ok(StoreType::Periodic),
            "probabilistic" => Ok(StoreType::Probabilistic),
            _ => Err(anyhow!(
                "Invalid store type: {}. Valid options are: periodic, probabilistic",
                s
            )),
        }
    }
}

/// Policy for `POST /api/synthesize`
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// Rate limit window (milliseconds)
    pub rate_window_ms: u64,
    /// Requests allowed per caller per window
    pub rate_max_requests: u64,
    /// Pause between streamed chunks (milliseconds)
    pub chunk_delay_ms: u64,
}

/// Text-completion provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Gemini API key; the provider reports itself unconfigured without one
    pub api_key: Option<String>,
    /// API base URL, up to and including the version segment
    pub base_url: String,
    /// Model name used in `models/{model}:generateContent`
    pub model: String,
    /// Upper bound on a single provider call (seconds)
    pub timeout_secs: u64,
    /// Characters per streamed chunk
    pub chunk_chars: usize,
    /// Optional file with prompt overrides
    pub prompts_file: Option<PathBuf>,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Supabase project URL; every request is unauthorized without one
    pub supabase_url: Option<String>,
    /// Supabase anon key sent as the `apikey` header
    pub supabase_anon_key: Option<String>,
    /// Upper bound on a single identity lookup (seconds)
    pub timeout_secs: u64,
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// SHASTRARTHI_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "shastrarthi",
    about = "Rate-limited AI synthesis server",
    long_about = "Serves POST /api/synthesize: validates the query, applies a per-caller fixed-window rate limit, calls the text-completion provider and streams the answer as server-sent events.\n\nEnvironment variables with SHASTRARTHI_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "SHASTRARTHI_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "SHASTRARTHI_HTTP_PORT"
    )]
    pub http_port: u16,

    // Store Configuration
    #[arg(
        long,
        value_name = "TYPE",
        help = "Store type: periodic, probabilistic",
        default_value = "periodic",
        env = "SHASTRARTHI_STORE"
    )]
    pub store: StoreType,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial store capacity",
        default_value_t = 100_000,
        env = "SHASTRARTHI_STORE_CAPACITY"
    )]
    pub store_capacity: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Cleanup interval for periodic store (seconds)",
        default_value_t = 300,
        env = "SHASTRARTHI_STORE_CLEANUP_INTERVAL"
    )]
    pub store_cleanup_interval: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Cleanup probability for probabilistic store (1 in N)",
        default_value_t = 10_000,
        env = "SHASTRARTHI_STORE_CLEANUP_PROBABILITY"
    )]
    pub store_cleanup_probability: u64,

    // Synthesis policy
    #[arg(
        long,
        value_name = "MS",
        help = "AI rate limit window (milliseconds)",
        default_value_t = 60_000,
        env = "SHASTRARTHI_AI_RATE_WINDOW_MS"
    )]
    pub ai_rate_window_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "AI requests allowed per caller per window",
        default_value_t = 20,
        env = "SHASTRARTHI_AI_RATE_MAX_REQUESTS"
    )]
    pub ai_rate_max_requests: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Delay between streamed chunks (milliseconds)",
        default_value_t = 8,
        env = "SHASTRARTHI_STREAM_CHUNK_DELAY_MS"
    )]
    pub stream_chunk_delay_ms: u64,

    // Provider
    #[arg(
        long,
        value_name = "KEY",
        help = "Gemini API key",
        env = "GEMINI_API_KEY",
        hide_env_values = true
    )]
    pub gemini_api_key: Option<String>,
    #[arg(
        long,
        value_name = "URL",
        help = "Gemini API base URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta",
        env = "SHASTRARTHI_GEMINI_BASE_URL"
    )]
    pub gemini_base_url: String,
    #[arg(
        long,
        value_name = "MODEL",
        help = "Gemini model name",
        default_value = "gemini-2.0-flash-exp",
        env = "SHASTRARTHI_GEMINI_MODEL"
    )]
    pub gemini_model: String,
    #[arg(
        long,
        value_name = "SECS",
        help = "Timeout for one provider call (seconds)",
        default_value_t = 60,
        env = "SHASTRARTHI_GEMINI_TIMEOUT"
    )]
    pub gemini_timeout: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Characters per streamed chunk",
        default_value_t = 1,
        env = "SHASTRARTHI_CHUNK_CHARS"
    )]
    pub chunk_chars: usize,
    #[arg(
        long,
        value_name = "PATH",
        help = "Prompt overrides file (toml, yaml or json)",
        env = "SHASTRARTHI_PROMPTS_FILE"
    )]
    pub prompts_file: Option<PathBuf>,

    // Identity
    #[arg(
        long,
        value_name = "URL",
        help = "Supabase project URL",
        env = "SUPABASE_URL"
    )]
    pub supabase_url: Option<String>,
    #[arg(
        long,
        value_name = "KEY",
        help = "Supabase anon key",
        env = "SUPABASE_ANON_KEY",
        hide_env_values = true
    )]
    pub supabase_anon_key: Option<String>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Timeout for one identity lookup (seconds)",
        default_value_t = 10,
        env = "SHASTRARTHI_IDENTITY_TIMEOUT"
    )]
    pub identity_timeout: u64,

    // General options
    #[arg(
        long,
        value_name = "SIZE",
        help = "Channel buffer size",
        default_value_t = 100_000,
        env = "SHASTRARTHI_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "SHASTRARTHI_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if a configured value is out of range.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap resolves CLI > env > default on its own
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            store: StoreConfig {
                store_type: args.store,
                capacity: args.store_capacity,
                cleanup_interval: args.store_cleanup_interval,
                cleanup_probability: args.store_cleanup_probability,
            },
            buffer_size: args.buffer_size,
            synthesis: SynthesisConfig {
                rate_window_ms: args.ai_rate_window_ms,
                rate_max_requests: args.ai_rate_max_requests,
                chunk_delay_ms: args.stream_chunk_delay_ms,
            },
            provider: ProviderConfig {
                api_key: non_blank(args.gemini_api_key),
                base_url: args.gemini_base_url,
                model: args.gemini_model,
                timeout_secs: args.gemini_timeout,
                chunk_chars: args.chunk_chars,
                prompts_file: args.prompts_file,
            },
            identity: IdentityConfig {
                supabase_url: non_blank(args.supabase_url),
                supabase_anon_key: non_blank(args.supabase_anon_key),
                timeout_secs: args.identity_timeout,
            },
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any window, limit, size or timeout is zero.
    fn validate(&self) -> Result<()> {
        if self.http.port == 0 {
            return Err(anyhow!("HTTP port must be non-zero"));
        }
        if self.buffer_size == 0 {
            return Err(anyhow!("Channel buffer size must be at least 1"));
        }
        if self.synthesis.rate_window_ms == 0 {
            return Err(anyhow!("AI rate limit window must be at least 1ms"));
        }
        if self.synthesis.rate_max_requests == 0 {
            return Err(anyhow!("AI rate limit must allow at least 1 request"));
        }
        if self.provider.chunk_chars == 0 {
            return Err(anyhow!("Chunk size must be at least 1 character"));
        }
        if self.provider.timeout_secs == 0 || self.identity.timeout_secs == 0 {
            return Err(anyhow!("Upstream timeouts must be at least 1 second"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("Shastrarthi Environment Variables");
        println!("=================================");
        println!();
        println!("Server options use the SHASTRARTHI_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP:");
        println!("  SHASTRARTHI_HTTP_HOST=<host>          HTTP host [default: 127.0.0.1]");
        println!("  SHASTRARTHI_HTTP_PORT=<port>          HTTP port [default: 8080]");
        println!();

        println!("Store Configuration:");
        println!(
            "  SHASTRARTHI_STORE=<type>              Store type: periodic, probabilistic [default: periodic]"
        );
        println!("  SHASTRARTHI_STORE_CAPACITY=<size>     Initial store capacity [default: 100000]");
        println!(
            "  SHASTRARTHI_STORE_CLEANUP_INTERVAL=<secs>     Periodic sweep interval [default: 300]"
        );
        println!(
            "  SHASTRARTHI_STORE_CLEANUP_PROBABILITY=<n>     Probabilistic sweep, 1 in N [default: 10000]"
        );
        println!();

        println!("Synthesis:");
        println!(
            "  SHASTRARTHI_AI_RATE_WINDOW_MS=<ms>    Rate limit window [default: 60000]"
        );
        println!("  SHASTRARTHI_AI_RATE_MAX_REQUESTS=<n>  Requests per window [default: 20]");
        println!(
            "  SHASTRARTHI_STREAM_CHUNK_DELAY_MS=<ms> Delay between streamed chunks [default: 8]"
        );
        println!();

        println!("Provider:");
        println!("  GEMINI_API_KEY=<key>                  Gemini API key (unset = not configured)");
        println!(
            "  SHASTRARTHI_GEMINI_BASE_URL=<url>     API base URL [default: https://generativelanguage.googleapis.com/v1beta]"
        );
        println!(
            "  SHASTRARTHI_GEMINI_MODEL=<model>      Model name [default: gemini-2.0-flash-exp]"
        );
        println!("  SHASTRARTHI_GEMINI_TIMEOUT=<secs>     Provider call timeout [default: 60]");
        println!("  SHASTRARTHI_CHUNK_CHARS=<n>           Characters per chunk [default: 1]");
        println!("  SHASTRARTHI_PROMPTS_FILE=<path>       Prompt overrides file");
        println!();

        println!("Identity:");
        println!("  SUPABASE_URL=<url>                    Supabase project URL");
        println!("  SUPABASE_ANON_KEY=<key>               Supabase anon key");
        println!("  SHASTRARTHI_IDENTITY_TIMEOUT=<secs>   Identity lookup timeout [default: 10]");
        println!();

        println!("General Configuration:");
        println!("  SHASTRARTHI_BUFFER_SIZE=<size>        Channel buffer size [default: 100000]");
        println!(
            "  SHASTRARTHI_LOG_LEVEL=<level>         Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
