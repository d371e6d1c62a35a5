use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db::BackendKind;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: BackendKind, // "mysql" or "duckdb"
    /// Server-side secret used for connections rebuilt from cookies.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Reject anything but a single read-only query before execution.
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Ask a single question and print the result table
    Ask {
        /// Natural-language question
        question: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Interactive chat session on stdin
    Chat {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Connection parameters for the command-line modes.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Database host (ignored by the duckdb backend)
    #[arg(long = "db-host", default_value = "localhost")]
    pub host: String,

    /// Database port
    #[arg(long = "db-port")]
    pub port: Option<u16>,

    /// Database user
    #[arg(long = "db-user", default_value = "")]
    pub user: String,

    /// Database name, or file path for duckdb
    #[arg(long = "database")]
    pub database: String,

    /// Require TLS
    #[arg(long)]
    pub encrypt: bool,
}

const DEFAULT_LOCATIONS: [&str; 3] = [
    "config.toml",
    "config/config.toml",
    "/etc/nl-query/config.toml",
];

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("database.backend", "mysql")?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000)?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "llama3-8b-8192")?
            .set_default(
                "llm.api_url",
                "https://api.groq.com/openai/v1/chat/completions",
            )?
            .set_default("llm.temperature", 0.2)?
            .set_default("llm.max_tokens", 1024)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("query.read_only", true)?
            .set_default("logging.json", false)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else if let Some(location) = DEFAULT_LOCATIONS.iter().find(|l| Path::new(l).exists()) {
            config_builder =
                config_builder.add_source(File::new(location, config::FileFormat::Toml));
        }

        // NLQ__LLM__API_KEY, NLQ__DATABASE__PASSWORD, ...
        config_builder = config_builder.add_source(
            Environment::with_prefix("NLQ")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        }

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: BackendKind::MySql,
                password: None,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "llama3-8b-8192".to_string(),
                api_key: None,
                api_url: Some("https://api.groq.com/openai/v1/chat/completions".to_string()),
                temperature: 0.2,
                max_tokens: 1024,
                timeout_secs: 60,
            },
            query: QueryConfig { read_only: true },
            logging: LoggingConfig { json: false },
        }
    }
}
