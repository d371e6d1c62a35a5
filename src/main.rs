use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use nl_query::config::{AppConfig, CliArgs, Command};
use nl_query::db::backend_for;
use nl_query::llm::LlmManager;
use nl_query::pipeline::Pipeline;
use nl_query::util::logging::init_tracing;
use nl_query::web::state::AppState;
use nl_query::{cli, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = AppConfig::new(&args)?;

    // Initialize logging
    init_tracing(config.logging.json);

    info!("Using {} database backend", config.database.backend);
    let backend = backend_for(config.database.backend, config.query.read_only);

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm, config.database.backend)?;

    let pipeline = Pipeline::new(backend, llm_manager, config.query.read_only);
    if !config.query.read_only {
        info!("Read-only query guard disabled; generated SQL runs unchecked");
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let web_config = config.web.clone();
            let app_state = Arc::new(AppState::new(config, pipeline));

            // Start the web server
            info!("Starting nl-query server on {}:{}", web_config.host, web_config.port);
            if let Err(e) = web::run_server(web_config, app_state).await {
                error!("Server error: {}", e);
                return Err(e.into());
            }
            info!("Server stopped gracefully");
        }
        Command::Ask { question, target } => {
            let connection = cli::connection_from_args(&config, &target);
            cli::ask(&pipeline, &connection, &question).await?;
        }
        Command::Chat { target } => {
            let connection = cli::connection_from_args(&config, &target);
            cli::chat(&pipeline, &connection).await?;
        }
    }

    Ok(())
}
