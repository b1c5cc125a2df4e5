//! Main Entrypoint for the Aerodesk API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the tool registry, the live model connector and the chat agent.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use aerodesk_api::{config::Config, router::create_router, state::AppState};
use aerodesk_core::{
    APP_NAME,
    agent::ToolCallingAgent,
    airline::register_airline_tools,
    llm_client::OpenAICompatibleClient,
    session::InMemorySessionStore,
    tools::ToolRegistry,
};
use anyhow::Context;
use async_openai::config::OpenAIConfig;
use gemini_realtime::{FunctionDeclaration, LiveConnectConfig, LiveConnector};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads every `*.md` file in a directory, keyed by file stem.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            prompts.insert(prompt_key, fs::read_to_string(&path)?);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let mut prompts = load_prompts(&config.prompts_path)?;
    let live_prompt = prompts
        .remove("live_system_prompt")
        .context("live_system_prompt.md not found in prompts directory")?;
    let chat_prompt = prompts
        .remove("chat_system_prompt")
        .context("chat_system_prompt.md not found in prompts directory")?;

    let mut registry = ToolRegistry::new();
    register_airline_tools(&mut registry);
    let tools = Arc::new(registry);
    info!(count = tools.len(), "Registered airline tools.");

    let mut live_config = LiveConnectConfig::new(config.live_model.clone());
    live_config.system_instruction = live_prompt;
    live_config.voice_name = config.voice_name.clone();
    live_config.rag_corpus = config.rag_corpus.clone();
    live_config.function_declarations = tools
        .specs()
        .map(|spec| FunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        })
        .collect();
    // Vertex AI tokens expire; both models ask the provider on every use.
    let tokens = config
        .token_provider()
        .context("Failed to set up Google Cloud credentials")?;
    let endpoint = config.live_endpoint(tokens.clone())?;
    let connector = Arc::new(LiveConnector::new(endpoint, live_config));

    let mut openai_config = OpenAIConfig::new().with_api_base(config.chat_api_base());
    if let Some(api_key) = config.chat_api_key() {
        openai_config = openai_config.with_api_key(api_key);
    }
    let mut llm_client = OpenAICompatibleClient::new(openai_config, config.chat_model_id());
    if let Some(tokens) = tokens {
        llm_client = llm_client.with_token_provider(tokens);
    }
    let llm_client = Arc::new(llm_client);
    let chat_agent = Arc::new(ToolCallingAgent::new(llm_client, chat_prompt, tools.clone()));

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        tools,
        connector,
        chat_agent,
        chat_sessions: Arc::new(InMemorySessionStore::new(APP_NAME)),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        vertex_ai = config.is_vertex_ai(),
        live_model = %config.live_model,
        chat_model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
