//! Voxline server binary — the entry point for the answering service.
//!
//! Starts an axum HTTP server with structured logging, media directory
//! initialization, and graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use voxline_pipeline::{
    AllowAllGate, AnalyticsSink, ContextStore, HttpAudioFetcher, MediaStore, NullSink, Pipeline,
    UsageGate,
};
use voxline_server::collaborators::{HttpAnalyticsSink, HttpUsageGate};
use voxline_server::{app, config, AppState};
use voxline_voice::{OpenAiChat, OpenAiTts, WhisperStt};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("VOXLINE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Media directories must exist and be writable before any webhook lands.
    let store = MediaStore::new(&config.storage.recordings_dir, &config.storage.replies_dir);
    store
        .init()
        .expect("failed to initialize media directories — check storage.* in config");

    // One HTTP client shared by every backend and collaborator.
    let client = reqwest::Client::new();

    let gate: Arc<dyn UsageGate> = match &config.usage.url {
        Some(url) => Arc::new(HttpUsageGate::new(client.clone(), url.clone())),
        None => {
            tracing::warn!("no usage gate configured, all calls will be allowed");
            Arc::new(AllowAllGate)
        }
    };
    let sink: Arc<dyn AnalyticsSink> = match &config.analytics.url {
        Some(url) => Arc::new(HttpAnalyticsSink::new(client.clone(), url.clone())),
        None => Arc::new(NullSink),
    };

    let pipeline = Pipeline {
        stt: Arc::new(WhisperStt::new(config.stt.clone(), client.clone())),
        chat: Arc::new(OpenAiChat::new(config.chat.clone(), client.clone())),
        tts: Arc::new(OpenAiTts::new(config.tts.clone(), client.clone())),
        gate,
        sink,
        fetcher: Arc::new(HttpAudioFetcher::new(
            client,
            config.pipeline.max_download_bytes,
        )),
        store,
        contexts: ContextStore::new(config.pipeline.max_history_turns),
        timeouts: config.pipeline.timeouts(),
        retry: config.pipeline.retry(),
        system_prompt: config.chat.system_prompt.clone(),
        voice: config.tts.voice.clone(),
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting voxline server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("voxline server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
