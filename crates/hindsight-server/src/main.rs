use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hindsight_core::engine::OllamaEngine;
use hindsight_core::github::GithubDiffSource;
use hindsight_core::json_store::JsonFileStore;
use hindsight_core::memory::ReviewMemory;
use hindsight_core::review::ReviewService;
use hindsight_server::state::AppState;

#[derive(Parser)]
#[command(name = "hindsight", about = "Code review suggestions that learn from your feedback")]
struct Args {
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    port: u16,

    /// Feedback corpus location.
    #[arg(long, env = "HINDSIGHT_STATE", default_value = "hindsight-state.json")]
    state_file: String,

    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.1:8b")]
    model: String,

    /// Suggestions below this confidence are dropped.
    #[arg(long, env = "MIN_CONFIDENCE_TO_SHOW", default_value_t = 30)]
    min_confidence: u8,

    /// Required only for reviewing GitHub pull requests.
    #[arg(long, env = "GITHUB_TOKEN")]
    github_token: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hindsight=info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let store = match JsonFileStore::new(&args.state_file).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open feedback store {}: {e}", args.state_file);
            std::process::exit(1);
        }
    };
    let memory = ReviewMemory::new(Arc::new(store));
    let engine = Arc::new(OllamaEngine::new(&args.ollama_url, &args.model));
    let reviews = ReviewService::new(engine, memory.clone(), args.min_confidence);
    let diff_source = Arc::new(GithubDiffSource::new(args.github_token));

    let state = AppState {
        reviews,
        memory,
        diff_source,
    };
    let app = hindsight_server::app(state);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, model = %args.model, "listening");
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
