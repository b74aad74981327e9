mod api;
mod config;
mod openapi;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use axum::Router;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use ocr_agents_core::{AcademicModule, DocumentCategory};
use ocr_agents_logging::init_logger;
use ocr_agents_providers::{GeminiProvider, MistralClient, ProviderRegistry};

use api::AppState;
use config::Config;

#[derive(Parser)]
#[command(name = "ocr-agents")]
#[command(about = "Document OCR, verification, and teaching agents over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check whether a server is answering on the configured port
    Status,
    /// List accepted document categories and academic modules
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    init_logger(config.log_dir.as_deref(), &config.log_level, config.json_logs);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status => {
            println!("ocr-agents status: checking...");
            let client = reqwest::Client::new();
            match client
                .get(format!(
                    "http://localhost:{}/api/v1/agents/health-check",
                    config.port
                ))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("ocr-agents is not running on port {}", config.port);
                }
            }
        }
        Commands::Categories => {
            println!("Document categories:");
            for category in DocumentCategory::ALL {
                println!("  {category}");
            }
            println!("Academic modules:");
            for module in AcademicModule::ALL {
                println!("  {module}");
            }
        }
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    config.validate()?;
    info!(
        port = config.port,
        bind = %config.bind_address,
        gemini_model = %config.gemini_model,
        "Starting ocr-agents"
    );

    let mut registry = ProviderRegistry::new();

    let mistral = Arc::new(
        MistralClient::new(config.mistral_api_key.clone().unwrap_or_default())
            .with_base_url(&config.mistral_base_url),
    );
    registry.register("mistral", mistral.clone());
    info!(url = %config.mistral_base_url, "Registered Mistral provider");

    let gemini = GeminiProvider::new(config.google_api_key.clone().unwrap_or_default())
        .with_base_url(&config.gemini_base_url);
    registry.register("gemini", Arc::new(gemini));
    info!(url = %config.gemini_base_url, "Registered Gemini provider");

    let state = Arc::new(AppState::new(mistral, &registry, &config.gemini_model)?);
    let app = http_app(state, config.max_upload_bytes());
    let addr = format!("{}:{}", config.bind_address, config.port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, docs = %format!("http://localhost:{}/docs", config.port), "HTTP API listening");

    // Spawned after bind so the tunnel has something to forward to.
    if config.enable_ngrok {
        spawn_tunnel(tunnel_command(&config.ngrok_bin, config.port));
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Router with the tracing and CORS layers the server runs with.
fn http_app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    api::build_router(state, max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// `ngrok http http://localhost:<port>`
fn tunnel_command(bin: &str, port: u16) -> Command {
    let mut command = Command::new(bin);
    command
        .arg("http")
        .arg(format!("http://localhost:{port}"))
        .kill_on_drop(true);
    command
}

/// Run the tunnel command in the background. Failures are logged, never fatal.
fn spawn_tunnel(mut command: Command) -> JoinHandle<()> {
    tokio::spawn(async move {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        info!(bin = %program, "Starting ngrok tunnel");
        match command.status().await {
            Ok(status) if status.success() => info!("ngrok tunnel exited"),
            Ok(status) => warn!(%status, "ngrok tunnel exited with an error"),
            Err(e) => warn!(error = %e, bin = %program, "Failed to start ngrok"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_agents_providers::{MockDocumentBackend, MockProvider};

    fn mock_state() -> Arc<AppState> {
        let mut registry = ProviderRegistry::new();
        registry.register("mistral", Arc::new(MockProvider::new("mistral")));
        registry.register("gemini", Arc::new(MockProvider::new("gemini")));
        Arc::new(
            AppState::new(Arc::new(MockDocumentBackend::new()), &registry, "gemini-1.5-flash")
                .unwrap(),
        )
    }

    #[test]
    fn test_tunnel_command_targets_local_port() {
        let command = tunnel_command("ngrok", 8123);
        let std = command.as_std();
        assert_eq!(std.get_program(), "ngrok");
        let args: Vec<String> = std
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["http", "http://localhost:8123"]);
    }

    #[tokio::test]
    async fn test_server_answers_when_tunnel_binary_is_missing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            axum::serve(listener, http_app(mock_state(), 1024 * 1024)).await
        });

        let tunnel = spawn_tunnel(tunnel_command("ocr-agents-no-such-ngrok-binary", port));
        // The spawn error is logged inside the task; the task itself completes cleanly.
        tunnel.await.unwrap();

        let response = reqwest::get(format!("http://127.0.0.1:{port}/api/v1/agents/health-check"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "active");

        server.abort();
    }
}
