//! Quick Learn · Adaptive Assessment + Quick Revision Backend
//!
//! - Axum HTTP + WebSocket API
//! - Adaptive multiple-choice quiz over an uploaded PDF, with a PDF report
//! - Quick revision: chunked document search, revision guides, printable guide
//! - Optional OpenAI-compatible model (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   OPENAI_API_KEY         : enables the model client if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL      : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL    : default "gpt-4o"
//!   OPENAI_TIMEOUT_SECS    : default 60
//!   QUICKLEARN_CONFIG_PATH : path to TOML config (prompts + quiz/revision tuning)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod adaptive;
mod chunks;
mod config;
mod domain;
mod error;
mod extract;
mod llm;
mod pdf;
mod protocol;
mod quiz;
mod recovery;
mod report;
mod revision;
mod routes;
mod session;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, model client, quiz sessions, chunk store.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quicklearn_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "quicklearn_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quicklearn_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "quicklearn_backend", "Shutdown signal received");
}
