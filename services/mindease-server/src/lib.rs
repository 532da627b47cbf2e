//! MindEase Server - HTTP backend for the MindEase support chatbot.
//!
//! This crate provides:
//! - Crisis keyword screening ahead of any AI call
//! - A bounded, process-wide conversation window
//! - A completion client with fixed-delay retries and canned fallbacks
//! - The `/health`, `/chat`, and `/reset` HTTP routes
//!
//! ## Request flow
//!
//! ```text
//! POST /chat → empty? → crisis? → append user turn → prompt → complete (retry) → append reply
//!                ↓          ↓
//!         "say something"  helplines
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod completion;
pub mod conversation;
pub mod crisis;
pub mod error;
pub mod provider;
pub mod routes;

pub use chat::{ChatReply, ChatService, ReplyKind};
pub use completion::{CompletionClient, CompletionSettings};
pub use conversation::{ConversationBuffer, Message, Role, SharedConversation};
pub use error::ChatError;
pub use provider::{ChatRequest, ChatResponse, OpenRouterProvider, Provider, ProviderError};
pub use routes::{build_router, AppState};

use axum::response::Response;
use axum::Router;
use mindease_common::config::Config;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Wrap a router with panic recovery, request tracing, and permissive CORS.
pub fn with_middleware(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}

/// Build the full application: routes plus middleware.
pub fn build_app(state: AppState) -> Router {
    with_middleware(build_router(state))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    error::internal_fallback_response()
}

/// Build application state from configuration.
pub fn build_state(config: &Config) -> AppState {
    let credential = config.ai_credential();
    if !credential.is_present() {
        tracing::error!("OPENROUTER_API_KEY not set; chat will reply with a configuration notice");
    }

    let completion = CompletionClient::from_config(&credential, &config.ai);
    let conversation = SharedConversation::new(config.conversation.max_history);
    AppState::new(ChatService::new(conversation, Arc::new(completion)))
}

/// Start the HTTP server and run until a shutdown signal arrives.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = build_state(config);
    let ai_configured = state.chat.is_ai_configured();
    let app = build_app(state);

    tracing::info!(%addr, ai_configured, "MindEase backend listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("MindEase backend stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                }
            }
            _ => {
                tracing::warn!("Signal handlers unavailable, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    }
}
