use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::dispatcher::{Dispatcher, ReplySource};
use crate::model::Message;

const INDEX_TEMPLATE: &str = "index.html";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    templates: Arc<Environment<'static>>,
    title: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, title: &str) -> Result<Self> {
        Ok(Self {
            dispatcher,
            templates: Arc::new(create_template_env()?),
            title: Arc::from(title),
        })
    }
}

fn create_template_env() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template(INDEX_TEMPLATE, include_str!("templates/index.html"))
        .context("Failed to load index template")?;
    Ok(env)
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
struct ChatOutput {
    reply: String,
    source: ReplySource,
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    error: String,
}

#[derive(Default)]
struct PageView<'a> {
    message: &'a str,
    username: &'a str,
    reply: Option<&'a str>,
    error: Option<&'a str>,
}

fn render_page(state: &AppState, status: StatusCode, view: PageView<'_>) -> Response {
    let rendered = state.templates.get_template(INDEX_TEMPLATE).and_then(|tmpl| {
        tmpl.render(context! {
            title => &*state.title,
            message => view.message,
            username => view.username,
            reply => view.reply,
            error => view.error,
        })
    });

    match rendered {
        Ok(body) => (status, Html(body)).into_response(),
        Err(err) => {
            error!(error = %err, "failed to render index template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Runs one turn, mapping failures to a status code and display text.
async fn run_turn(
    state: &AppState,
    input: &ChatInput,
) -> std::result::Result<(String, ReplySource), (StatusCode, String)> {
    if input.message.trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Message must not be empty".to_string(),
        ));
    }

    match state
        .dispatcher
        .dispatch(&input.message, &input.username)
        .await
    {
        Ok(reply) => Ok((reply.text, reply.source)),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "dispatch failed");
            Err((StatusCode::BAD_GATEWAY, format!("{err:#}")))
        }
    }
}

async fn index_handler(State(state): State<AppState>) -> Response {
    render_page(&state, StatusCode::OK, PageView::default())
}

async fn submit_handler(State(state): State<AppState>, Form(input): Form<ChatInput>) -> Response {
    let view = PageView {
        message: &input.message,
        username: &input.username,
        ..PageView::default()
    };

    match run_turn(&state, &input).await {
        Ok((reply, _)) => render_page(
            &state,
            StatusCode::OK,
            PageView {
                reply: Some(reply.as_str()),
                ..view
            },
        ),
        Err((status, message)) => render_page(
            &state,
            status,
            PageView {
                error: Some(message.as_str()),
                ..view
            },
        ),
    }
}

async fn api_chat_handler(State(state): State<AppState>, Json(input): Json<ChatInput>) -> Response {
    match run_turn(&state, &input).await {
        Ok((reply, source)) => Json(ChatOutput { reply, source }).into_response(),
        Err((status, error)) => (status, Json(ErrorOutput { error })).into_response(),
    }
}

async fn history_handler(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.dispatcher.history().await)
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_handler))
        .route("/api/chat", post(api_chat_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(bind_addr: &str, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_addr))?;
    let local_addr = listener
        .local_addr()
        .context("Failed to read bound address")?;
    info!(addr = %local_addr, "web form listening on http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(tokio::signal::ctrl_c()))
        .await
        .context("Web server failed")
}

/// Resolves once `signal` fires. A signal listener that fails to install
/// never resolves, so the server keeps running.
async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}
