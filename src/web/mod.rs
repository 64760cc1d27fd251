use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::SessionStore;

mod api;
pub mod error;
pub mod extract;
pub mod forms;
mod pages;
pub mod render;

use render::Templates;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionStore>,
    pub templates: Arc<Templates>,
}

impl AppState {
    pub fn new(pool: SqlitePool, session_ttl: chrono::Duration) -> anyhow::Result<Self> {
        Ok(Self {
            pool,
            sessions: Arc::new(SessionStore::new(session_ttl)),
            templates: Arc::new(Templates::new().context("failed to compile templates")?),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/register", get(pages::register_form).post(pages::register))
        .route("/login", get(pages::login_form).post(pages::login))
        .route("/logout", post(pages::logout))
        .route("/dashboard", get(pages::dashboard))
        .route("/subjects", get(pages::subjects_page))
        .route("/subjects/add", post(pages::subjects_add))
        .route("/subjects/delete", post(pages::subjects_delete))
        .route("/timetable", get(pages::timetable_page))
        .route("/timetable/add", post(pages::timetable_add))
        .route("/timetable/delete", post(pages::timetable_delete))
        .route("/attendance", get(pages::attendance_page))
        .route("/attendance/mark", post(pages::attendance_mark))
        .route("/attendance/delete", post(pages::attendance_delete))
        .route("/tasks", get(pages::tasks_page))
        .route("/tasks/add", post(pages::tasks_add))
        .route("/tasks/toggle", post(pages::tasks_toggle))
        .route("/tasks/delete", post(pages::tasks_delete))
        .route("/resources", get(pages::resources_page))
        .route("/resources/add", post(pages::resources_add))
        .route("/resources/delete", post(pages::resources_delete))
        .route("/coding", get(pages::coding_page))
        .route("/coding/add", post(pages::coding_add))
        .route("/coding/delete", post(pages::coding_delete))
        .nest("/api", api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
