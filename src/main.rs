use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod entities;
mod error;
mod handler;
mod openapi;
mod repo;
mod schema;
mod service;
mod state;

use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_api=debug,axum=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "account-api starting");

    let state = AppState::new().await;
    let port = state.config().port();

    let app = axum::Router::new()
        .merge(handler::health::routes())
        .merge(handler::auth::routes(state.clone()))
        .merge(handler::tokens::routes(state.clone()))
        .merge(handler::passwords::routes(state.clone()))
        .merge(handler::profile::routes(state.clone()))
        .merge(handler::social::routes(state.clone()))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()));

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|_| panic!("failed to bind to {}", bind_addr));

    tracing::info!(address = %bind_addr, "listening");
    axum::serve(listener, app).await.expect("server error");
}
