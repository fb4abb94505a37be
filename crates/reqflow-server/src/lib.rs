pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::path::Path;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the API router over an already-opened tracker.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Tickets
        .route(
            "/api/requests",
            get(routes::requests::list_requests).post(routes::requests::create_request),
        )
        // Statistics and alerts
        .route("/api/requests/eta-alerts", get(routes::stats::eta_alerts))
        .route("/api/requests/stats", get(routes::stats::dashboard_statistics))
        .route(
            "/api/requests/user-statistics",
            get(routes::stats::user_statistics_all),
        )
        .route(
            "/api/requests/account-statistics",
            get(routes::stats::account_statistics),
        )
        .route(
            "/api/requests/user-statistics-by-account/{account_id}",
            get(routes::stats::user_statistics),
        )
        .route(
            "/api/requests/user-statistics-by-account/{account_id}/tickets",
            get(routes::stats::statistic_tickets),
        )
        .route(
            "/api/requests/{id}",
            get(routes::requests::get_request)
                .put(routes::requests::edit_request)
                .delete(routes::requests::delete_request),
        )
        .route(
            "/api/requests/{id}/assign",
            post(routes::requests::assign_request),
        )
        .route(
            "/api/requests/{id}/status",
            put(routes::requests::update_status),
        )
        .route("/api/requests/{id}/eta", put(routes::requests::update_eta))
        .route(
            "/api/requests/{id}/eta-history",
            get(routes::requests::eta_history),
        )
        .route("/api/requests/{id}/timers", get(routes::requests::timers))
        // Comments
        .route(
            "/api/requests/{id}/comments",
            get(routes::comments::list_comments).post(routes::comments::add_comment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Open the project at `root` and serve the API on `port`.
pub async fn serve(root: &Path, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Serve on a pre-bound listener, so a caller that binds port 0 can read the
/// actual port first.
pub async fn serve_on(root: &Path, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app_state = AppState::open(root)?;
    let port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("reqflow API listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
