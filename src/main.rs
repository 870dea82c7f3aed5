use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

mod app;
mod game;
mod protocol;
mod shared;
mod transport;

use game::arena::{Arena, Handshake};
use transport::ws_session::handle_socket;

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    session: Option<String>,
    username: Option<String>,
    color: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let arena = Arc::new(Arena::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);
    let app: Router = Router::new()
        .route("/api/health", get(health))
        .route("/api/arena", get(ws_handler))
        .layer(cors)
        .with_state(arena);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8787);
    let address = format!("0.0.0.0:{port}");
    tracing::info!("listening on {address}");

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(OkResponse { ok: true })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(arena): State<Arc<Arena>>,
) -> impl IntoResponse {
    let handshake = if let Some(session_id) = query.session.filter(|value| !value.is_empty()) {
        if !arena.session_exists(&session_id).await {
            tracing::warn!("rejected reconnect with unknown session");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    ok: false,
                    error: "Unknown session".to_string(),
                }),
            )
                .into_response();
        }
        Handshake::Resume { session_id }
    } else if let Some(username) = query.username {
        Handshake::Fresh {
            username,
            color: query.color.as_deref().and_then(protocol::parse_color),
        }
    } else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                ok: false,
                error: "Missing credentials".to_string(),
            }),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, arena, handshake))
        .into_response()
}
