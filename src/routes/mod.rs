use axum::Router;

pub mod debug;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .nest("/api", debug::router())
        .nest("/ws",  ws::router())
}
