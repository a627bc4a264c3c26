mod error;
mod hub;
mod persist;
mod proto;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::services::ServeDir;

use crate::error::{bad, AppErr};
use crate::hub::Hub;
use crate::persist::Gateway;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let data_dir = std::env::var("CHAT_DATA_DIR").unwrap_or_else(|_| "data".into());
    let bind: std::net::SocketAddr = std::env::var("CHAT_BIND")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()
        .map_err(bad)?;

    let gateway = Arc::new(Gateway::new(data_dir));
    let (messages, known_users) = gateway.load_all().await;
    let queue = persist::spawn_writers(gateway); // 啟動落盤寫手
    let hub = Hub::shared(messages, known_users, queue);

    let app = Router::new()
        .merge(routes::router())
        .fallback_service(ServeDir::new("static"))
        .layer(Extension(hub));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "chat hub listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
