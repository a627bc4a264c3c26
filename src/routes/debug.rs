use axum::{extract::Extension, routing::get, Json, Router};

use crate::hub::{DebugState, SharedHub};

pub fn router() -> Router {
    Router::new().route("/debug", get(debug_state))
}

/// 唯讀快照,不動任何狀態
async fn debug_state(Extension(hub): Extension<SharedHub>) -> Json<DebugState> {
    Json(hub.debug_snapshot().await)
}
