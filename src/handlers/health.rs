use axum::{extract::State, Json};

use crate::handlers::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "salescast",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len().await,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::handlers::test_support::*;

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, json) = send_json(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 0);
    }
}
