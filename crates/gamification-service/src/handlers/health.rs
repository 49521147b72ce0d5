//! 存活与就绪探针

use axum::{Json, extract::State, http::StatusCode};
use kamentsa_shared::database;
use serde_json::{Value, json};

use crate::dto::HealthResponse;
use crate::state::AppState;

/// 存活探针：进程正常即返回 ok
///
/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "kamentsa-api"
    }))
}

/// 就绪探针：检查数据库和 Redis
///
/// 数据库不可用时返回 503；Redis 只影响排行榜缓存，失败时标记为 degraded
///
/// GET /ready
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = database::ping(&state.pool).await.is_ok();

    let cache = match &state.cache {
        Some(cache) if cache.health_check().await.is_ok() => "ok",
        Some(_) => "fail",
        None => "disabled",
    };

    let status = match (db_ok, cache) {
        (false, _) => "unavailable",
        (true, "fail") => "degraded",
        _ => "ok",
    };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            database: if db_ok { "ok" } else { "fail" },
            cache,
        }),
    )
}
