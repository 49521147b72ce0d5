//! Kamëntsá 游戏化 API 服务
//!
//! 积分、连续学习、成就徽章、排行榜、师徒辅导、协作奖励和多媒体上传的 REST API。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, header},
    middleware::{self, Next},
    response::Response,
};
use kamentsa_gamification::{middleware::auth_middleware, routes, state::AppState};
use kamentsa_shared::{
    cache::Cache,
    config::AppConfig,
    database::Database,
    observability::{self, middleware as obs_middleware},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

/// multipart 边界和其他字段的额外余量
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("kamentsa-api")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting kamentsa-api on {}", config.server_addr());

    if config.is_production() && config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
        anyhow::bail!("生产环境必须通过 KAMENTSA_AUTH__JWT_SECRET 设置 JWT 密钥");
    }

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
        info!("Database migrations applied");
    }

    // Redis 只用于排行榜缓存，不可用时直接查库
    let cache = match Cache::new(&config.redis) {
        Ok(cache) => match cache.health_check().await {
            Ok(()) => Some(Arc::new(cache)),
            Err(e) => {
                warn!("Redis unavailable, leaderboard cache disabled: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Invalid redis config, leaderboard cache disabled: {}", e);
            None
        }
    };

    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;

    let cors = cors_layer(&config.server.cors_origins);
    let body_limit = config.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let request_timeout = Duration::from_secs(config.server.request_timeout_seconds);
    let upload_dir = config.storage.upload_dir.clone();
    let addr = config.server_addr();

    let state = AppState::build(db.pool().clone(), cache, config);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .merge(routes::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// CORS：逗号分隔的来源列表，`*` 表示全部放行
///
/// 带 Cookie 的跨域请求要求显式列出来源
fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        info!("CORS allowed_origins: * (all origins)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", origins);
    let origins: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// 为所有响应注入 HTTP 安全头
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("0"),
    );
    response
}

/// 监听 Ctrl+C 和 SIGTERM，收到任一信号后触发优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("注册 Ctrl+C 处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("注册 SIGTERM 处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
