//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("points_granted_total", "Total number of points granted");
    metrics::describe_counter!(
        "achievements_unlocked_total",
        "Total number of achievements unlocked"
    );
    metrics::describe_counter!("badges_awarded_total", "Total number of badges awarded");
    metrics::describe_counter!(
        "collaboration_rewards_claimed_total",
        "Total number of collaboration rewards claimed"
    );
    metrics::describe_counter!("streak_activities_total", "Total number of streak activities");
    metrics::describe_counter!("multimedia_uploads_total", "Total number of uploaded files");
    metrics::describe_histogram!(
        "leaderboard_build_duration_seconds",
        "Leaderboard computation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录积分发放
#[inline]
pub fn record_points_granted(kind: &str, points: i64) {
    metrics::counter!("points_granted_total", "kind" => kind.to_string()).increment(points.max(0) as u64);
}

/// 记录成就解锁
#[inline]
pub fn record_achievement_unlocked(category: &str) {
    metrics::counter!("achievements_unlocked_total", "category" => category.to_string()).increment(1);
}

/// 记录徽章授予
#[inline]
pub fn record_badge_awarded(tier: &str) {
    metrics::counter!("badges_awarded_total", "tier" => tier.to_string()).increment(1);
}

/// 记录协作奖励领取
#[inline]
pub fn record_reward_claimed(collaboration_type: &str, quality: &str) {
    metrics::counter!(
        "collaboration_rewards_claimed_total",
        "type" => collaboration_type.to_string(),
        "quality" => quality.to_string()
    )
    .increment(1);
}

/// 记录连续活跃打卡
#[inline]
pub fn record_streak_activity(outcome: &str) {
    metrics::counter!("streak_activities_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录文件上传
#[inline]
pub fn record_upload(media_type: &str, size_bytes: u64) {
    metrics::counter!("multimedia_uploads_total", "media_type" => media_type.to_string()).increment(1);
    metrics::histogram!("multimedia_upload_bytes", "media_type" => media_type.to_string())
        .record(size_bytes as f64);
}

/// 记录排行榜计算耗时
#[inline]
pub fn record_leaderboard_build(entries: usize, duration_secs: f64) {
    metrics::histogram!("leaderboard_build_duration_seconds").record(duration_secs);
    metrics::gauge!("leaderboard_entries").set(entries as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 未安装 recorder 时记录指标应为空操作，不能 panic
    #[test]
    fn test_record_without_recorder_is_noop() {
        record_http_request("GET", "/api/leaderboard", 200, 0.01);
        record_points_granted("grant", 50);
        record_points_granted("grant", -5);
        record_achievement_unlocked("vocabulary");
        record_badge_awarded("gold");
        record_reward_claimed("translation", "good");
        record_streak_activity("continued");
        record_upload("audio", 1024);
        record_leaderboard_build(10, 0.002);
    }
}
