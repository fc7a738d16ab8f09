//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;
use crate::error::{Result, SharedError};

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SharedError::Observability(e.to_string()))?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册徽章评估相关指标描述
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("badge_awards_total", "Total number of badge award attempts");
    metrics::describe_counter!(
        "badge_evaluations_total",
        "Total number of badge eligibility evaluations"
    );
    metrics::describe_histogram!(
        "badge_evaluation_duration_seconds",
        "Badge eligibility evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "badge_revocations_total",
        "Total number of badge revocations"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SharedError::Observability(format!("bind {}: {}", addr, e)))?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录徽章发放结果
///
/// `source` 取值 automatic / manual，`status` 取值 granted / already_held / failed
#[inline]
pub fn record_badge_award(source: &str, status: &str) {
    metrics::counter!(
        "badge_awards_total",
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录一次资格评估
#[inline]
pub fn record_badge_evaluation(status: &str, duration_secs: f64) {
    metrics::counter!("badge_evaluations_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("badge_evaluation_duration_seconds", "status" => status.to_string())
        .record(duration_secs);
}

/// 记录徽章撤销
#[inline]
pub fn record_badge_revocation(deleted: bool) {
    metrics::counter!(
        "badge_revocations_total",
        "deleted" => deleted.to_string()
    )
    .increment(1);
}
