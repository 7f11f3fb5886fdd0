//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 未安装 recorder 时所有记录调用都是空操作。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

use super::ObservabilityConfig;

pub const AWARDS_TOTAL: &str = "progression_awards_total";
pub const AWARD_DURATION_SECONDS: &str = "progression_award_duration_seconds";
pub const LEVEL_UPS_TOTAL: &str = "progression_level_ups_total";
pub const BADGES_AWARDED_TOTAL: &str = "progression_badges_awarded_total";
pub const BADGE_CHECK_FAILURES_TOTAL: &str = "progression_badge_check_failures_total";
pub const LOGINS_TOTAL: &str = "progression_logins_total";

/// 初始化 Prometheus 指标导出
///
/// 在指定端口启动 exporter 自带的 HTTP 监听，暴露 `/metrics`。
/// 需要在 tokio 运行时内调用。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_metrics();
    metrics::counter!("service_starts_total", "service" => config.service_name.clone())
        .increment(1);

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// 注册指标描述（出现在 /metrics 的 HELP 注释中）
pub fn describe_metrics() {
    metrics::describe_counter!(AWARDS_TOTAL, "Experience award attempts by action and outcome");
    metrics::describe_histogram!(AWARD_DURATION_SECONDS, "Experience award duration in seconds");
    metrics::describe_counter!(LEVEL_UPS_TOTAL, "Level changes caused by awards");
    metrics::describe_counter!(BADGES_AWARDED_TOTAL, "Badges unlocked by badge type");
    metrics::describe_counter!(
        BADGE_CHECK_FAILURES_TOTAL,
        "Badge checks that failed and were skipped"
    );
    metrics::describe_counter!(LOGINS_TOTAL, "Logins by streak transition");
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次经验发放尝试
#[inline]
pub fn record_award(action: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        AWARDS_TOTAL,
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(AWARD_DURATION_SECONDS, "action" => action.to_string())
        .record(duration_secs);
}

/// 记录等级变化
#[inline]
pub fn record_level_up(new_level: i32) {
    metrics::counter!(LEVEL_UPS_TOTAL, "level" => new_level.to_string()).increment(1);
}

/// 记录徽章解锁
#[inline]
pub fn record_badge_awarded(badge: &str) {
    metrics::counter!(BADGES_AWARDED_TOTAL, "badge" => badge.to_string()).increment(1);
}

/// 记录徽章检查失败
#[inline]
pub fn record_badge_check_failure(badge: &str) {
    metrics::counter!(BADGE_CHECK_FAILURES_TOTAL, "badge" => badge.to_string()).increment(1);
}

/// 记录登录及连续登录状态迁移
#[inline]
pub fn record_login(transition: &str) {
    metrics::counter!(LOGINS_TOTAL, "transition" => transition.to_string()).increment(1);
}
