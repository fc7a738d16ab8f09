//! 徽章巡检任务
//!
//! 管理端定期触发的全量评估入口：分页遍历用户，为每个用户补发新满足条件的徽章。

use anyhow::Result;
use deals_shared::{config::AppConfig, database::Database, observability};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use badge_eligibility::{
    ActivityRepository, AwardRepository, BadgeEligibilityService, BadgeRepository,
    BadgeSweepService,
};

const SERVICE_NAME: &str = "badge-sweep";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时使用默认值
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            environment: "development".to_string(),
            ..AppConfig::default()
        }
    });

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        batch_size = config.sweep.batch_size,
        concurrency = config.sweep.concurrency,
        "Starting badge sweep..."
    );

    // 3. 初始化数据库连接并执行迁移
    let db = Database::connect_and_migrate(&config.database).await?;
    let pool = db.pool().clone();
    info!("Database connection established");

    // 4. 创建仓储与服务
    let catalog_repo = Arc::new(BadgeRepository::new(pool.clone()));
    let award_repo = Arc::new(AwardRepository::new(pool.clone()));
    let activity_repo = Arc::new(ActivityRepository::new(pool.clone()));

    let engine = Arc::new(BadgeEligibilityService::new(
        catalog_repo,
        award_repo,
        activity_repo.clone(),
    ));
    let sweep = BadgeSweepService::new(engine, activity_repo, config.sweep.clone());

    // 5. 执行巡检，收到关闭信号时中止
    tokio::select! {
        outcome = sweep.run() => {
            let report = outcome?;
            info!(
                users_scanned = report.users_scanned,
                users_failed = report.users_failed,
                badges_granted = report.badges_granted,
                "Badge sweep finished"
            );
        }
        _ = shutdown_signal() => {
            warn!("Badge sweep interrupted before completion");
        }
    }

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// 关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping sweep...");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping sweep...");
        }
    }
}
