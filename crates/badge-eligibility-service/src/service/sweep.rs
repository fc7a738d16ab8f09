//! 全量巡检服务
//!
//! 按用户 ID 分页遍历全部用户，以有限并发对每个用户执行资格评估。
//! 单个用户失败只记录日志，不中断巡检。

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use deals_shared::config::SweepConfig;

use crate::error::{BadgeError, Result};
use crate::repository::ActivityRepositoryTrait;
use crate::service::dto::SweepReport;
use crate::service::eligibility_service::AwardEvaluator;

/// 全量巡检服务
pub struct BadgeSweepService<E, AR>
where
    E: AwardEvaluator,
    AR: ActivityRepositoryTrait,
{
    evaluator: Arc<E>,
    activity_repo: Arc<AR>,
    config: SweepConfig,
}

impl<E, AR> BadgeSweepService<E, AR>
where
    E: AwardEvaluator,
    AR: ActivityRepositoryTrait,
{
    pub fn new(evaluator: Arc<E>, activity_repo: Arc<AR>, config: SweepConfig) -> Self {
        Self {
            evaluator,
            activity_repo,
            config,
        }
    }

    /// 执行一次全量巡检
    ///
    /// 只有分页读取用户失败才会返回错误
    #[instrument(skip(self), fields(batch_size = self.config.batch_size, concurrency = self.config.concurrency))]
    pub async fn run(&self) -> Result<SweepReport> {
        if self.config.batch_size <= 0 {
            return Err(BadgeError::Validation(format!(
                "batch_size 必须为正数: {}",
                self.config.batch_size
            )));
        }

        let concurrency = self.config.concurrency.max(1);
        let mut report = SweepReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let user_ids = self
                .activity_repo
                .list_user_ids(cursor.clone(), self.config.batch_size)
                .await?;

            let Some(last) = user_ids.last().cloned() else {
                break;
            };
            let page_len = user_ids.len() as i64;

            let outcomes: Vec<_> = stream::iter(user_ids)
                .map(|user_id| {
                    let evaluator = Arc::clone(&self.evaluator);
                    async move {
                        let outcome = evaluator.evaluate_and_award(&user_id).await;
                        (user_id, outcome)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (user_id, outcome) in outcomes {
                report.users_scanned += 1;
                match outcome {
                    Ok(result) => {
                        report.badges_granted += result.granted.len();
                        if let Some(err) = &result.failure {
                            report.users_failed += 1;
                            warn!(user_id = %user_id, error = %err, "用户评估未完成");
                        }
                    }
                    Err(err) => {
                        report.users_failed += 1;
                        warn!(user_id = %user_id, error = %err, "用户评估失败");
                    }
                }
            }

            if page_len < self.config.batch_size {
                break;
            }
            cursor = Some(last);
        }

        info!(
            users_scanned = report.users_scanned,
            users_failed = report.users_failed,
            badges_granted = report.badges_granted,
            "徽章巡检完成"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AwardRecord;
    use crate::repository::MockActivityRepositoryTrait;
    use crate::service::dto::EvaluationResult;
    use crate::service::eligibility_service::MockAwardEvaluator;
    use chrono::Utc;

    fn granted_result(user_id: &str, count: usize) -> EvaluationResult {
        let mut result = EvaluationResult::new(user_id);
        for badge_id in 0..count as i64 {
            result.add_grant(AwardRecord {
                id: badge_id,
                user_id: user_id.to_string(),
                badge_id,
                awarded_at: Utc::now(),
                is_automatic: true,
                granted_by: None,
                progress: None,
            });
        }
        result
    }

    fn sweep_config(batch_size: i64) -> SweepConfig {
        SweepConfig {
            batch_size,
            concurrency: 4,
        }
    }

    #[tokio::test]
    async fn test_sweep_pages_through_all_users() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_list_user_ids()
            .withf(|after, limit| after.is_none() && *limit == 2)
            .times(1)
            .returning(|_, _| Ok(vec!["u1".to_string(), "u2".to_string()]));
        repo.expect_list_user_ids()
            .withf(|after, _| after.as_deref() == Some("u2"))
            .times(1)
            .returning(|_, _| Ok(vec!["u3".to_string()]));

        let mut evaluator = MockAwardEvaluator::new();
        evaluator
            .expect_evaluate_and_award()
            .times(3)
            .returning(|user_id| Ok(granted_result(user_id, 1)));

        let sweep = BadgeSweepService::new(Arc::new(evaluator), Arc::new(repo), sweep_config(2));
        let report = sweep.run().await.unwrap();

        assert_eq!(report.users_scanned, 3);
        assert_eq!(report.badges_granted, 3);
        assert_eq!(report.users_failed, 0);
    }

    #[tokio::test]
    async fn test_sweep_continues_after_user_failure() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_list_user_ids()
            .returning(|_, _| Ok(vec!["u1".to_string(), "u2".to_string()]));

        let mut evaluator = MockAwardEvaluator::new();
        evaluator.expect_evaluate_and_award().returning(|user_id| {
            if user_id == "u1" {
                Err(BadgeError::Store("timeout".to_string()))
            } else {
                Ok(granted_result(user_id, 2))
            }
        });

        let sweep = BadgeSweepService::new(Arc::new(evaluator), Arc::new(repo), sweep_config(10));
        let report = sweep.run().await.unwrap();

        assert_eq!(report.users_scanned, 2);
        assert_eq!(report.users_failed, 1);
        assert_eq!(report.badges_granted, 2);
    }

    #[tokio::test]
    async fn test_sweep_empty_user_table() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_list_user_ids().returning(|_, _| Ok(vec![]));

        let sweep = BadgeSweepService::new(
            Arc::new(MockAwardEvaluator::new()),
            Arc::new(repo),
            sweep_config(10),
        );
        assert_eq!(sweep.run().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_rejects_non_positive_batch() {
        let sweep = BadgeSweepService::new(
            Arc::new(MockAwardEvaluator::new()),
            Arc::new(MockActivityRepositoryTrait::new()),
            sweep_config(0),
        );
        assert!(sweep.run().await.is_err());
    }
}
