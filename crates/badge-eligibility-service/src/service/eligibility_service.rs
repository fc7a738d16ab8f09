//! 徽章资格评估服务
//!
//! 处理徽章资格评估与发放的核心业务逻辑，包括：
//! - 徽章发放（自动/手动共用同一入口）
//! - 按目录逐一评估用户是否满足条件
//! - 用户徽章列表、目录持有人数、条件进度查询
//! - 徽章撤销
//!
//! ## 评估流程
//!
//! 1. 加载启用的徽章目录 -> 2. 加载用户已持有的徽章
//!    -> 3. 解析条件规则（无效/未知类型跳过）-> 4. 逐一评估未持有的徽章
//!    -> 5. 满足条件的徽章以自动来源发放
//!
//! 唯一性完全依赖存储层约束，同一用户的并发评估不会产生重复记录。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use deals_shared::observability::metrics;

use crate::criteria::{ActivityFacts, CriteriaEvaluation, evaluate_criteria};
use crate::error::{BadgeError, Result};
use crate::models::{
    BadgeCriteria, BadgeDefinition, BadgeHolderCount, CriteriaKind, UserBadgeView,
};
use crate::repository::{
    ActivityRepositoryTrait, AwardRepositoryTrait, BadgeCatalogRepositoryTrait,
};
use crate::service::dto::{
    BadgeProgress, EvaluationResult, GrantBadgeRequest, GrantOutcome, SkipReason,
};

/// 单用户评估入口
///
/// 巡检服务通过该 trait 调用评估逻辑，便于替换为 mock
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AwardEvaluator: Send + Sync {
    async fn evaluate_and_award(&self, user_id: &str) -> Result<EvaluationResult>;
}

/// 徽章资格评估服务
///
/// 无内部状态，可通过 `Arc` 在多个任务间共享
pub struct BadgeEligibilityService<BR, AWR, AR>
where
    BR: BadgeCatalogRepositoryTrait,
    AWR: AwardRepositoryTrait,
    AR: ActivityRepositoryTrait,
{
    catalog_repo: Arc<BR>,
    award_repo: Arc<AWR>,
    activity_repo: Arc<AR>,
}

impl<BR, AWR, AR> BadgeEligibilityService<BR, AWR, AR>
where
    BR: BadgeCatalogRepositoryTrait,
    AWR: AwardRepositoryTrait,
    AR: ActivityRepositoryTrait,
{
    pub fn new(catalog_repo: Arc<BR>, award_repo: Arc<AWR>, activity_repo: Arc<AR>) -> Self {
        Self {
            catalog_repo,
            award_repo,
            activity_repo,
        }
    }

    /// 发放徽章
    ///
    /// 插入受 (user_id, badge_id) 唯一约束保护：已持有时返回 `AlreadyHeld`，
    /// 存储故障返回错误，不会写入部分记录。
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, badge_id = request.badge_id, automatic = request.automatic)
    )]
    pub async fn grant_badge(&self, request: GrantBadgeRequest) -> Result<GrantOutcome> {
        self.grant_at(request, Utc::now()).await
    }

    async fn grant_at(
        &self,
        request: GrantBadgeRequest,
        awarded_at: DateTime<Utc>,
    ) -> Result<GrantOutcome> {
        request.validate()?;

        let source = request.source();
        let award = request.into_new_award(awarded_at);

        let outcome = match self.award_repo.insert_award(&award).await {
            Ok(Some(record)) => GrantOutcome::Granted(record),
            Ok(None) => GrantOutcome::AlreadyHeld,
            // 并发插入时部分存储会直接报告唯一约束冲突
            Err(e) if e.is_unique_violation() => GrantOutcome::AlreadyHeld,
            Err(e) => {
                metrics::record_badge_award(source.as_str(), "failed");
                error!(
                    user_id = %award.user_id,
                    badge_id = award.badge_id,
                    error = %e,
                    "徽章发放失败"
                );
                return Err(e);
            }
        };

        metrics::record_badge_award(source.as_str(), outcome.status());

        match &outcome {
            GrantOutcome::Granted(record) => info!(
                user_id = %record.user_id,
                badge_id = record.badge_id,
                award_id = record.id,
                source = source.as_str(),
                "徽章发放成功"
            ),
            GrantOutcome::AlreadyHeld => debug!(
                user_id = %award.user_id,
                badge_id = award.badge_id,
                "用户已持有该徽章"
            ),
        }

        Ok(outcome)
    }

    /// 评估并发放用户新满足条件的徽章
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn evaluate_and_award(&self, user_id: &str) -> Result<EvaluationResult> {
        self.evaluate_and_award_at(user_id, Utc::now()).await
    }

    /// 以指定时间为基准评估并发放
    pub async fn evaluate_and_award_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult> {
        let started = Instant::now();
        let outcome = self.run_evaluation(user_id, now).await;

        let status = match &outcome {
            Ok(result) if result.is_complete() => "success",
            Ok(_) => "partial",
            Err(_) => "failed",
        };
        metrics::record_badge_evaluation(status, started.elapsed().as_secs_f64());

        if let Ok(result) = &outcome {
            info!(
                user_id = %user_id,
                evaluated = result.badges_evaluated,
                granted = result.granted.len(),
                status,
                "徽章资格评估完成"
            );
        }

        outcome
    }

    async fn run_evaluation(&self, user_id: &str, now: DateTime<Utc>) -> Result<EvaluationResult> {
        validate_user_id(user_id)?;

        let badges = self.catalog_repo.list_active_badges().await?;
        let held: HashSet<i64> = self
            .award_repo
            .list_awarded_badge_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let mut result = EvaluationResult::new(user_id);
        let mut candidates = Vec::with_capacity(badges.len());

        for badge in badges {
            if held.contains(&badge.id) {
                result.add_skipped(badge.id, SkipReason::AlreadyHeld);
                continue;
            }
            match prepare_criteria(&badge) {
                Ok(criteria) => candidates.push((badge, criteria)),
                Err(reason) => result.add_skipped(badge.id, reason),
            }
        }

        result.badges_evaluated = candidates.len();
        if candidates.is_empty() {
            return Ok(result);
        }

        let window = streak_window(candidates.iter().map(|(_, criteria)| criteria));
        let mut facts =
            ActivityFacts::new(self.activity_repo.as_ref(), user_id, now).with_recent_window(window);

        for (badge, criteria) in &candidates {
            let evaluation = match evaluate_criteria(criteria, &mut facts).await {
                Ok(evaluation) => evaluation,
                Err(e) => return settle_failure(result, badge.id, e),
            };

            if !evaluation.satisfied {
                result.add_skipped(badge.id, SkipReason::NotSatisfied);
                continue;
            }

            let request =
                GrantBadgeRequest::automatic(user_id, badge.id).with_progress(evaluation.snapshot());

            match self.grant_at(request, now).await {
                Ok(GrantOutcome::Granted(record)) => result.add_grant(record),
                Ok(GrantOutcome::AlreadyHeld) => {
                    result.add_skipped(badge.id, SkipReason::AlreadyHeld)
                }
                Err(e) => return settle_failure(result, badge.id, e),
            }
        }

        debug!(
            user_id = %user_id,
            queries = facts.queries_issued(),
            "活动聚合查询次数"
        );

        Ok(result)
    }

    /// 用户徽章列表，最新授予优先
    ///
    /// 徽章定义已删除的记录仍会返回，`badge` 为 None
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_badges(&self, user_id: &str) -> Result<Vec<UserBadgeView>> {
        validate_user_id(user_id)?;

        let mut views = self.award_repo.list_user_awards(user_id).await?;
        views.sort_by(|a, b| {
            b.award
                .awarded_at
                .cmp(&a.award.awarded_at)
                .then(b.award.id.cmp(&a.award.id))
        });

        Ok(views)
    }

    /// 徽章目录及持有人数，按持有人数降序
    #[instrument(skip(self))]
    pub async fn list_badge_catalog_with_counts(&self) -> Result<Vec<BadgeHolderCount>> {
        let mut counts = self.catalog_repo.list_badges_with_holder_counts().await?;
        counts.sort_by(|a, b| {
            b.holder_count
                .cmp(&a.holder_count)
                .then(a.badge.sort_order.cmp(&b.badge.sort_order))
                .then(a.badge.id.cmp(&b.badge.id))
        });

        Ok(counts)
    }

    /// 撤销徽章
    ///
    /// 返回是否实际删除了记录；记录不存在不视为错误
    #[instrument(skip(self), fields(user_id = %user_id, badge_id = badge_id))]
    pub async fn revoke_badge(&self, user_id: &str, badge_id: i64) -> Result<bool> {
        validate_user_id(user_id)?;

        let deleted = self.award_repo.delete_award(user_id, badge_id).await?;
        metrics::record_badge_revocation(deleted);

        if deleted {
            info!(user_id = %user_id, badge_id, "徽章已撤销");
        } else {
            debug!(user_id = %user_id, badge_id, "无可撤销的授予记录");
        }

        Ok(deleted)
    }

    /// 用户在每个启用徽章上的条件进度
    ///
    /// 只读，不发放任何徽章
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn badge_progress(&self, user_id: &str) -> Result<Vec<BadgeProgress>> {
        validate_user_id(user_id)?;

        let badges = self.catalog_repo.list_active_badges().await?;
        let held: HashSet<i64> = self
            .award_repo
            .list_awarded_badge_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let prepared: Vec<_> = badges
            .iter()
            .map(|badge| (badge, prepare_criteria(badge).ok()))
            .collect();

        let window = streak_window(prepared.iter().filter_map(|(_, criteria)| criteria.as_ref()));
        let mut facts = ActivityFacts::new(self.activity_repo.as_ref(), user_id, Utc::now())
            .with_recent_window(window);

        let mut progress = Vec::with_capacity(prepared.len());
        for (badge, criteria) in prepared {
            let evaluation = match criteria {
                Some(criteria) => evaluate_criteria(&criteria, &mut facts).await?,
                None => CriteriaEvaluation::unsupported(),
            };
            progress.push(BadgeProgress::from_evaluation(
                badge.id,
                badge.name.as_str(),
                &evaluation,
                held.contains(&badge.id),
            ));
        }

        Ok(progress)
    }
}

#[async_trait]
impl<BR, AWR, AR> AwardEvaluator for BadgeEligibilityService<BR, AWR, AR>
where
    BR: BadgeCatalogRepositoryTrait,
    AWR: AwardRepositoryTrait,
    AR: ActivityRepositoryTrait,
{
    async fn evaluate_and_award(&self, user_id: &str) -> Result<EvaluationResult> {
        BadgeEligibilityService::evaluate_and_award(self, user_id).await
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(BadgeError::Validation("用户 ID 不能为空".to_string()));
    }
    Ok(())
}

/// 解析并校验徽章条件
///
/// 无法解析、校验失败或类型未知的徽章不参与评估，仅记录告警
fn prepare_criteria(badge: &BadgeDefinition) -> std::result::Result<BadgeCriteria, SkipReason> {
    let criteria = match badge.parse_criteria() {
        Ok(criteria) => criteria,
        Err(e) => {
            warn!(badge_id = badge.id, error = %e, "徽章条件无法解析，跳过");
            return Err(SkipReason::InvalidCriteria(e.to_string()));
        }
    };

    if criteria.criteria_kind().is_none() {
        warn!(badge_id = badge.id, kind = %criteria.kind, "未知的徽章条件类型，视为不满足");
        return Err(SkipReason::UnknownCriteria(criteria.kind));
    }

    if let Err(reason) = criteria.validate() {
        let err = BadgeError::InvalidCriteria {
            badge_id: badge.id,
            reason: reason.clone(),
        };
        warn!(error = %err, "徽章条件配置无效，跳过");
        return Err(SkipReason::InvalidCriteria(reason));
    }

    Ok(criteria)
}

/// 目录中 consecutive_approvals 的最大阈值，用于一次性预取最近优惠
fn streak_window<'a>(criteria: impl Iterator<Item = &'a BadgeCriteria>) -> i64 {
    criteria
        .filter(|c| c.criteria_kind() == Some(CriteriaKind::ConsecutiveApprovals))
        .map(BadgeCriteria::count_target)
        .max()
        .unwrap_or(0)
}

/// 存储故障处理
///
/// 尚未写入任何记录时直接返回错误；已有发放时返回部分结果并附带故障
fn settle_failure(
    mut result: EvaluationResult,
    badge_id: i64,
    err: BadgeError,
) -> Result<EvaluationResult> {
    if result.granted.is_empty() {
        error!(user_id = %result.user_id, badge_id, error = %err, "徽章资格评估失败");
        return Err(err);
    }

    warn!(
        user_id = %result.user_id,
        badge_id,
        granted = result.granted.len(),
        error = %err,
        "徽章资格评估中断，返回部分结果"
    );
    result.failure = Some(err);
    Ok(result)
}
