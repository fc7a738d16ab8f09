//! 条件评估器
//!
//! 将单个徽章的条件规则与用户活动事实比对，给出当前值、目标值与是否满足

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::facts::ActivityFacts;
use crate::error::Result;
use crate::models::{BadgeCriteria, CriteriaKind, OfferFilter, OfferStatus};
use crate::repository::ActivityRepositoryTrait;

const SECONDS_PER_DAY: i64 = 86_400;

/// 单个条件的评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaEvaluation {
    /// None 表示条件类型无法识别
    pub kind: Option<CriteriaKind>,
    pub current: i64,
    pub target: i64,
    pub satisfied: bool,
}

impl CriteriaEvaluation {
    fn at_least(kind: CriteriaKind, current: i64, target: i64) -> Self {
        Self {
            kind: Some(kind),
            current,
            target,
            satisfied: current >= target,
        }
    }

    /// 无法识别的条件类型，永不满足
    pub fn unsupported() -> Self {
        Self {
            kind: None,
            current: 0,
            target: 0,
            satisfied: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.kind.is_some()
    }

    /// 写入授予记录的进度快照
    pub fn snapshot(&self) -> Value {
        json!({
            "type": self.kind.map(|k| k.as_str()),
            "current": self.current,
            "target": self.target,
        })
    }
}

/// 评估单个条件
///
/// 未知类型返回 `unsupported()` 而不是错误，仓储故障向上传播
pub async fn evaluate_criteria<AR>(
    criteria: &BadgeCriteria,
    facts: &mut ActivityFacts<'_, AR>,
) -> Result<CriteriaEvaluation>
where
    AR: ActivityRepositoryTrait + ?Sized,
{
    let Some(kind) = criteria.criteria_kind() else {
        return Ok(CriteriaEvaluation::unsupported());
    };

    let now = facts.now();
    let since = criteria.timeframe().since(now);
    let target = criteria.count_target();

    let evaluation = match kind {
        CriteriaKind::OffersPublished => {
            let count = facts.offer_count(OfferFilter::all().since(since)).await?;
            CriteriaEvaluation::at_least(kind, count, target)
        }
        CriteriaKind::OffersApproved => {
            let count = facts
                .offer_count(OfferFilter::approved().since(since))
                .await?;
            CriteriaEvaluation::at_least(kind, count, target)
        }
        CriteriaKind::TotalViews => {
            let views = facts.approved_views(since).await?;
            CriteriaEvaluation::at_least(kind, views, target)
        }
        CriteriaKind::HighDiscount => {
            // threshold 为折扣率下限，目标为满足折扣的优惠数
            let filter = OfferFilter::approved()
                .with_min_discount(criteria.threshold)
                .since(since);
            let count = facts.offer_count(filter).await?;
            CriteriaEvaluation::at_least(kind, count, criteria.min_offers())
        }
        CriteriaKind::ConsecutiveApprovals => {
            let window = facts.recent_statuses(target).await?;
            consecutive_approvals(window, target)
        }
        CriteriaKind::TimeActive => match facts.account_created_at().await? {
            Some(created_at) => {
                CriteriaEvaluation::at_least(kind, account_age_days(created_at, now), target)
            }
            None => CriteriaEvaluation {
                kind: Some(kind),
                current: 0,
                target,
                satisfied: false,
            },
        },
    };

    Ok(evaluation)
}

/// 连续审核通过判定
///
/// 取最新的 threshold 条优惠，不足 threshold 条或其中任意一条未通过即不满足。
/// threshold 非正时视为未配置，不满足。
pub fn consecutive_approvals(recent: &[OfferStatus], threshold: i64) -> CriteriaEvaluation {
    let streak = recent.iter().take_while(|s| s.is_approved()).count() as i64;

    let satisfied = threshold > 0
        && recent.len() as i64 >= threshold
        && recent
            .iter()
            .take(threshold as usize)
            .all(OfferStatus::is_approved);

    CriteriaEvaluation {
        kind: Some(CriteriaKind::ConsecutiveApprovals),
        current: streak.min(threshold.max(0)),
        target: threshold,
        satisfied,
    }
}

/// 账号天数，按整天向下取整
pub fn account_age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_seconds().div_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BadgeError;
    use crate::repository::MockActivityRepositoryTrait;
    use chrono::Duration;
    use serde_json::json;

    use OfferStatus::{Approved, Pending, Rejected};

    #[test]
    fn test_consecutive_window_with_rejection_fails() {
        // 新到旧：最新 3 条为 [通过, 通过, 驳回]
        let recent = [Approved, Approved, Rejected, Approved, Approved, Approved];
        let evaluation = consecutive_approvals(&recent, 3);
        assert!(!evaluation.satisfied);
        assert_eq!(evaluation.current, 2);
    }

    #[test]
    fn test_consecutive_window_all_approved_succeeds() {
        // 更早的驳回不影响最新窗口
        let recent = [Approved, Approved, Approved, Rejected];
        let evaluation = consecutive_approvals(&recent, 3);
        assert!(evaluation.satisfied);
        assert_eq!(evaluation.current, 3);
    }

    #[test]
    fn test_consecutive_window_too_short_fails() {
        assert!(!consecutive_approvals(&[Approved, Approved], 3).satisfied);
        assert!(!consecutive_approvals(&[], 1).satisfied);
    }

    #[test]
    fn test_consecutive_pending_counts_as_not_approved() {
        assert!(!consecutive_approvals(&[Pending, Approved, Approved], 3).satisfied);
    }

    #[test]
    fn test_consecutive_non_positive_threshold_never_satisfied() {
        assert!(!consecutive_approvals(&[Approved], 0).satisfied);
        assert!(!consecutive_approvals(&[Approved], -2).satisfied);
    }

    #[test]
    fn test_account_age_boundary() {
        let now = Utc::now();
        let exactly_30 = now - Duration::hours(30 * 24);
        assert_eq!(account_age_days(exactly_30, now), 30);

        let one_second_short = exactly_30 + Duration::seconds(1);
        assert_eq!(account_age_days(one_second_short, now), 29);
    }

    #[test]
    fn test_account_age_future_is_negative() {
        let now = Utc::now();
        assert_eq!(account_age_days(now + Duration::seconds(1), now), -1);
    }

    #[tokio::test]
    async fn test_offers_published_boundary() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers()
            .withf(|user_id, filter| *filter == OfferFilter::all() && user_id == "five")
            .returning(|_, _| Ok(5));
        repo.expect_count_offers()
            .withf(|user_id, _| user_id == "four")
            .returning(|_, _| Ok(4));

        let criteria = BadgeCriteria::new(CriteriaKind::OffersPublished, 5);

        let mut facts = ActivityFacts::new(&repo, "five", Utc::now());
        assert!(evaluate_criteria(&criteria, &mut facts).await.unwrap().satisfied);

        let mut facts = ActivityFacts::new(&repo, "four", Utc::now());
        let evaluation = evaluate_criteria(&criteria, &mut facts).await.unwrap();
        assert!(!evaluation.satisfied);
        assert_eq!(evaluation.current, 4);
        assert_eq!(evaluation.target, 5);
    }

    #[tokio::test]
    async fn test_total_views_uses_sum() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_sum_approved_views()
            .returning(|_, _| Ok(1_250));

        let criteria = BadgeCriteria::new(CriteriaKind::TotalViews, 1_000);
        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());
        let evaluation = evaluate_criteria(&criteria, &mut facts).await.unwrap();
        assert!(evaluation.satisfied);
        assert_eq!(evaluation.current, 1_250);
    }

    #[tokio::test]
    async fn test_high_discount_compares_against_min_offers() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers()
            .withf(|_, filter| {
                filter.approved_only
                    && filter.min_discount_bps == Some(5_000)
                    && filter.since.is_none()
            })
            .returning(|_, _| Ok(2));

        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());

        let default_min = BadgeCriteria::new(CriteriaKind::HighDiscount, 50);
        assert!(evaluate_criteria(&default_min, &mut facts).await.unwrap().satisfied);

        let needs_three = BadgeCriteria::new(CriteriaKind::HighDiscount, 50).with_min_offers(3);
        let evaluation = evaluate_criteria(&needs_three, &mut facts).await.unwrap();
        assert!(!evaluation.satisfied);
        assert_eq!(evaluation.target, 3);
        assert_eq!(facts.queries_issued(), 1);
    }

    #[tokio::test]
    async fn test_fractional_discount_threshold_filters_in_basis_points() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers()
            .withf(|_, filter| filter.min_discount_bps == Some(1_250))
            .times(1)
            .returning(|_, _| Ok(3));

        let criteria: BadgeCriteria = serde_json::from_value(json!({
            "type": "high_discount",
            "threshold": 12.5,
            "min_offers": 3.0
        }))
        .unwrap();

        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());
        let evaluation = evaluate_criteria(&criteria, &mut facts).await.unwrap();
        assert!(evaluation.satisfied);
        assert_eq!(evaluation.target, 3);
    }

    #[tokio::test]
    async fn test_fractional_count_threshold_rounds_up() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers().returning(|_, _| Ok(4));

        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());
        let evaluation = evaluate_criteria(
            &BadgeCriteria::new(CriteriaKind::OffersPublished, 4.5),
            &mut facts,
        )
        .await
        .unwrap();
        assert!(!evaluation.satisfied);
        assert_eq!(evaluation.target, 5);

        let whole = BadgeCriteria::new(CriteriaKind::OffersPublished, 4.0);
        assert!(evaluate_criteria(&whole, &mut facts).await.unwrap().satisfied);
    }

    #[tokio::test]
    async fn test_timeframe_restricts_offer_window() {
        let now = Utc::now();
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers()
            .withf(move |_, filter| filter.since == Some(now - Duration::days(7)))
            .times(1)
            .returning(|_, _| Ok(1));

        let criteria = BadgeCriteria::new(CriteriaKind::OffersApproved, 2).with_timeframe("week");
        let mut facts = ActivityFacts::new(&repo, "user-1", now);
        assert!(!evaluate_criteria(&criteria, &mut facts).await.unwrap().satisfied);
    }

    #[tokio::test]
    async fn test_time_active_missing_user_not_satisfied() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_get_user_created_at().returning(|_| Ok(None));

        let criteria = BadgeCriteria::new(CriteriaKind::TimeActive, 0);
        let mut facts = ActivityFacts::new(&repo, "ghost", Utc::now());
        assert!(!evaluate_criteria(&criteria, &mut facts).await.unwrap().satisfied);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_unsupported_without_queries() {
        let repo = MockActivityRepositoryTrait::new();
        let criteria = BadgeCriteria {
            kind: "reviews_written".to_string(),
            threshold: 1.0,
            timeframe: None,
            min_offers: None,
            params: Default::default(),
        };

        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());
        let evaluation = evaluate_criteria(&criteria, &mut facts).await.unwrap();
        assert!(!evaluation.is_supported());
        assert!(!evaluation.satisfied);
        assert_eq!(facts.queries_issued(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut repo = MockActivityRepositoryTrait::new();
        repo.expect_count_offers()
            .returning(|_, _| Err(BadgeError::Database(sqlx::Error::PoolTimedOut)));

        let criteria = BadgeCriteria::new(CriteriaKind::OffersPublished, 1);
        let mut facts = ActivityFacts::new(&repo, "user-1", Utc::now());
        let err = evaluate_criteria(&criteria, &mut facts).await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[test]
    fn test_snapshot_shape() {
        let snapshot = consecutive_approvals(&[Approved, Approved], 2).snapshot();
        assert_eq!(snapshot["type"], "consecutive_approvals");
        assert_eq!(snapshot["current"], 2);
        assert_eq!(snapshot["target"], 2);
    }
}
