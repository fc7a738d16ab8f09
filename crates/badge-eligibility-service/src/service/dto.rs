//! 服务层数据传输对象
//!
//! 定义服务层与调用方交互使用的请求与结果类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::criteria::CriteriaEvaluation;
use crate::error::{BadgeError, Result};
use crate::models::{AwardRecord, AwardSource, CriteriaKind, NewAward};

/// 发放徽章请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBadgeRequest {
    pub user_id: String,
    pub badge_id: i64,
    /// true 为资格引擎发放，false 为管理员手动发放
    pub automatic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
}

impl GrantBadgeRequest {
    /// 资格引擎自动发放
    pub fn automatic(user_id: impl Into<String>, badge_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            badge_id,
            automatic: true,
            granted_by: None,
            progress: None,
        }
    }

    /// 管理员手动发放
    pub fn manual(user_id: impl Into<String>, badge_id: i64, granted_by: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            badge_id,
            automatic: false,
            granted_by: Some(granted_by.into()),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Value) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn source(&self) -> AwardSource {
        AwardSource::from_flag(self.automatic)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(BadgeError::Validation("用户 ID 不能为空".to_string()));
        }
        if self.badge_id <= 0 {
            return Err(BadgeError::Validation(format!(
                "无效的徽章 ID: {}",
                self.badge_id
            )));
        }
        Ok(())
    }

    pub fn into_new_award(self, awarded_at: DateTime<Utc>) -> NewAward {
        NewAward {
            user_id: self.user_id,
            badge_id: self.badge_id,
            awarded_at,
            is_automatic: self.automatic,
            granted_by: self.granted_by,
            progress: self.progress,
        }
    }
}

/// 发放结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "award", rename_all = "snake_case")]
pub enum GrantOutcome {
    /// 新写入的授予记录
    Granted(AwardRecord),
    /// 用户已持有该徽章，未写入
    AlreadyHeld,
}

impl GrantOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn award(&self) -> Option<&AwardRecord> {
        match self {
            Self::Granted(award) => Some(award),
            Self::AlreadyHeld => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Granted(_) => "granted",
            Self::AlreadyHeld => "already_held",
        }
    }
}

/// 未发放的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyHeld,
    NotSatisfied,
    UnknownCriteria(String),
    InvalidCriteria(String),
}

/// 本次评估中未发放的徽章
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedBadge {
    pub badge_id: i64,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// 单个用户的评估结果
///
/// `failure` 不为空时 `granted` 只包含故障发生前已写入的记录
#[derive(Debug, Default)]
pub struct EvaluationResult {
    pub user_id: String,
    pub badges_evaluated: usize,
    pub granted: Vec<AwardRecord>,
    pub skipped: Vec<SkippedBadge>,
    pub failure: Option<BadgeError>,
}

impl EvaluationResult {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn add_grant(&mut self, award: AwardRecord) {
        self.granted.push(award);
    }

    pub fn add_skipped(&mut self, badge_id: i64, reason: SkipReason) {
        self.skipped.push(SkippedBadge { badge_id, reason });
    }

    /// 是否完整评估了所有徽章
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn granted_badge_ids(&self) -> Vec<i64> {
        self.granted.iter().map(|a| a.badge_id).collect()
    }
}

/// 徽章进度
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
    pub badge_id: i64,
    pub badge_name: String,
    /// None 表示条件类型无法识别或配置无效
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CriteriaKind>,
    pub current: i64,
    pub target: i64,
    pub held: bool,
    pub satisfied: bool,
}

impl BadgeProgress {
    pub fn from_evaluation(
        badge_id: i64,
        badge_name: impl Into<String>,
        evaluation: &CriteriaEvaluation,
        held: bool,
    ) -> Self {
        Self {
            badge_id,
            badge_name: badge_name.into(),
            kind: evaluation.kind,
            current: evaluation.current,
            target: evaluation.target,
            held,
            satisfied: evaluation.satisfied,
        }
    }

    /// 完成百分比，封顶 100
    pub fn percent(&self) -> u8 {
        if self.target <= 0 {
            return if self.satisfied { 100 } else { 0 };
        }
        let pct = self.current.max(0).saturating_mul(100) / self.target;
        pct.min(100) as u8
    }
}

/// 巡检汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub users_scanned: usize,
    pub users_failed: usize,
    pub badges_granted: usize,
}
