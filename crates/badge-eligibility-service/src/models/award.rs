//! 徽章授予记录
//!
//! (user_id, badge_id) 全局唯一，记录创建后不再修改，只能被撤销删除

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::badge::BadgeDefinition;

/// 徽章授予记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecord {
    pub id: i64,
    pub user_id: String,
    pub badge_id: i64,
    pub awarded_at: DateTime<Utc>,
    /// 是否由资格引擎自动发放
    pub is_automatic: bool,
    /// 手动发放时的操作人
    #[sqlx(default)]
    pub granted_by: Option<String>,
    /// 发放时的条件进度快照
    #[sqlx(default)]
    pub progress: Option<Value>,
}

/// 待插入的授予记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewAward {
    pub user_id: String,
    pub badge_id: i64,
    pub awarded_at: DateTime<Utc>,
    pub is_automatic: bool,
    pub granted_by: Option<String>,
    pub progress: Option<Value>,
}

/// 用户徽章视图
///
/// 左连接语义：徽章定义被删除后仍返回授予记录，`badge` 为 None
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgeView {
    pub award: AwardRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<BadgeDefinition>,
}

/// 徽章目录持有人数统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeHolderCount {
    pub badge: BadgeDefinition,
    pub holder_count: i64,
}
