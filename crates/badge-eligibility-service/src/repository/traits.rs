//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AwardRecord, BadgeDefinition, BadgeHolderCount, NewAward, OfferFilter, OfferStatus,
    UserBadgeView,
};

/// 徽章目录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeCatalogRepositoryTrait: Send + Sync {
    async fn list_active_badges(&self) -> Result<Vec<BadgeDefinition>>;
    /// 全部徽章及持有人数，按持有人数降序
    async fn list_badges_with_holder_counts(&self) -> Result<Vec<BadgeHolderCount>>;
}

/// 授予记录仓储接口
///
/// 存储层必须对 (user_id, badge_id) 施加唯一约束
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AwardRepositoryTrait: Send + Sync {
    async fn list_awarded_badge_ids(&self, user_id: &str) -> Result<Vec<i64>>;
    /// 插入授予记录，唯一约束冲突时返回 None
    async fn insert_award(&self, award: &NewAward) -> Result<Option<AwardRecord>>;
    /// 删除授予记录，返回是否实际删除了记录
    async fn delete_award(&self, user_id: &str, badge_id: i64) -> Result<bool>;
    /// 用户徽章列表（左连接徽章定义），最新授予优先
    async fn list_user_awards(&self, user_id: &str) -> Result<Vec<UserBadgeView>>;
}

/// 用户活动仓储接口
///
/// 只读投影：优惠计数、浏览量汇总、最近优惠审核状态、注册时间
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepositoryTrait: Send + Sync {
    async fn count_offers(&self, user_id: &str, filter: &OfferFilter) -> Result<i64>;
    /// 已通过优惠的浏览量之和
    async fn sum_approved_views(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64>;
    /// 最近创建的 limit 条优惠的审核状态，按创建时间倒序
    async fn list_recent_offer_statuses(&self, user_id: &str, limit: i64)
    -> Result<Vec<OfferStatus>>;
    async fn get_user_created_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>>;
    /// 按 ID 升序分页列出用户，`after` 为上一页最后一个 ID
    async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>>;
}
