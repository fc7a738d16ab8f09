//! 用户活动仓储
//!
//! 从 offers / users 表计算资格评估所需的只读聚合

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::traits::ActivityRepositoryTrait;
use crate::error::Result;
use crate::models::{OfferFilter, OfferStatus};

/// 用户活动仓储
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按过滤条件统计用户的优惠数量
    pub async fn count_offers(&self, user_id: &str, filter: &OfferFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM offers
            WHERE owner_id = $1
              AND ($2::boolean = FALSE OR status = 'approved')
              AND ($3::bigint IS NULL OR discount_percentage * 100 >= $3::bigint)
              AND ($4::timestamptz IS NULL OR created_at >= $4::timestamptz)
            "#,
        )
        .bind(user_id)
        .bind(filter.approved_only)
        .bind(filter.min_discount_bps)
        .bind(filter.since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// 已通过优惠的浏览量之和
    ///
    /// SUM(bigint) 返回 numeric，需转回 bigint
    pub async fn sum_approved_views(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(views), 0)::bigint
            FROM offers
            WHERE owner_id = $1
              AND status = 'approved'
              AND ($2::timestamptz IS NULL OR created_at >= $2::timestamptz)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// 最近创建的优惠审核状态
    pub async fn list_recent_offer_statuses(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<OfferStatus>> {
        let statuses = sqlx::query_scalar::<_, OfferStatus>(
            r#"
            SELECT status
            FROM offers
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(statuses)
    }

    /// 用户注册时间
    pub async fn get_user_created_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created_at)
    }

    /// 按 ID 分页列出用户
    pub async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id
            FROM users
            WHERE ($1::varchar IS NULL OR id > $1::varchar)
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl ActivityRepositoryTrait for ActivityRepository {
    async fn count_offers(&self, user_id: &str, filter: &OfferFilter) -> Result<i64> {
        self.count_offers(user_id, filter).await
    }

    async fn sum_approved_views(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        self.sum_approved_views(user_id, since).await
    }

    async fn list_recent_offer_statuses(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<OfferStatus>> {
        self.list_recent_offer_statuses(user_id, limit).await
    }

    async fn get_user_created_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.get_user_created_at(user_id).await
    }

    async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>> {
        self.list_user_ids(after, limit).await
    }
}
