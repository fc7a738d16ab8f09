//! 授予记录仓储
//!
//! 唯一性由 `user_badges (user_id, badge_id)` 唯一约束保证，插入使用
//! `ON CONFLICT DO NOTHING`，冲突时不返回行

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use super::traits::AwardRepositoryTrait;
use crate::error::Result;
use crate::models::{AwardRecord, BadgeDefinition, NewAward, UserBadgeView};

/// 授予记录左连接徽章定义的查询行
#[derive(sqlx::FromRow)]
struct UserBadgeRow {
    #[sqlx(flatten)]
    award: AwardRecord,
    def_id: Option<i64>,
    def_name: Option<String>,
    def_name_en: Option<String>,
    def_description: Option<String>,
    def_icon: Option<String>,
    def_color: Option<String>,
    def_criteria: Option<Value>,
    def_is_active: Option<bool>,
    def_sort_order: Option<i32>,
    def_created_at: Option<DateTime<Utc>>,
    def_updated_at: Option<DateTime<Utc>>,
}

impl UserBadgeRow {
    fn into_view(self) -> UserBadgeView {
        let badge = match (
            self.def_id,
            self.def_name,
            self.def_icon,
            self.def_criteria,
            self.def_is_active,
            self.def_sort_order,
            self.def_created_at,
            self.def_updated_at,
        ) {
            (
                Some(id),
                Some(name),
                Some(icon),
                Some(criteria),
                Some(is_active),
                Some(sort_order),
                Some(created_at),
                Some(updated_at),
            ) => Some(BadgeDefinition {
                id,
                name,
                name_en: self.def_name_en,
                description: self.def_description,
                icon,
                color: self.def_color,
                criteria,
                is_active,
                sort_order,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        UserBadgeView {
            award: self.award,
            badge,
        }
    }
}

/// 授予记录仓储
pub struct AwardRepository {
    pool: PgPool,
}

impl AwardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 用户已持有的徽章 ID（不区分自动/手动发放）
    pub async fn list_awarded_badge_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT badge_id
            FROM user_badges
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// 用户徽章列表，最新授予优先
    pub async fn list_user_awards(&self, user_id: &str) -> Result<Vec<UserBadgeView>> {
        let rows = sqlx::query_as::<_, UserBadgeRow>(
            r#"
            SELECT ub.id, ub.user_id, ub.badge_id, ub.awarded_at, ub.is_automatic,
                   ub.granted_by, ub.progress,
                   b.id AS def_id, b.name AS def_name, b.name_en AS def_name_en,
                   b.description AS def_description, b.icon AS def_icon,
                   b.color AS def_color, b.criteria AS def_criteria,
                   b.is_active AS def_is_active, b.sort_order AS def_sort_order,
                   b.created_at AS def_created_at, b.updated_at AS def_updated_at
            FROM user_badges ub
            LEFT JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = $1
            ORDER BY ub.awarded_at DESC, ub.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserBadgeRow::into_view).collect())
    }

    // ==================== 写入操作 ====================

    /// 插入授予记录
    ///
    /// 已存在相同 (user_id, badge_id) 时不写入并返回 None
    pub async fn insert_award(&self, award: &NewAward) -> Result<Option<AwardRecord>> {
        let record = sqlx::query_as::<_, AwardRecord>(
            r#"
            INSERT INTO user_badges (user_id, badge_id, awarded_at, is_automatic, granted_by, progress)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            RETURNING id, user_id, badge_id, awarded_at, is_automatic, granted_by, progress
            "#,
        )
        .bind(&award.user_id)
        .bind(award.badge_id)
        .bind(award.awarded_at)
        .bind(award.is_automatic)
        .bind(&award.granted_by)
        .bind(&award.progress)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// 删除授予记录
    pub async fn delete_award(&self, user_id: &str, badge_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_badges
            WHERE user_id = $1 AND badge_id = $2
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AwardRepositoryTrait for AwardRepository {
    async fn list_awarded_badge_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        self.list_awarded_badge_ids(user_id).await
    }

    async fn insert_award(&self, award: &NewAward) -> Result<Option<AwardRecord>> {
        self.insert_award(award).await
    }

    async fn delete_award(&self, user_id: &str, badge_id: i64) -> Result<bool> {
        self.delete_award(user_id, badge_id).await
    }

    async fn list_user_awards(&self, user_id: &str) -> Result<Vec<UserBadgeView>> {
        self.list_user_awards(user_id).await
    }
}
