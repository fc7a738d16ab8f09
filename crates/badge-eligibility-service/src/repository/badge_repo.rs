//! 徽章目录仓储
//!
//! 徽章定义由运营后台维护，此处只读

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::BadgeCatalogRepositoryTrait;
use crate::error::Result;
use crate::models::{BadgeDefinition, BadgeHolderCount};

/// 带持有人数的目录行
#[derive(sqlx::FromRow)]
struct BadgeCountRow {
    #[sqlx(flatten)]
    badge: BadgeDefinition,
    holder_count: i64,
}

/// 徽章目录仓储
pub struct BadgeRepository {
    pool: PgPool,
}

impl BadgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出所有启用的徽章
    pub async fn list_active_badges(&self) -> Result<Vec<BadgeDefinition>> {
        let badges = sqlx::query_as::<_, BadgeDefinition>(
            r#"
            SELECT id, name, name_en, description, icon, color, criteria,
                   is_active, sort_order, created_at, updated_at
            FROM badges
            WHERE is_active = TRUE
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(badges)
    }

    /// 列出全部徽章及持有人数
    ///
    /// 包含已下线徽章，供管理端展示
    pub async fn list_badges_with_holder_counts(&self) -> Result<Vec<BadgeHolderCount>> {
        let rows = sqlx::query_as::<_, BadgeCountRow>(
            r#"
            SELECT b.id, b.name, b.name_en, b.description, b.icon, b.color, b.criteria,
                   b.is_active, b.sort_order, b.created_at, b.updated_at,
                   COUNT(ub.id) AS holder_count
            FROM badges b
            LEFT JOIN user_badges ub ON ub.badge_id = b.id
            GROUP BY b.id
            ORDER BY holder_count DESC, b.sort_order ASC, b.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BadgeHolderCount {
                badge: row.badge,
                holder_count: row.holder_count,
            })
            .collect())
    }
}

#[async_trait]
impl BadgeCatalogRepositoryTrait for BadgeRepository {
    async fn list_active_badges(&self) -> Result<Vec<BadgeDefinition>> {
        self.list_active_badges().await
    }

    async fn list_badges_with_holder_counts(&self) -> Result<Vec<BadgeHolderCount>> {
        self.list_badges_with_holder_counts().await
    }
}
