//! 徽章资格服务错误类型
//!
//! 区分业务校验错误与存储层故障，调用方据此判断“无事可做”与“操作失败”

use thiserror::Error;

/// 徽章资格服务错误类型
#[derive(Debug, Error)]
pub enum BadgeError {
    // === 业务错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("徽章条件配置无效: badge_id={badge_id}, {reason}")]
    InvalidCriteria { badge_id: i64, reason: String },

    // === 存储错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("存储不可用: {0}")]
    Store(String),

    // === 系统错误 ===
    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 徽章资格服务 Result 类型别名
pub type Result<T> = std::result::Result<T, BadgeError>;

impl BadgeError {
    /// 检查是否为存储层故障
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Store(_))
    }

    /// 检查是否为唯一约束冲突
    ///
    /// 并发发放同一徽章时，后到的插入会触发 (user_id, badge_id) 唯一约束
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(_)) => false,
            Self::Database(_) | Self::Store(_) => true,
            _ => false,
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidCriteria { .. } => "INVALID_CRITERIA",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Store(_) => "STORE_UNAVAILABLE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
