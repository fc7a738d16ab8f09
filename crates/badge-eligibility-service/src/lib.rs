//! 徽章资格评估服务
//!
//! 为优惠市场的商家用户评估成就徽章资格，并幂等地发放新满足条件的徽章。
//!
//! ## 核心功能
//!
//! - **徽章发放**：基于唯一约束的插入，重复发放返回 `AlreadyHeld` 而非错误
//! - **资格评估**：按徽章目录逐一评估条件（发布数、审核通过数、浏览量、高折扣、连续通过、注册天数）
//! - **徽章查询**：用户徽章列表（最新优先）、目录持有人数统计、条件进度
//! - **徽章撤销**：删除不存在的记录视为成功的空操作
//! - **全量巡检**：分页遍历用户并以有限并发执行评估
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 仓储接口与 PostgreSQL 实现
//! - `criteria`: 条件解析、活动事实缓存与条件评估
//! - `service`: 资格评估服务与巡检服务

pub mod criteria;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use criteria::{ActivityFacts, CriteriaEvaluation, evaluate_criteria};
pub use error::{BadgeError, Result};
pub use models::*;
pub use repository::{
    ActivityRepository, ActivityRepositoryTrait, AwardRepository, AwardRepositoryTrait,
    BadgeCatalogRepositoryTrait, BadgeRepository,
};
pub use service::{AwardEvaluator, BadgeEligibilityService, BadgeSweepService, dto};
