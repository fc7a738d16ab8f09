//! 服务层
//!
//! 实现徽章资格业务逻辑，协调目录、授予记录与活动仓储。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `eligibility_service`: 徽章发放、资格评估、查询与撤销
//! - `sweep`: 全量巡检

pub mod dto;
pub mod eligibility_service;
pub mod sweep;

pub use dto::*;
pub use eligibility_service::{AwardEvaluator, BadgeEligibilityService};
pub use sweep::BadgeSweepService;
