//! 数据库仓储层
//!
//! 提供徽章目录、授予记录与用户活动的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 使用 SQLx 进行数据库操作
//! - 唯一性由数据库约束保证，而非先查后插
//! - 定义 trait 接口以支持 mock 测试

mod activity_repo;
mod award_repo;
mod badge_repo;
mod traits;

pub use activity_repo::ActivityRepository;
pub use award_repo::AwardRepository;
pub use badge_repo::BadgeRepository;
pub use traits::*;
