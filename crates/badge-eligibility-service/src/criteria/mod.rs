//! 徽章条件评估
//!
//! - `facts`: 单次评估内的用户活动聚合缓存
//! - `evaluator`: 按条件类型计算当前值并判定是否满足

mod evaluator;
mod facts;

pub use evaluator::{CriteriaEvaluation, account_age_days, consecutive_approvals, evaluate_criteria};
pub use facts::ActivityFacts;
