//! 徽章资格服务领域模型

pub mod activity;
pub mod award;
pub mod badge;
pub mod enums;

// 重新导出常用类型
pub use activity::OfferFilter;
pub use award::{AwardRecord, BadgeHolderCount, NewAward, UserBadgeView};
pub use badge::{BadgeCriteria, BadgeDefinition, DEFAULT_MIN_OFFERS};
pub use enums::{AwardSource, CriteriaKind, OfferStatus, Timeframe};
