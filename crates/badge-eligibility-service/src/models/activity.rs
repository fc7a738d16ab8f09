//! 用户活动查询参数

use chrono::{DateTime, Utc};

/// 优惠计数过滤条件
///
/// 同时作为单次评估内聚合结果的缓存键
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OfferFilter {
    /// 仅统计已审核通过的优惠
    pub approved_only: bool,
    /// 折扣率下限，单位为万分之一（1250 即 12.50%），含边界
    pub min_discount_bps: Option<i64>,
    /// 仅统计该时间之后创建的优惠
    pub since: Option<DateTime<Utc>>,
}

impl OfferFilter {
    /// 全部优惠
    pub fn all() -> Self {
        Self::default()
    }

    /// 已通过的优惠
    pub fn approved() -> Self {
        Self {
            approved_only: true,
            ..Self::default()
        }
    }

    /// 按百分比设置折扣率下限
    ///
    /// 折扣率保留两位小数，下限向上取整到 0.01%
    pub fn with_min_discount(mut self, percent: f64) -> Self {
        // 扣除浮点误差，避免 1.1 * 100 被取整为 111
        self.min_discount_bps = Some((percent * 100.0 - 1e-6).ceil() as i64);
        self
    }

    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }
}
