//! 徽章资格服务枚举类型定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 徽章条件类型
///
/// 对应徽章定义 `criteria.type` 字段的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaKind {
    /// 发布的优惠总数（不论审核状态）
    OffersPublished,
    /// 审核通过的优惠数
    OffersApproved,
    /// 已通过优惠的累计浏览量
    TotalViews,
    /// 折扣率达到阈值的已通过优惠数
    HighDiscount,
    /// 最近 N 条优惠全部审核通过
    ConsecutiveApprovals,
    /// 注册天数
    TimeActive,
}

impl std::str::FromStr for CriteriaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "offers_published" => Ok(Self::OffersPublished),
            "offers_approved" => Ok(Self::OffersApproved),
            "total_views" => Ok(Self::TotalViews),
            "high_discount" => Ok(Self::HighDiscount),
            "consecutive_approvals" => Ok(Self::ConsecutiveApprovals),
            "time_active" => Ok(Self::TimeActive),
            _ => Err(format!("unknown criteria type: {}", s)),
        }
    }
}

impl CriteriaKind {
    /// 从字符串解析条件类型（可选）
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OffersPublished => "offers_published",
            Self::OffersApproved => "offers_approved",
            Self::TotalViews => "total_views",
            Self::HighDiscount => "high_discount",
            Self::ConsecutiveApprovals => "consecutive_approvals",
            Self::TimeActive => "time_active",
        }
    }

    /// 该类型是否受 timeframe 时间窗口约束
    pub fn supports_timeframe(&self) -> bool {
        matches!(
            self,
            Self::OffersPublished | Self::OffersApproved | Self::TotalViews | Self::HighDiscount
        )
    }
}

/// 统计时间窗口
///
/// 未配置或无法识别时按全部历史统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl Timeframe {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("day") | Some("daily") => Self::Day,
            Some("week") | Some("weekly") => Self::Week,
            Some("month") | Some("monthly") => Self::Month,
            Some("year") | Some("yearly") => Self::Year,
            _ => Self::All,
        }
    }

    /// 窗口长度，月按 30 天、年按 365 天计
    pub fn window(&self) -> Option<Duration> {
        match self {
            Self::Day => Some(Duration::days(1)),
            Self::Week => Some(Duration::days(7)),
            Self::Month => Some(Duration::days(30)),
            Self::Year => Some(Duration::days(365)),
            Self::All => None,
        }
    }

    /// 窗口起点
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }
}

/// 优惠审核状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum OfferStatus {
    /// 待审核
    #[default]
    Pending,
    /// 已通过
    Approved,
    /// 已驳回
    Rejected,
}

impl OfferStatus {
    pub fn is_approved(&self) -> bool {
        *self == Self::Approved
    }
}

/// 徽章发放来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardSource {
    /// 资格引擎自动发放
    Automatic,
    /// 管理员手动发放
    Manual,
}

impl AwardSource {
    pub fn from_flag(is_automatic: bool) -> Self {
        if is_automatic {
            Self::Automatic
        } else {
            Self::Manual
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}
