//! 徽章定义与条件规则
//!
//! 徽章定义由运营后台维护，资格引擎只读。条件以 JSON 存储在 `criteria` 列中：
//!
//! ```json
//! {"type": "high_discount", "threshold": 50, "timeframe": "month", "min_offers": 3}
//! ```

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::{CriteriaKind, Timeframe};

/// 高折扣条件默认要求的优惠数量
pub const DEFAULT_MIN_OFFERS: i64 = 1;

/// 徽章定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
    pub id: i64,
    /// 徽章名称（阿拉伯语，主展示文案）
    pub name: String,
    /// 英文名称
    #[sqlx(default)]
    pub name_en: Option<String>,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 图标标识
    pub icon: String,
    /// 主题色（如 `#F5A623`）
    #[sqlx(default)]
    pub color: Option<String>,
    /// 条件规则（JSON），存储 BadgeCriteria 结构
    pub criteria: Value,
    pub is_active: bool,
    /// 排序权重，数值越小越靠前
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BadgeDefinition {
    /// 解析条件规则
    pub fn parse_criteria(&self) -> Result<BadgeCriteria, serde_json::Error> {
        serde_json::from_value(self.criteria.clone())
    }
}

/// 徽章条件规则
///
/// `kind` 保留原始字符串，未知类型在评估时视为不满足而不是解析失败。
/// 数值参数兼容整数、小数与数字字符串写法。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeCriteria {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "deserialize_threshold")]
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    /// high_discount 要求的最少优惠数，兼容 `minOffers` 写法
    #[serde(
        default,
        alias = "minOffers",
        deserialize_with = "deserialize_min_offers",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_offers: Option<i64>,
    /// 其余未识别的扩展参数
    #[serde(default, flatten)]
    pub params: Map<String, Value>,
}

impl BadgeCriteria {
    pub fn new(kind: CriteriaKind, threshold: impl Into<f64>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            threshold: threshold.into(),
            timeframe: None,
            min_offers: None,
            params: Map::new(),
        }
    }

    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = Some(timeframe.into());
        self
    }

    pub fn with_min_offers(mut self, min_offers: i64) -> Self {
        self.min_offers = Some(min_offers);
        self
    }

    /// 已识别的条件类型
    pub fn criteria_kind(&self) -> Option<CriteriaKind> {
        CriteriaKind::parse(&self.kind)
    }

    /// 统计时间窗口，仅对优惠类聚合生效
    pub fn timeframe(&self) -> Timeframe {
        match self.criteria_kind() {
            Some(kind) if kind.supports_timeframe() => Timeframe::parse(self.timeframe.as_deref()),
            _ => Timeframe::All,
        }
    }

    /// 计数类条件的整数目标
    ///
    /// 计数只能取整数，`count >= 12.5` 等价于 `count >= 13`
    pub fn count_target(&self) -> i64 {
        self.threshold.ceil() as i64
    }

    /// 高折扣条件要求的最少优惠数
    pub fn min_offers(&self) -> i64 {
        self.min_offers.unwrap_or(DEFAULT_MIN_OFFERS)
    }

    /// 校验规则配置
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(format!("threshold must be non-negative, got {}", self.threshold));
        }
        if self.criteria_kind() == Some(CriteriaKind::HighDiscount) && self.min_offers() <= 0 {
            return Err(format!("min_offers must be positive, got {}", self.min_offers()));
        }
        Ok(())
    }
}

/// 数值或数字字符串
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericParam {
    Number(f64),
    Text(String),
}

impl NumericParam {
    fn into_f64(self) -> std::result::Result<f64, String> {
        let value = match self {
            Self::Number(n) => n,
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("expected a number, got {text:?}"))?,
        };
        if !value.is_finite() {
            return Err(format!("expected a finite number, got {value}"));
        }
        Ok(value)
    }
}

fn deserialize_threshold<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumericParam::deserialize(deserializer)?
        .into_f64()
        .map_err(de::Error::custom)
}

/// 最少优惠数必须为整数，`3.0` 与 `"3"` 可接受，`2.5` 拒绝
fn deserialize_min_offers<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumericParam::deserialize(deserializer)?
        .into_f64()
        .map_err(de::Error::custom)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return Err(de::Error::custom(format!(
            "min_offers must be a whole number, got {value}"
        )));
    }
    Ok(Some(value as i64))
}
