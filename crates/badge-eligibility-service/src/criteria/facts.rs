//! 用户活动事实
//!
//! 单次评估内的聚合缓存：同一查询（同一过滤条件、同一时间窗口）只访问一次仓储，
//! 评估结束即丢弃，不跨调用保留任何派生状态。

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{OfferFilter, OfferStatus};
use crate::repository::ActivityRepositoryTrait;

/// 已拉取的最近优惠窗口
struct RecentWindow {
    /// 请求的条数
    requested: i64,
    /// 实际返回的状态（可能少于 requested）
    statuses: Vec<OfferStatus>,
}

impl RecentWindow {
    /// 当前窗口能否回答 limit 条的请求
    ///
    /// 返回条数少于请求条数说明已取到全部优惠，任何 limit 都可回答
    fn covers(&self, limit: i64) -> bool {
        self.requested >= limit || (self.statuses.len() as i64) < self.requested
    }
}

/// 用户活动事实
pub struct ActivityFacts<'a, AR>
where
    AR: ActivityRepositoryTrait + ?Sized,
{
    repo: &'a AR,
    user_id: &'a str,
    now: DateTime<Utc>,
    offer_counts: HashMap<OfferFilter, i64>,
    approved_views: HashMap<Option<DateTime<Utc>>, i64>,
    recent: Option<RecentWindow>,
    /// 预取条数，取目录中 consecutive_approvals 阈值的最大值
    recent_hint: i64,
    created_at: Option<Option<DateTime<Utc>>>,
    queries_issued: usize,
}

impl<'a, AR> ActivityFacts<'a, AR>
where
    AR: ActivityRepositoryTrait + ?Sized,
{
    pub fn new(repo: &'a AR, user_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            repo,
            user_id,
            now,
            offer_counts: HashMap::new(),
            approved_views: HashMap::new(),
            recent: None,
            recent_hint: 0,
            created_at: None,
            queries_issued: 0,
        }
    }

    /// 设置最近优惠的预取条数
    pub fn with_recent_window(mut self, limit: i64) -> Self {
        self.recent_hint = limit.max(0);
        self
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    /// 评估基准时间
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// 已发出的仓储查询次数
    pub fn queries_issued(&self) -> usize {
        self.queries_issued
    }

    /// 按过滤条件统计的优惠数量
    pub async fn offer_count(&mut self, filter: OfferFilter) -> Result<i64> {
        if let Some(count) = self.offer_counts.get(&filter) {
            return Ok(*count);
        }

        let count = self.repo.count_offers(self.user_id, &filter).await?;
        self.queries_issued += 1;
        self.offer_counts.insert(filter, count);
        Ok(count)
    }

    /// 已通过优惠的浏览量之和
    pub async fn approved_views(&mut self, since: Option<DateTime<Utc>>) -> Result<i64> {
        if let Some(total) = self.approved_views.get(&since) {
            return Ok(*total);
        }

        let total = self.repo.sum_approved_views(self.user_id, since).await?;
        self.queries_issued += 1;
        self.approved_views.insert(since, total);
        Ok(total)
    }

    /// 最近 limit 条优惠的审核状态（新到旧）
    pub async fn recent_statuses(&mut self, limit: i64) -> Result<&[OfferStatus]> {
        let limit = limit.max(0);
        let covered = self.recent.as_ref().is_some_and(|w| w.covers(limit));

        if !covered {
            let fetch = limit.max(self.recent_hint);
            let statuses = self
                .repo
                .list_recent_offer_statuses(self.user_id, fetch)
                .await?;
            self.queries_issued += 1;
            self.recent = Some(RecentWindow {
                requested: fetch,
                statuses,
            });
        }

        Ok(match &self.recent {
            Some(window) => {
                let end = window.statuses.len().min(limit as usize);
                &window.statuses[..end]
            }
            None => &[],
        })
    }

    /// 用户注册时间，用户不存在时为 None
    pub async fn account_created_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        if let Some(created_at) = self.created_at {
            return Ok(created_at);
        }

        let created_at = self.repo.get_user_created_at(self.user_id).await?;
        self.queries_issued += 1;
        self.created_at = Some(created_at);
        Ok(created_at)
    }
}
