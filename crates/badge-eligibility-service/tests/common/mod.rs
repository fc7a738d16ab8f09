//! 测试公共工具
//!
//! 内存版仓储：同时实现目录、授予记录与活动三个仓储接口，
//! 并像数据库一样对 (user_id, badge_id) 施加唯一约束。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use badge_eligibility::{
    ActivityRepositoryTrait, AwardRecord, AwardRepositoryTrait, BadgeCatalogRepositoryTrait,
    BadgeDefinition, BadgeEligibilityService, BadgeHolderCount, NewAward, OfferFilter,
    OfferStatus, Result, UserBadgeView,
};

pub type MemoryService = BadgeEligibilityService<MemoryStore, MemoryStore, MemoryStore>;

#[derive(Debug, Clone)]
struct OfferRow {
    id: i64,
    owner_id: String,
    status: OfferStatus,
    discount_percentage: i64,
    views: i64,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, DateTime<Utc>>,
    offers: Vec<OfferRow>,
    badges: Vec<BadgeDefinition>,
    awards: Vec<AwardRecord>,
    next_offer_id: i64,
    next_award_id: i64,
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    activity_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, user_id: &str, created_at: DateTime<Utc>) {
        self.lock().users.insert(user_id.to_string(), created_at);
    }

    pub fn add_offer(
        &self,
        owner_id: &str,
        status: OfferStatus,
        discount_percentage: i64,
        views: i64,
        created_at: DateTime<Utc>,
    ) {
        let mut state = self.lock();
        state.next_offer_id += 1;
        let id = state.next_offer_id;
        state.offers.push(OfferRow {
            id,
            owner_id: owner_id.to_string(),
            status,
            discount_percentage,
            views,
            created_at,
        });
    }

    pub fn add_badge(&self, id: i64, criteria: Value) {
        let now = Utc::now();
        self.lock().badges.push(BadgeDefinition {
            id,
            name: format!("وسام {}", id),
            name_en: Some(format!("Badge {}", id)),
            description: None,
            icon: "award".to_string(),
            color: Some("#F5A623".to_string()),
            criteria,
            is_active: true,
            sort_order: id as i32,
            created_at: now,
            updated_at: now,
        });
    }

    pub fn set_badge_active(&self, id: i64, is_active: bool) {
        if let Some(badge) = self.lock().badges.iter_mut().find(|b| b.id == id) {
            badge.is_active = is_active;
        }
    }

    pub fn delete_badge(&self, id: i64) {
        self.lock().badges.retain(|b| b.id != id);
    }

    pub fn award_count(&self, user_id: &str) -> usize {
        self.lock()
            .awards
            .iter()
            .filter(|a| a.user_id == user_id)
            .count()
    }

    pub fn awarded_badge_ids(&self, user_id: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .lock()
            .awards
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.badge_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn activity_queries(&self) -> usize {
        self.activity_queries.load(Ordering::SeqCst)
    }

    fn record_activity_query(&self) {
        self.activity_queries.fetch_add(1, Ordering::SeqCst);
    }
}

/// 三个仓储共用同一份内存存储
pub fn memory_service(store: &Arc<MemoryStore>) -> MemoryService {
    BadgeEligibilityService::new(store.clone(), store.clone(), store.clone())
}

#[async_trait]
impl BadgeCatalogRepositoryTrait for MemoryStore {
    async fn list_active_badges(&self) -> Result<Vec<BadgeDefinition>> {
        let mut badges: Vec<_> = self
            .lock()
            .badges
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect();
        badges.sort_by_key(|b| (b.sort_order, b.id));
        Ok(badges)
    }

    async fn list_badges_with_holder_counts(&self) -> Result<Vec<BadgeHolderCount>> {
        let state = self.lock();
        let counts = state
            .badges
            .iter()
            .map(|badge| BadgeHolderCount {
                badge: badge.clone(),
                holder_count: state.awards.iter().filter(|a| a.badge_id == badge.id).count()
                    as i64,
            })
            .collect();
        Ok(counts)
    }
}

#[async_trait]
impl AwardRepositoryTrait for MemoryStore {
    async fn list_awarded_badge_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        Ok(self.awarded_badge_ids(user_id))
    }

    async fn insert_award(&self, award: &NewAward) -> Result<Option<AwardRecord>> {
        // 让出调度，放大并发评估之间的交错
        tokio::task::yield_now().await;

        let mut state = self.lock();
        let exists = state
            .awards
            .iter()
            .any(|a| a.user_id == award.user_id && a.badge_id == award.badge_id);
        if exists {
            return Ok(None);
        }

        state.next_award_id += 1;
        let record = AwardRecord {
            id: state.next_award_id,
            user_id: award.user_id.clone(),
            badge_id: award.badge_id,
            awarded_at: award.awarded_at,
            is_automatic: award.is_automatic,
            granted_by: award.granted_by.clone(),
            progress: award.progress.clone(),
        };
        state.awards.push(record.clone());
        Ok(Some(record))
    }

    async fn delete_award(&self, user_id: &str, badge_id: i64) -> Result<bool> {
        let mut state = self.lock();
        let before = state.awards.len();
        state
            .awards
            .retain(|a| !(a.user_id == user_id && a.badge_id == badge_id));
        Ok(state.awards.len() < before)
    }

    async fn list_user_awards(&self, user_id: &str) -> Result<Vec<UserBadgeView>> {
        let state = self.lock();
        let views = state
            .awards
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|award| UserBadgeView {
                award: award.clone(),
                badge: state.badges.iter().find(|b| b.id == award.badge_id).cloned(),
            })
            .collect();
        Ok(views)
    }
}

#[async_trait]
impl ActivityRepositoryTrait for MemoryStore {
    async fn count_offers(&self, user_id: &str, filter: &OfferFilter) -> Result<i64> {
        self.record_activity_query();
        let count = self
            .lock()
            .offers
            .iter()
            .filter(|o| o.owner_id == user_id)
            .filter(|o| !filter.approved_only || o.status.is_approved())
            .filter(|o| {
                filter
                    .min_discount_bps
                    .is_none_or(|min| o.discount_percentage * 100 >= min)
            })
            .filter(|o| filter.since.is_none_or(|since| o.created_at >= since))
            .count();
        Ok(count as i64)
    }

    async fn sum_approved_views(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        self.record_activity_query();
        let total = self
            .lock()
            .offers
            .iter()
            .filter(|o| o.owner_id == user_id && o.status.is_approved())
            .filter(|o| since.is_none_or(|since| o.created_at >= since))
            .map(|o| o.views)
            .sum();
        Ok(total)
    }

    async fn list_recent_offer_statuses(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<OfferStatus>> {
        self.record_activity_query();
        let mut offers: Vec<OfferRow> = self
            .lock()
            .offers
            .iter()
            .filter(|o| o.owner_id == user_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(offers
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|o| o.status)
            .collect())
    }

    async fn get_user_created_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.record_activity_query();
        Ok(self.lock().users.get(user_id).copied())
    }

    async fn list_user_ids(&self, after: Option<String>, limit: i64) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .lock()
            .users
            .keys()
            .filter(|id| after.as_ref().is_none_or(|after| id.as_str() > after.as_str()))
            .cloned()
            .collect();
        ids.sort();
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }
}
