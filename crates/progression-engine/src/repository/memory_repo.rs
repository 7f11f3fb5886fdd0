//! 内存进度仓储
//!
//! 单进程部署和测试使用。每个用户的流水、缓存和登录状态放在同一个
//! DashMap 条目里，条目写锁即用户级互斥，持锁期间不跨越 await。

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::traits::{BadgeStore, LedgerStore, LoginStreakStore};
use crate::error::Result;
use crate::level::LevelCurve;
use crate::models::{
    ActionType, AppliedAward, ApplyOutcome, BadgeType, ExperienceLedgerEntry, LedgerWrite,
    LoginStreak, NewUserBadge, RebuildOutcome, StreakUpdate, UserBadge, UserProgress,
};

#[derive(Debug)]
struct UserLedger {
    progress: UserProgress,
    entries: Vec<ExperienceLedgerEntry>,
    keys: HashSet<(ActionType, String)>,
}

impl UserLedger {
    fn new(user_id: &str) -> Self {
        Self {
            progress: UserProgress::new(user_id),
            entries: Vec::new(),
            keys: HashSet::new(),
        }
    }

    fn contains(&self, action: ActionType, target_ref: &str) -> bool {
        self.keys.contains(&(action, target_ref.to_string()))
    }

    /// 同一目标上某动作流水的 delta
    fn delta_of(&self, action: ActionType, target_ref: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|entry| entry.action_type == action && entry.target_ref == target_ref)
            .map(|entry| entry.delta)
    }

    fn sum(&self) -> i64 {
        self.entries.iter().map(|entry| entry.delta).sum()
    }
}

/// 内存进度仓储
#[derive(Debug, Default)]
pub struct MemoryProgressionRepository {
    users: DashMap<String, UserLedger>,
    badges: DashMap<(String, BadgeType), UserBadge>,
    next_entry_id: AtomicI64,
    next_badge_id: AtomicI64,
}

impl MemoryProgressionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接改写缓存，模拟缓存与流水不一致
    #[cfg(test)]
    pub(crate) fn corrupt_cache(&self, user_id: &str, total_experience: i64, level: i32) {
        let mut ledger = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id));
        ledger.progress.total_experience = total_experience;
        ledger.progress.level = level;
    }
}

#[async_trait]
impl LedgerStore for MemoryProgressionRepository {
    async fn apply_award(&self, write: &LedgerWrite, curve: &LevelCurve) -> Result<ApplyOutcome> {
        let new_entry = &write.entry;
        let mut ledger = self
            .users
            .entry(new_entry.user_id.clone())
            .or_insert_with(|| UserLedger::new(&new_entry.user_id));

        let delta = match write.requires_prior {
            Some(prior) => match ledger.delta_of(prior, &new_entry.target_ref) {
                Some(prior_delta) => -prior_delta,
                None => return Ok(ApplyOutcome::MissingPrior),
            },
            None => new_entry.delta,
        };

        if !ledger
            .keys
            .insert((new_entry.action_type, new_entry.target_ref.clone()))
        {
            return Ok(ApplyOutcome::Duplicate);
        }

        let entry = ExperienceLedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: new_entry.user_id.clone(),
            action_type: new_entry.action_type,
            delta,
            target_ref: new_entry.target_ref.clone(),
            created_at: new_entry.created_at,
        };
        ledger.entries.push(entry.clone());

        let previous_total = ledger.progress.total_experience;
        let previous_level = ledger.progress.level;
        let new_total = previous_total + entry.delta;
        let new_level = curve.level_of(new_total);

        ledger.progress.total_experience = new_total;
        ledger.progress.level = new_level;
        ledger.progress.updated_at = Utc::now();

        Ok(ApplyOutcome::Applied(AppliedAward {
            entry,
            previous_total,
            new_total,
            previous_level,
            new_level,
        }))
    }

    async fn exists(&self, user_id: &str, action: ActionType, target_ref: &str) -> Result<bool> {
        Ok(self
            .users
            .get(user_id)
            .is_some_and(|ledger| ledger.contains(action, target_ref)))
    }

    async fn sum_for(&self, user_id: &str) -> Result<i64> {
        Ok(self.users.get(user_id).map_or(0, |ledger| ledger.sum()))
    }

    async fn get_progress(&self, user_id: &str) -> Result<Option<UserProgress>> {
        Ok(self.users.get(user_id).map(|ledger| ledger.progress.clone()))
    }

    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<ExperienceLedgerEntry>> {
        let Some(ledger) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut entries = ledger.entries.clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(entries)
    }

    async fn rebuild_progress(&self, user_id: &str, curve: &LevelCurve) -> Result<RebuildOutcome> {
        let mut ledger = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id));

        let previous_total = ledger.progress.total_experience;
        let previous_level = ledger.progress.level;
        let total = ledger.sum();

        ledger.progress.total_experience = total;
        ledger.progress.level = curve.level_of(total);
        ledger.progress.updated_at = Utc::now();

        Ok(RebuildOutcome {
            progress: ledger.progress.clone(),
            previous_total,
            previous_level,
        })
    }
}

#[async_trait]
impl BadgeStore for MemoryProgressionRepository {
    async fn has_badge(&self, user_id: &str, badge_type: BadgeType) -> Result<bool> {
        Ok(self.badges.contains_key(&(user_id.to_string(), badge_type)))
    }

    async fn insert_badge(&self, badge: &NewUserBadge) -> Result<Option<UserBadge>> {
        match self.badges.entry((badge.user_id.clone(), badge.badge_type)) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let stored = UserBadge {
                    id: self.next_badge_id.fetch_add(1, Ordering::SeqCst) + 1,
                    user_id: badge.user_id.clone(),
                    badge_type: badge.badge_type,
                    earned_at: badge.earned_at,
                    metadata: badge.metadata.clone(),
                };
                slot.insert(stored.clone());
                Ok(Some(stored))
            }
        }
    }

    async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let mut badges: Vec<UserBadge> = self
            .badges
            .iter()
            .filter(|item| item.key().0 == user_id)
            .map(|item| item.value().clone())
            .collect();
        badges.sort_by(|a, b| a.earned_at.cmp(&b.earned_at).then(a.id.cmp(&b.id)));
        Ok(badges)
    }
}

#[async_trait]
impl LoginStreakStore for MemoryProgressionRepository {
    async fn advance_streak(&self, user_id: &str, today: NaiveDate) -> Result<StreakUpdate> {
        let mut ledger = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id));

        let update = ledger.progress.streak().advance(today);
        if update.transition.is_new_day() {
            ledger.progress.last_login_date = update.current.last_login_date;
            ledger.progress.consecutive_days = update.current.consecutive_days;
            ledger.progress.updated_at = Utc::now();
        }
        Ok(update)
    }

    async fn get_streak(&self, user_id: &str) -> Result<LoginStreak> {
        Ok(self
            .users
            .get(user_id)
            .map(|ledger| ledger.progress.streak())
            .unwrap_or_default())
    }
}
