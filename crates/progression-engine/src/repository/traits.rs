//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::level::LevelCurve;
use crate::models::{
    ActionType, ApplyOutcome, BadgeType, ExperienceLedgerEntry, LedgerWrite, LoginStreak,
    NewUserBadge, RebuildOutcome, StreakUpdate, UserBadge, UserProgress,
};

/// 经验流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 原子地追加流水并更新用户的 total_experience / level
    ///
    /// 幂等键已存在返回 `Duplicate`，撤回前提不满足返回 `MissingPrior`，两者都不修改任何状态
    async fn apply_award(&self, write: &LedgerWrite, curve: &LevelCurve) -> Result<ApplyOutcome>;

    async fn exists(&self, user_id: &str, action: ActionType, target_ref: &str) -> Result<bool>;

    /// 流水合计（事实来源）
    async fn sum_for(&self, user_id: &str) -> Result<i64>;

    async fn get_progress(&self, user_id: &str) -> Result<Option<UserProgress>>;

    /// 按时间倒序列出最近的流水
    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<ExperienceLedgerEntry>>;

    /// 从流水重算缓存（修复路径）
    async fn rebuild_progress(&self, user_id: &str, curve: &LevelCurve) -> Result<RebuildOutcome>;
}

/// 用户徽章仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeStore: Send + Sync {
    async fn has_badge(&self, user_id: &str, badge_type: BadgeType) -> Result<bool>;

    /// 已持有时返回 None
    async fn insert_badge(&self, badge: &NewUserBadge) -> Result<Option<UserBadge>>;

    /// 按获得时间升序
    async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>>;
}

/// 连续登录状态仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginStreakStore: Send + Sync {
    /// 以 `today` 原子推进用户的连续登录状态
    async fn advance_streak(&self, user_id: &str, today: NaiveDate) -> Result<StreakUpdate>;

    async fn get_streak(&self, user_id: &str) -> Result<LoginStreak>;
}

/// 宿主提供的活动计数
///
/// 这些数据归持久层所有，引擎在检查时读取，不做缓存
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityCounts: Send + Sync {
    async fn post_count(&self, user_id: &str) -> Result<i64>;
    async fn comment_count(&self, user_id: &str) -> Result<i64>;
    async fn likes_received(&self, user_id: &str) -> Result<i64>;
    async fn total_users(&self) -> Result<i64>;
}

/// 同时承载流水、徽章、登录状态的完整存储
pub trait ProgressionRepository: LedgerStore + BadgeStore + LoginStreakStore {}

impl<T> ProgressionRepository for T where T: LedgerStore + BadgeStore + LoginStreakStore {}
