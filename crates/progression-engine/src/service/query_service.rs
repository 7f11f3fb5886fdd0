//! 进度查询与修复服务
//!
//! 只读查询直接读取缓存投影；修复路径从流水重算缓存

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{ProgressionError, Result};
use crate::level::LevelCurve;
use crate::models::{ExperienceLedgerEntry, LevelProgress, RebuildOutcome, UserBadge};
use crate::repository::{BadgeStore, LedgerStore};

/// 单次最多返回的流水条数
pub const MAX_LEDGER_PAGE: i64 = 200;

/// 进度查询服务
pub struct ProgressQueryService {
    ledger: Arc<dyn LedgerStore>,
    badges: Arc<dyn BadgeStore>,
    curve: LevelCurve,
}

impl ProgressQueryService {
    pub fn new(ledger: Arc<dyn LedgerStore>, badges: Arc<dyn BadgeStore>, curve: LevelCurve) -> Self {
        Self {
            ledger,
            badges,
            curve,
        }
    }

    /// 个人主页的等级进度视图，无记录的用户视为 1 级 0 经验
    ///
    /// 等级按当前曲线由累计经验推导，不读取缓存的 level；
    /// 曲线换版后缓存的 level 由 `rebuild_progress` 同步
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn level_progress(&self, user_id: &str) -> Result<LevelProgress> {
        let total = self
            .ledger
            .get_progress(user_id)
            .await?
            .map_or(0, |progress| progress.total_experience);
        Ok(self.curve.level_progress(total))
    }

    /// 已获得的徽章（按获得时间升序）
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        self.badges.list_badges(user_id).await
    }

    /// 最近的经验流水
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn recent_ledger(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ExperienceLedgerEntry>> {
        if limit <= 0 {
            return Err(ProgressionError::Validation(format!(
                "limit 必须为正数: {}",
                limit
            )));
        }
        self.ledger
            .list_entries(user_id, limit.min(MAX_LEDGER_PAGE))
            .await
    }

    /// 从流水重建缓存的 total_experience / level
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn rebuild_progress(&self, user_id: &str) -> Result<RebuildOutcome> {
        let outcome = self.ledger.rebuild_progress(user_id, &self.curve).await?;

        if outcome.drift_corrected() {
            warn!(
                user_id = %user_id,
                cached_total = outcome.previous_total,
                cached_level = outcome.previous_level,
                ledger_total = outcome.progress.total_experience,
                level = outcome.progress.level,
                "缓存与流水不一致，已按流水修复"
            );
        } else {
            info!(user_id = %user_id, "缓存与流水一致");
        }

        Ok(outcome)
    }
}
