//! PostgreSQL 进度仓储
//!
//! 每次发放在一个事务内完成：锁定 user_progress 行 -> 插入流水 -> 更新缓存。
//! 行锁让同一用户的并发发放串行执行，唯一约束兜底幂等。

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

use super::traits::{BadgeStore, LedgerStore, LoginStreakStore};
use crate::error::Result;
use crate::level::LevelCurve;
use crate::models::{
    ActionType, AppliedAward, ApplyOutcome, BadgeType, ExperienceLedgerEntry, LedgerWrite,
    LoginStreak, NewUserBadge, RebuildOutcome, StreakUpdate, UserBadge, UserProgress,
};

/// 迁移脚本
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL 进度仓储
#[derive(Clone)]
pub struct PgProgressionRepository {
    pool: PgPool,
}

impl PgProgressionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行引擎自身的表结构迁移
    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::ProgressionError::Database(e.into()))
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取用户进度（带行级锁），不存在时先插入默认行
    async fn lock_progress(tx: &mut PgConnection, user_id: &str) -> Result<UserProgress> {
        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let progress = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT user_id, level, total_experience, last_login_date, consecutive_days, updated_at
            FROM user_progress
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        Ok(progress)
    }

    async fn exists_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        action: ActionType,
        target_ref: &str,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM experience_ledger
                WHERE user_id = $1 AND action_type = $2 AND target_ref = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(target_ref)
        .fetch_one(tx)
        .await?;

        Ok(exists)
    }

    /// 在事务中读取被撤回流水的 delta 并锁定该行
    async fn prior_delta_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        action: ActionType,
        target_ref: &str,
    ) -> Result<Option<i64>> {
        let delta = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT delta FROM experience_ledger
            WHERE user_id = $1 AND action_type = $2 AND target_ref = $3
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(target_ref)
        .fetch_optional(tx)
        .await?;

        Ok(delta)
    }

    /// 在事务中插入流水，幂等键冲突时返回 None
    async fn insert_entry_in_tx(
        tx: &mut PgConnection,
        write: &LedgerWrite,
        delta: i64,
    ) -> Result<Option<ExperienceLedgerEntry>> {
        let entry = &write.entry;
        let inserted = sqlx::query_as::<_, ExperienceLedgerEntry>(
            r#"
            INSERT INTO experience_ledger (user_id, action_type, delta, target_ref, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, action_type, target_ref) DO NOTHING
            RETURNING id, user_id, action_type, delta, target_ref, created_at
            "#,
        )
        .bind(&entry.user_id)
        .bind(entry.action_type)
        .bind(delta)
        .bind(&entry.target_ref)
        .bind(entry.created_at)
        .fetch_optional(tx)
        .await?;

        Ok(inserted)
    }

    async fn update_progress_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        total_experience: i64,
        level: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_progress
            SET total_experience = $2, level = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(total_experience)
        .bind(level)
        .execute(tx)
        .await?;

        Ok(())
    }

    async fn sum_in_tx(tx: &mut PgConnection, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(delta), 0)::BIGINT AS total
            FROM experience_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(tx)
        .await?;

        Ok(row.get("total"))
    }
}

#[async_trait]
impl LedgerStore for PgProgressionRepository {
    async fn apply_award(&self, write: &LedgerWrite, curve: &LevelCurve) -> Result<ApplyOutcome> {
        let user_id = write.entry.user_id.as_str();
        let mut tx = self.pool.begin().await?;

        let progress = Self::lock_progress(&mut tx, user_id).await?;

        // 撤回只能抵消原流水实际发放的分值
        let delta = match write.requires_prior {
            Some(prior) => {
                let prior_delta =
                    Self::prior_delta_in_tx(&mut tx, user_id, prior, &write.entry.target_ref)
                        .await?;
                let Some(prior_delta) = prior_delta else {
                    tx.rollback().await?;
                    return Ok(ApplyOutcome::MissingPrior);
                };
                -prior_delta
            }
            None => write.entry.delta,
        };

        let Some(entry) = Self::insert_entry_in_tx(&mut tx, write, delta).await? else {
            tx.rollback().await?;
            debug!(
                user_id = %user_id,
                action = %write.entry.action_type,
                target_ref = %write.entry.target_ref,
                "幂等键已存在"
            );
            return Ok(ApplyOutcome::Duplicate);
        };

        let new_total = progress.total_experience + entry.delta;
        let new_level = curve.level_of(new_total);
        Self::update_progress_in_tx(&mut tx, user_id, new_total, new_level).await?;

        tx.commit().await?;

        Ok(ApplyOutcome::Applied(AppliedAward {
            entry,
            previous_total: progress.total_experience,
            new_total,
            previous_level: progress.level,
            new_level,
        }))
    }

    async fn exists(&self, user_id: &str, action: ActionType, target_ref: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM experience_ledger
                WHERE user_id = $1 AND action_type = $2 AND target_ref = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(target_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn sum_for(&self, user_id: &str) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::sum_in_tx(&mut conn, user_id).await
    }

    async fn get_progress(&self, user_id: &str) -> Result<Option<UserProgress>> {
        let progress = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT user_id, level, total_experience, last_login_date, consecutive_days, updated_at
            FROM user_progress
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<ExperienceLedgerEntry>> {
        let entries = sqlx::query_as::<_, ExperienceLedgerEntry>(
            r#"
            SELECT id, user_id, action_type, delta, target_ref, created_at
            FROM experience_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn rebuild_progress(&self, user_id: &str, curve: &LevelCurve) -> Result<RebuildOutcome> {
        let mut tx = self.pool.begin().await?;

        let before = Self::lock_progress(&mut tx, user_id).await?;
        let total = Self::sum_in_tx(&mut tx, user_id).await?;
        let level = curve.level_of(total);
        Self::update_progress_in_tx(&mut tx, user_id, total, level).await?;

        tx.commit().await?;

        Ok(RebuildOutcome {
            progress: UserProgress {
                total_experience: total,
                level,
                ..before.clone()
            },
            previous_total: before.total_experience,
            previous_level: before.level,
        })
    }
}

#[async_trait]
impl BadgeStore for PgProgressionRepository {
    async fn has_badge(&self, user_id: &str, badge_type: BadgeType) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_badges
                WHERE user_id = $1 AND badge_type = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(badge_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_badge(&self, badge: &NewUserBadge) -> Result<Option<UserBadge>> {
        let inserted = sqlx::query_as::<_, UserBadge>(
            r#"
            INSERT INTO user_badges (user_id, badge_type, earned_at, metadata)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, badge_type) DO NOTHING
            RETURNING id, user_id, badge_type, earned_at, metadata
            "#,
        )
        .bind(&badge.user_id)
        .bind(badge.badge_type)
        .bind(badge.earned_at)
        .bind(&badge.metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = sqlx::query_as::<_, UserBadge>(
            r#"
            SELECT id, user_id, badge_type, earned_at, metadata
            FROM user_badges
            WHERE user_id = $1
            ORDER BY earned_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(badges)
    }
}

#[async_trait]
impl LoginStreakStore for PgProgressionRepository {
    async fn advance_streak(&self, user_id: &str, today: NaiveDate) -> Result<StreakUpdate> {
        let mut tx = self.pool.begin().await?;

        let progress = Self::lock_progress(&mut tx, user_id).await?;
        let update = progress.streak().advance(today);

        if update.transition.is_new_day() {
            sqlx::query(
                r#"
                UPDATE user_progress
                SET last_login_date = $2, consecutive_days = $3, updated_at = NOW()
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .bind(update.current.last_login_date)
            .bind(update.current.consecutive_days)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(update)
    }

    async fn get_streak(&self, user_id: &str) -> Result<LoginStreak> {
        Ok(self
            .get_progress(user_id)
            .await?
            .map(|progress| progress.streak())
            .unwrap_or_default())
    }
}
