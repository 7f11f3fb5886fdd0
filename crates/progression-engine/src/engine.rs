//! 进度引擎门面
//!
//! 协作方（发帖、评论、点赞、合作方、登录、注册处理器）在自身写入提交后调用这里。
//!
//! `on_*` 钩子是尽力而为的：任何失败只记录日志并返回空结果，不影响主操作。
//! 升级、等级徽章、成就奖励之间会互相触发，由 `settle` 循环处理到稳定为止。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};

use progression_shared::config::AppConfig;
use progression_shared::database::Database;

use crate::config::ProgressionConfig;
use crate::error::{ProgressionError, Result};
use crate::models::{
    ActionType, BadgeType, ExperienceLedgerEntry, LevelProgress, LoginStreak, RebuildOutcome,
    UserBadge,
};
use crate::repository::{
    ActivityCounts, BadgeStore, LedgerStore, LoginStreakStore, MemoryProgressionRepository,
    PgProgressionRepository, ProgressionRepository,
};
use crate::service::{
    ActivityOutcome, AwardCoordinator, AwardMetadata, AwardResult, BadgeEvaluator, LoginResult,
    LoginStreakTracker, ProgressQueryService,
};

/// 连锁结算的最大轮数；每枚徽章只能解锁一次，正常情况下远达不到
const MAX_SETTLE_ROUNDS: usize = 16;

/// 进度引擎
pub struct ProgressionEngine {
    coordinator: Arc<AwardCoordinator>,
    evaluator: Arc<BadgeEvaluator>,
    tracker: LoginStreakTracker,
    queries: ProgressQueryService,
}

impl ProgressionEngine {
    /// 以任意完整存储构建引擎
    pub fn new<R>(
        repo: Arc<R>,
        counts: Arc<dyn ActivityCounts>,
        config: &ProgressionConfig,
    ) -> Result<Self>
    where
        R: ProgressionRepository + 'static,
    {
        config.validate()?;

        let ledger: Arc<dyn LedgerStore> = repo.clone();
        let badges: Arc<dyn BadgeStore> = repo.clone();
        let streaks: Arc<dyn LoginStreakStore> = repo;
        let calendar = config.day_reference()?;

        let coordinator = Arc::new(AwardCoordinator::new(
            ledger.clone(),
            config.action_table()?,
            config.level_curve,
            calendar,
        ));
        let evaluator = Arc::new(BadgeEvaluator::new(
            badges.clone(),
            counts,
            config.badge_catalog(),
        ));
        let tracker = LoginStreakTracker::new(
            streaks,
            coordinator.clone(),
            evaluator.clone(),
            calendar,
        );
        let queries = ProgressQueryService::new(ledger, badges, config.level_curve);

        info!(
            curve_version = config.level_curve.version,
            max_level = config.level_curve.max_level,
            reference_utc_offset_minutes = config.reference_utc_offset_minutes,
            "进度引擎已初始化"
        );

        Ok(Self {
            coordinator,
            evaluator,
            tracker,
            queries,
        })
    }

    /// PostgreSQL 存储，启动时执行迁移
    pub async fn connect(
        pool: PgPool,
        counts: Arc<dyn ActivityCounts>,
        config: &ProgressionConfig,
    ) -> Result<Self> {
        let repo = PgProgressionRepository::new(pool);
        repo.run_migrations().await?;
        Self::new(Arc::new(repo), counts, config)
    }

    /// 按共享配置连接数据库并构建引擎
    pub async fn from_app_config(
        app: &AppConfig,
        counts: Arc<dyn ActivityCounts>,
        config: &ProgressionConfig,
    ) -> Result<Self> {
        let database = Database::connect(&app.database).await?;
        database.health_check().await?;
        Self::connect(database.pool().clone(), counts, config).await
    }

    /// 内存存储
    pub fn in_memory(counts: Arc<dyn ActivityCounts>, config: &ProgressionConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryProgressionRepository::new()), counts, config)
    }

    // ==================== 发放 ====================

    /// 发放经验并结算升级带来的连锁效果
    ///
    /// 校验和存储错误会返回给调用方；连锁效果的失败只记录日志。
    /// DAILY_LOGIN 只能经 `on_login` 发放，ACHIEVEMENT_UNLOCKED 只随徽章解锁发放。
    pub async fn award(
        &self,
        user_id: &str,
        action: ActionType,
        metadata: &AwardMetadata,
    ) -> Result<ActivityOutcome> {
        if action.is_engine_driven() {
            return Err(ProgressionError::Validation(format!(
                "{} 由引擎内部发放，不能直接调用",
                action
            )));
        }
        let award = self.coordinator.award(user_id, action, metadata).await?;
        let unlocked_badges = self.settle(user_id, Some(&award), Vec::new()).await;
        Ok(ActivityOutcome {
            award: Some(award),
            unlocked_badges,
        })
    }

    /// 按动作名发放
    pub async fn award_named(
        &self,
        user_id: &str,
        action: &str,
        metadata: &AwardMetadata,
    ) -> Result<ActivityOutcome> {
        let action = action.parse::<ActionType>()?;
        self.award(user_id, action, metadata).await
    }

    /// 尽力而为的发放，失败时返回 None
    pub async fn award_best_effort(
        &self,
        user_id: &str,
        action: ActionType,
        metadata: &AwardMetadata,
    ) -> Option<ActivityOutcome> {
        match self.award(user_id, action, metadata).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    user_id = %user_id,
                    action = %action,
                    error_code = e.error_code(),
                    error = %e,
                    "经验发放失败，已忽略"
                );
                None
            }
        }
    }

    // ==================== 协作方钩子 ====================

    pub async fn on_post_created(&self, user_id: &str, post_id: &str) -> ActivityOutcome {
        self.on_activity(user_id, ActionType::PostCreate, post_id, BadgeFamily::Posts)
            .await
    }

    /// 撤回发帖奖励；已获得的徽章不撤销
    pub async fn on_post_deleted(&self, user_id: &str, post_id: &str) -> ActivityOutcome {
        self.on_activity(user_id, ActionType::PostDelete, post_id, BadgeFamily::Posts)
            .await
    }

    /// 同一帖子只奖励首条评论
    pub async fn on_comment_created(&self, user_id: &str, post_id: &str) -> ActivityOutcome {
        self.on_activity(
            user_id,
            ActionType::CommentCreate,
            post_id,
            BadgeFamily::Comments,
        )
        .await
    }

    pub async fn on_comment_deleted(&self, user_id: &str, post_id: &str) -> ActivityOutcome {
        self.on_activity(
            user_id,
            ActionType::CommentDelete,
            post_id,
            BadgeFamily::Comments,
        )
        .await
    }

    /// 内容被点赞，奖励内容作者
    pub async fn on_like_received(&self, owner_id: &str, like_id: &str) -> ActivityOutcome {
        self.on_activity(
            owner_id,
            ActionType::LikeReceived,
            like_id,
            BadgeFamily::Likes,
        )
        .await
    }

    /// 合作方评价、评论、点赞
    pub async fn on_partner_activity(
        &self,
        user_id: &str,
        action: ActionType,
        partner_id: &str,
    ) -> ActivityOutcome {
        if !matches!(
            action,
            ActionType::PartnerRating | ActionType::PartnerComment | ActionType::PartnerLike
        ) {
            error!(user_id = %user_id, action = %action, "不是合作方动作，已忽略");
            return ActivityOutcome::default();
        }
        self.on_activity(user_id, action, partner_id, BadgeFamily::None)
            .await
    }

    pub async fn on_profile_completed(&self, user_id: &str) -> ActivityOutcome {
        let award = self
            .coordinator
            .award_best_effort(user_id, ActionType::ProfileComplete, &AwardMetadata::none())
            .await;
        let unlocked_badges = self.settle(user_id, award.as_ref(), Vec::new()).await;
        ActivityOutcome {
            award,
            unlocked_badges,
        }
    }

    /// 登录：推进连续登录、发放每日经验、检查连续登录徽章
    pub async fn on_login(&self, user_id: &str, at: DateTime<Utc>) -> Option<LoginResult> {
        let mut result = match self.tracker.record_login(user_id, at).await {
            Ok(result) => result,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "登录处理失败，已忽略");
                return None;
            }
        };

        let badges = std::mem::take(&mut result.unlocked_badges);
        result.unlocked_badges = self
            .settle(user_id, result.daily_award.as_ref(), badges)
            .await;
        Some(result)
    }

    /// 注册：检查早期用户徽章
    pub async fn on_signup(&self, user_id: &str) -> Vec<UserBadge> {
        match self.evaluator.check_early_adopter_badge(user_id).await {
            Ok(badges) => self.settle(user_id, None, badges).await,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "早期用户徽章检查失败");
                Vec::new()
            }
        }
    }

    // ==================== 徽章检查 ====================

    pub async fn check_post_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = self.evaluator.check_post_badges(user_id).await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn check_comment_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = self.evaluator.check_comment_badges(user_id).await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn check_like_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = self.evaluator.check_like_badges(user_id).await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn check_level_badges(&self, user_id: &str, new_level: i32) -> Result<Vec<UserBadge>> {
        let badges = self.evaluator.check_level_badges(user_id, new_level).await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn check_daily_login_badges(
        &self,
        user_id: &str,
        consecutive_days: i32,
    ) -> Result<Vec<UserBadge>> {
        let badges = self
            .evaluator
            .check_daily_login_badges(user_id, consecutive_days)
            .await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn check_early_adopter_badge(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = self.evaluator.check_early_adopter_badge(user_id).await?;
        Ok(self.settle(user_id, None, badges).await)
    }

    pub async fn has_badge(&self, user_id: &str, badge_type: BadgeType) -> Result<bool> {
        self.evaluator.has_badge(user_id, badge_type).await
    }

    // ==================== 查询与修复 ====================

    pub async fn level_progress(&self, user_id: &str) -> Result<LevelProgress> {
        self.queries.level_progress(user_id).await
    }

    pub async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        self.queries.list_badges(user_id).await
    }

    pub async fn recent_ledger(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ExperienceLedgerEntry>> {
        self.queries.recent_ledger(user_id, limit).await
    }

    pub async fn login_streak(&self, user_id: &str) -> Result<LoginStreak> {
        self.tracker.current_streak(user_id).await
    }

    pub async fn rebuild_progress(&self, user_id: &str) -> Result<RebuildOutcome> {
        let outcome = self.queries.rebuild_progress(user_id).await?;

        // 修复后等级上升时补发等级徽章
        if outcome.progress.level > outcome.previous_level {
            let unlocked = self.check_level_badges(user_id, outcome.progress.level).await;
            match unlocked {
                Ok(badges) if !badges.is_empty() => info!(
                    user_id = %user_id,
                    count = badges.len(),
                    "重建后补发等级徽章"
                ),
                Ok(_) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "重建后等级徽章检查失败"),
            }
        }

        Ok(outcome)
    }

    // ==================== 内部流程 ====================

    async fn on_activity(
        &self,
        user_id: &str,
        action: ActionType,
        target_ref: &str,
        family: BadgeFamily,
    ) -> ActivityOutcome {
        let award = self
            .coordinator
            .award_best_effort(user_id, action, &AwardMetadata::target(target_ref))
            .await;

        let badges = match self.check_family(user_id, family).await {
            Ok(badges) => badges,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    action = %action,
                    error = %e,
                    "徽章检查失败，已忽略"
                );
                Vec::new()
            }
        };

        let unlocked_badges = self.settle(user_id, award.as_ref(), badges).await;
        ActivityOutcome {
            award,
            unlocked_badges,
        }
    }

    async fn check_family(&self, user_id: &str, family: BadgeFamily) -> Result<Vec<UserBadge>> {
        match family {
            BadgeFamily::Posts => self.evaluator.check_post_badges(user_id).await,
            BadgeFamily::Comments => self.evaluator.check_comment_badges(user_id).await,
            BadgeFamily::Likes => self.evaluator.check_like_badges(user_id).await,
            BadgeFamily::None => Ok(Vec::new()),
        }
    }

    /// 连锁结算：等级上升 -> 等级徽章 -> 成就奖励 -> 可能再次升级
    ///
    /// 返回本次结算中解锁的全部徽章（含传入的 `unlocked`）
    async fn settle(
        &self,
        user_id: &str,
        award: Option<&AwardResult>,
        unlocked: Vec<UserBadge>,
    ) -> Vec<UserBadge> {
        let bonus_enabled = self
            .coordinator
            .actions()
            .is_enabled(ActionType::AchievementUnlocked);

        let mut all = Vec::new();
        let mut pending_badges = unlocked;
        let mut pending_level = award
            .filter(|award| award.level_increased())
            .map(|award| award.new_level);

        for _ in 0..MAX_SETTLE_ROUNDS {
            if let Some(level) = pending_level.take() {
                match self.evaluator.check_level_badges(user_id, level).await {
                    Ok(badges) => pending_badges.extend(badges),
                    Err(e) => warn!(user_id = %user_id, level, error = %e, "等级徽章检查失败"),
                }
            }

            if pending_badges.is_empty() {
                break;
            }

            for badge in std::mem::take(&mut pending_badges) {
                if bonus_enabled
                    && let Some(bonus) = self
                        .coordinator
                        .award_best_effort(
                            user_id,
                            ActionType::AchievementUnlocked,
                            &AwardMetadata::target(badge.badge_type.as_str()),
                        )
                        .await
                    && bonus.level_increased()
                {
                    pending_level = Some(pending_level.map_or(bonus.new_level, |level| {
                        level.max(bonus.new_level)
                    }));
                }
                all.push(badge);
            }
        }

        if !pending_badges.is_empty() || pending_level.is_some() {
            error!(
                user_id = %user_id,
                "连锁结算未收敛，剩余部分将在下次检查时补发"
            );
            all.append(&mut pending_badges);
        }

        all
    }
}

/// 动作对应需要复查的徽章族
#[derive(Debug, Clone, Copy)]
enum BadgeFamily {
    Posts,
    Comments,
    Likes,
    None,
}
