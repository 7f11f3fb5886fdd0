//! 徽章评估器
//!
//! 所有徽章族共用同一个评估例程：读取指标 -> 找出已达到的档位 -> 逐个补发未持有的徽章。
//! 单个徽章检查失败只记录日志，不影响其余档位。

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use progression_shared::observability::metrics as progression_metrics;

use crate::catalog::BadgeCatalog;
use crate::error::Result;
use crate::models::{BadgeType, MetricSource, NewUserBadge, UserBadge};
use crate::repository::{ActivityCounts, BadgeStore};

/// 徽章评估器
pub struct BadgeEvaluator {
    badges: Arc<dyn BadgeStore>,
    counts: Arc<dyn ActivityCounts>,
    catalog: BadgeCatalog,
}

impl BadgeEvaluator {
    pub fn new(
        badges: Arc<dyn BadgeStore>,
        counts: Arc<dyn ActivityCounts>,
        catalog: BadgeCatalog,
    ) -> Self {
        Self {
            badges,
            counts,
            catalog,
        }
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    pub async fn has_badge(&self, user_id: &str, badge_type: BadgeType) -> Result<bool> {
        self.badges.has_badge(user_id, badge_type).await
    }

    /// 授予徽章，已持有时返回 None
    pub async fn award_badge(
        &self,
        user_id: &str,
        badge_type: BadgeType,
        metadata: Option<Value>,
    ) -> Result<Option<UserBadge>> {
        let mut badge = NewUserBadge::new(user_id, badge_type);
        if let Some(metadata) = metadata {
            badge = badge.with_metadata(metadata);
        }

        let inserted = self.badges.insert_badge(&badge).await?;
        match &inserted {
            Some(_) => {
                info!(user_id = %user_id, badge = %badge_type, "徽章已解锁");
                progression_metrics::record_badge_awarded(badge_type.as_str());
            }
            None => debug!(user_id = %user_id, badge = %badge_type, "徽章已持有"),
        }
        Ok(inserted)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_post_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let posts = self.counts.post_count(user_id).await?;
        Ok(self.evaluate(user_id, MetricSource::PostCount, posts).await)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_comment_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let comments = self.counts.comment_count(user_id).await?;
        Ok(self
            .evaluate(user_id, MetricSource::CommentCount, comments)
            .await)
    }

    /// 检查内容作者的获赞徽章
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_like_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let likes = self.counts.likes_received(user_id).await?;
        Ok(self
            .evaluate(user_id, MetricSource::LikesReceived, likes)
            .await)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_level_badges(&self, user_id: &str, new_level: i32) -> Result<Vec<UserBadge>> {
        Ok(self
            .evaluate(user_id, MetricSource::Level, i64::from(new_level))
            .await)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_daily_login_badges(
        &self,
        user_id: &str,
        consecutive_days: i32,
    ) -> Result<Vec<UserBadge>> {
        Ok(self
            .evaluate(
                user_id,
                MetricSource::LoginStreak,
                i64::from(consecutive_days),
            )
            .await)
    }

    /// 注册时检查早期用户徽章
    ///
    /// 以检查时的全站用户数作为注册序位快照，并发注册下只保证
    /// "最多约 N 个早期用户徽章"，不保证严格的注册先后顺序
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn check_early_adopter_badge(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let total_users = self.counts.total_users().await?;
        Ok(self
            .evaluate(user_id, MetricSource::SignupCohort, total_users)
            .await)
    }

    /// 补发当前指标下所有未持有的档位
    async fn evaluate(&self, user_id: &str, metric: MetricSource, observed: i64) -> Vec<UserBadge> {
        let mut unlocked = Vec::new();

        for rule in self.catalog.tiers_reached(metric, observed) {
            let badge_type = rule.badge_type;
            let result = match self.badges.has_badge(user_id, badge_type).await {
                Ok(true) => continue,
                Ok(false) => {
                    self.award_badge(user_id, badge_type, Some(rule.metadata(observed)))
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(Some(badge)) => unlocked.push(badge),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        badge = %badge_type,
                        error = %e,
                        "徽章检查失败，继续检查其余档位"
                    );
                    progression_metrics::record_badge_check_failure(badge_type.as_str());
                }
            }
        }

        unlocked
    }
}
