//! 连续登录跟踪
//!
//! 登录时刻先换算到参考时区的自然日，再推进状态机：
//! 同一天不变，昨天 +1，中断则重置为 1。
//! 每日登录经验按日期去重，所以同一天重复调用是安全的。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use progression_shared::observability::metrics as progression_metrics;

use crate::calendar::DayReference;
use crate::error::Result;
use crate::models::{ActionType, LoginStreak};
use crate::repository::LoginStreakStore;
use crate::service::award_service::AwardCoordinator;
use crate::service::badge_evaluator::BadgeEvaluator;
use crate::service::dto::{AwardMetadata, LoginResult};

/// 连续登录跟踪器
pub struct LoginStreakTracker {
    streaks: Arc<dyn LoginStreakStore>,
    coordinator: Arc<AwardCoordinator>,
    evaluator: Arc<BadgeEvaluator>,
    calendar: DayReference,
}

impl LoginStreakTracker {
    pub fn new(
        streaks: Arc<dyn LoginStreakStore>,
        coordinator: Arc<AwardCoordinator>,
        evaluator: Arc<BadgeEvaluator>,
        calendar: DayReference,
    ) -> Self {
        Self {
            streaks,
            coordinator,
            evaluator,
            calendar,
        }
    }

    /// 记录一次登录
    ///
    /// 状态推进失败会返回错误；每日经验和连续登录徽章是附带效果，失败只记日志
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<LoginResult> {
        let today = self.calendar.day_of(at);
        let streak = self.streaks.advance_streak(user_id, today).await?;

        progression_metrics::record_login(streak.transition.as_str());
        if streak.transition.is_new_day() {
            info!(
                user_id = %user_id,
                day = %today,
                transition = streak.transition.as_str(),
                consecutive_days = streak.current.consecutive_days,
                "登录状态已推进"
            );
        }

        let daily_award = self
            .coordinator
            .award_best_effort(
                user_id,
                ActionType::DailyLogin,
                &AwardMetadata::none().at(at),
            )
            .await;

        let unlocked_badges = match self
            .evaluator
            .check_daily_login_badges(user_id, streak.current.consecutive_days)
            .await
        {
            Ok(badges) => badges,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "连续登录徽章检查失败");
                Vec::new()
            }
        };

        Ok(LoginResult {
            streak,
            daily_award,
            unlocked_badges,
        })
    }

    /// 当前连续登录状态
    pub async fn current_streak(&self, user_id: &str) -> Result<LoginStreak> {
        self.streaks.get_streak(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ActionTable, BadgeCatalog};
    use crate::error::ProgressionError;
    use crate::level::LevelCurve;
    use crate::models::StreakTransition;
    use crate::repository::{
        MockActivityCounts, MockBadgeStore, MockLedgerStore, MockLoginStreakStore,
    };
    use chrono::{NaiveDate, TimeZone};

    fn tracker(
        streaks: MockLoginStreakStore,
        ledger: MockLedgerStore,
        badges: MockBadgeStore,
        calendar: DayReference,
    ) -> LoginStreakTracker {
        let coordinator = Arc::new(AwardCoordinator::new(
            Arc::new(ledger),
            ActionTable::default(),
            LevelCurve::v1(),
            calendar,
        ));
        let evaluator = Arc::new(BadgeEvaluator::new(
            Arc::new(badges),
            Arc::new(MockActivityCounts::new()),
            BadgeCatalog::default(),
        ));
        LoginStreakTracker::new(Arc::new(streaks), coordinator, evaluator, calendar)
    }

    #[tokio::test]
    async fn test_login_uses_reference_day() {
        let mut streaks = MockLoginStreakStore::new();
        streaks
            .expect_advance_streak()
            .withf(|_, today| *today == NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .returning(|_, today| Ok(LoginStreak::default().advance(today)));

        let mut ledger = MockLedgerStore::new();
        ledger
            .expect_apply_award()
            .returning(|_, _| Err(ProgressionError::Storage("down".to_string())));

        // 3 月 2 日 02:00 UTC 在 UTC-5 仍是 3 月 1 日
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap();
        let result = tracker(
            streaks,
            ledger,
            MockBadgeStore::new(),
            DayReference::from_offset_minutes(-300).unwrap(),
        )
        .record_login("u1", at)
        .await
        .unwrap();

        assert_eq!(result.streak.transition, StreakTransition::First);
        assert!(result.daily_award.is_none());
        assert!(result.unlocked_badges.is_empty());
    }

    #[tokio::test]
    async fn test_streak_store_failure_propagates() {
        let mut streaks = MockLoginStreakStore::new();
        streaks
            .expect_advance_streak()
            .returning(|_, _| Err(ProgressionError::ConcurrencyConflict));

        let mut ledger = MockLedgerStore::new();
        ledger.expect_apply_award().never();

        let result = tracker(streaks, ledger, MockBadgeStore::new(), DayReference::utc())
            .record_login("u1", Utc::now())
            .await;
        assert!(matches!(result, Err(ProgressionError::ConcurrencyConflict)));
    }
}
