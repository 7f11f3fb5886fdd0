//! 用户进度投影与连续登录状态

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::StreakTransition;

/// 用户进度（缓存投影）
///
/// level 和 total_experience 是流水的物化结果，只能由发放事务修改，
/// 任何时候 total_experience 都等于该用户全部流水 delta 之和。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub level: i32,
    pub total_experience: i64,
    #[sqlx(default)]
    pub last_login_date: Option<NaiveDate>,
    pub consecutive_days: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// 尚无任何流水的用户
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            level: 1,
            total_experience: 0,
            last_login_date: None,
            consecutive_days: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn streak(&self) -> LoginStreak {
        LoginStreak {
            last_login_date: self.last_login_date,
            consecutive_days: self.consecutive_days,
        }
    }
}

/// 等级进度视图（个人主页展示）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current_level: i32,
    pub current_experience: i64,
    /// 升到下一级所需的累计经验；满级时为空
    pub experience_for_next_level: Option<i64>,
    /// [0, 100)
    pub progress_percentage: f64,
}

/// 连续登录状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStreak {
    pub last_login_date: Option<NaiveDate>,
    pub consecutive_days: i32,
}

impl LoginStreak {
    /// 以参考时区下的 `today` 推进状态
    ///
    /// 早于上次登录日期的时间视为同一天，不回退状态
    pub fn advance(&self, today: NaiveDate) -> StreakUpdate {
        let (transition, consecutive_days) = match self.last_login_date {
            None => (StreakTransition::First, 1),
            Some(last) if today <= last => (StreakTransition::SameDay, self.consecutive_days),
            Some(last) if today == last + Duration::days(1) => {
                (StreakTransition::Continued, self.consecutive_days + 1)
            }
            Some(_) => (StreakTransition::Reset, 1),
        };

        let current = match transition {
            StreakTransition::SameDay => *self,
            _ => LoginStreak {
                last_login_date: Some(today),
                consecutive_days,
            },
        };

        StreakUpdate {
            previous: *self,
            current,
            transition,
            today,
        }
    }
}

/// 一次登录带来的状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub previous: LoginStreak,
    pub current: LoginStreak,
    pub transition: StreakTransition,
    /// 参考时区下的登录日期
    pub today: NaiveDate,
}

/// 缓存重建结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
    pub progress: UserProgress,
    pub previous_total: i64,
    pub previous_level: i32,
}

impl RebuildOutcome {
    /// 重建前缓存是否与流水不一致
    pub fn drift_corrected(&self) -> bool {
        self.previous_total != self.progress.total_experience
            || self.previous_level != self.progress.level
    }
}
