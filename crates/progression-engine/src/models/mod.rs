//! 进度引擎领域模型
//!
//! 包含经验流水、用户进度投影、连续登录状态和用户徽章

pub mod enums;
pub mod ledger;
pub mod progress;
pub mod user_badge;

pub use enums::{ActionType, BadgeType, IdempotencyScope, MetricSource, StreakTransition};
pub use ledger::{AppliedAward, ApplyOutcome, ExperienceLedgerEntry, LedgerWrite, NewLedgerEntry};
pub use progress::{LevelProgress, LoginStreak, RebuildOutcome, StreakUpdate, UserProgress};
pub use user_badge::{NewUserBadge, UserBadge};
