//! 进度引擎枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProgressionError;

/// 经验动作类型
///
/// 每种动作在动作表中对应一条分值和幂等范围配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// 发帖（+）
    PostCreate,
    /// 删帖（-）- 撤回发帖奖励
    PostDelete,
    /// 评论（+）- 同一帖子只奖励首条评论
    CommentCreate,
    /// 删评论（-）- 撤回评论奖励
    CommentDelete,
    /// 内容被点赞（+）- 每个点赞事件独立计算
    #[serde(alias = "RECEIVED_LIKE")]
    LikeReceived,
    /// 每日登录（+）
    DailyLogin,
    /// 完善资料（+）- 每个用户仅一次
    ProfileComplete,
    /// 评价合作方（+）
    PartnerRating,
    /// 评论合作方（+）
    PartnerComment,
    /// 点赞合作方（+）
    PartnerLike,
    /// 解锁成就徽章（+）
    AchievementUnlocked,
}

impl ActionType {
    pub const ALL: [ActionType; 11] = [
        Self::PostCreate,
        Self::PostDelete,
        Self::CommentCreate,
        Self::CommentDelete,
        Self::LikeReceived,
        Self::DailyLogin,
        Self::ProfileComplete,
        Self::PartnerRating,
        Self::PartnerComment,
        Self::PartnerLike,
        Self::AchievementUnlocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCreate => "POST_CREATE",
            Self::PostDelete => "POST_DELETE",
            Self::CommentCreate => "COMMENT_CREATE",
            Self::CommentDelete => "COMMENT_DELETE",
            Self::LikeReceived => "LIKE_RECEIVED",
            Self::DailyLogin => "DAILY_LOGIN",
            Self::ProfileComplete => "PROFILE_COMPLETE",
            Self::PartnerRating => "PARTNER_RATING",
            Self::PartnerComment => "PARTNER_COMMENT",
            Self::PartnerLike => "PARTNER_LIKE",
            Self::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
        }
    }

    /// 只能由引擎内部流程发放的动作：登录奖励随连续登录推进，成就奖励随徽章解锁
    pub fn is_engine_driven(&self) -> bool {
        matches!(self, Self::DailyLogin | Self::AchievementUnlocked)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ProgressionError;

    /// 大小写不敏感；RECEIVED_LIKE 是 LIKE_RECEIVED 的旧名
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized == "RECEIVED_LIKE" {
            return Ok(Self::LikeReceived);
        }
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| ProgressionError::UnknownAction(s.to_string()))
    }
}

/// 幂等范围
///
/// 决定幂等键中 target_ref 的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyScope {
    /// 按业务实体去重（帖子、合作方等），重复互动不再奖励
    Target,
    /// 每个事件独立（点赞 ID），事件本身不可重放
    Event,
    /// 按参考时区的自然日去重
    Daily,
    /// 每个用户一生仅一次
    Once,
}

impl IdempotencyScope {
    /// 是否需要调用方提供目标引用
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::Target | Self::Event)
    }
}

/// 徽章类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    FirstPost,
    #[serde(rename = "POST_10")]
    #[sqlx(rename = "POST_10")]
    Post10,
    #[serde(rename = "POST_50")]
    #[sqlx(rename = "POST_50")]
    Post50,
    #[serde(rename = "POST_100")]
    #[sqlx(rename = "POST_100")]
    Post100,
    FirstComment,
    #[serde(rename = "COMMENT_10")]
    #[sqlx(rename = "COMMENT_10")]
    Comment10,
    #[serde(rename = "COMMENT_50")]
    #[sqlx(rename = "COMMENT_50")]
    Comment50,
    #[serde(rename = "COMMENT_100")]
    #[sqlx(rename = "COMMENT_100")]
    Comment100,
    #[serde(rename = "LIKE_RECEIVED_10")]
    #[sqlx(rename = "LIKE_RECEIVED_10")]
    LikeReceived10,
    #[serde(rename = "LIKE_RECEIVED_50")]
    #[sqlx(rename = "LIKE_RECEIVED_50")]
    LikeReceived50,
    #[serde(rename = "LIKE_RECEIVED_100")]
    #[sqlx(rename = "LIKE_RECEIVED_100")]
    LikeReceived100,
    #[serde(rename = "LEVEL_5")]
    #[sqlx(rename = "LEVEL_5")]
    Level5,
    #[serde(rename = "LEVEL_10")]
    #[sqlx(rename = "LEVEL_10")]
    Level10,
    #[serde(rename = "LEVEL_20")]
    #[sqlx(rename = "LEVEL_20")]
    Level20,
    #[serde(rename = "LEVEL_50")]
    #[sqlx(rename = "LEVEL_50")]
    Level50,
    #[serde(rename = "STREAK_7")]
    #[sqlx(rename = "STREAK_7")]
    Streak7,
    #[serde(rename = "STREAK_30")]
    #[sqlx(rename = "STREAK_30")]
    Streak30,
    EarlyAdopter,
}

impl BadgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstPost => "FIRST_POST",
            Self::Post10 => "POST_10",
            Self::Post50 => "POST_50",
            Self::Post100 => "POST_100",
            Self::FirstComment => "FIRST_COMMENT",
            Self::Comment10 => "COMMENT_10",
            Self::Comment50 => "COMMENT_50",
            Self::Comment100 => "COMMENT_100",
            Self::LikeReceived10 => "LIKE_RECEIVED_10",
            Self::LikeReceived50 => "LIKE_RECEIVED_50",
            Self::LikeReceived100 => "LIKE_RECEIVED_100",
            Self::Level5 => "LEVEL_5",
            Self::Level10 => "LEVEL_10",
            Self::Level20 => "LEVEL_20",
            Self::Level50 => "LEVEL_50",
            Self::Streak7 => "STREAK_7",
            Self::Streak30 => "STREAK_30",
            Self::EarlyAdopter => "EARLY_ADOPTER",
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 徽章规则的指标来源
///
/// 除等级外，其余指标都由宿主在检查时提供，引擎不缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricSource {
    PostCount,
    CommentCount,
    LikesReceived,
    Level,
    LoginStreak,
    /// 注册时的全站用户数
    SignupCohort,
}

impl MetricSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCount => "POST_COUNT",
            Self::CommentCount => "COMMENT_COUNT",
            Self::LikesReceived => "LIKES_RECEIVED",
            Self::Level => "LEVEL",
            Self::LoginStreak => "LOGIN_STREAK",
            Self::SignupCohort => "SIGNUP_COHORT",
        }
    }
}

/// 连续登录状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreakTransition {
    /// 首次登录
    First,
    /// 同一天再次登录，无变化
    SameDay,
    /// 昨天登录过，连续天数 +1
    Continued,
    /// 中断后重新开始
    Reset,
}

impl StreakTransition {
    /// 是否跨入了新的自然日（需要发放每日登录经验）
    pub fn is_new_day(&self) -> bool {
        !matches!(self, Self::SameDay)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::SameDay => "same_day",
            Self::Continued => "continued",
            Self::Reset => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_serialization() {
        assert_eq!(
            serde_json::to_string(&ActionType::PostCreate).unwrap(),
            "\"POST_CREATE\""
        );
        assert_eq!(
            serde_json::from_str::<ActionType>("\"RECEIVED_LIKE\"").unwrap(),
            ActionType::LikeReceived
        );
    }

    #[test]
    fn test_action_type_from_str() {
        assert_eq!(
            "comment_create".parse::<ActionType>().unwrap(),
            ActionType::CommentCreate
        );
        assert_eq!(
            "RECEIVED_LIKE".parse::<ActionType>().unwrap(),
            ActionType::LikeReceived
        );
        let err = "SHARE_POST".parse::<ActionType>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");
    }

    #[test]
    fn test_action_as_str_matches_serde() {
        for action in ActionType::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn test_badge_type_serialization() {
        assert_eq!(
            serde_json::to_string(&BadgeType::LikeReceived10).unwrap(),
            "\"LIKE_RECEIVED_10\""
        );
        assert_eq!(
            serde_json::from_str::<BadgeType>("\"EARLY_ADOPTER\"").unwrap(),
            BadgeType::EarlyAdopter
        );
        assert_eq!(BadgeType::Streak30.to_string(), "STREAK_30");
    }

    #[test]
    fn test_scope_requires_target() {
        assert!(IdempotencyScope::Target.requires_target());
        assert!(IdempotencyScope::Event.requires_target());
        assert!(!IdempotencyScope::Daily.requires_target());
        assert!(!IdempotencyScope::Once.requires_target());
    }

    #[test]
    fn test_streak_transition_new_day() {
        assert!(StreakTransition::First.is_new_day());
        assert!(StreakTransition::Reset.is_new_day());
        assert!(!StreakTransition::SameDay.is_new_day());
    }
}
