//! 服务层数据传输对象
//!
//! 定义协作方调用引擎时使用的请求与结果结构，与存储层实体解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ActionType, AppliedAward, StreakUpdate, UserBadge, UserProgress};

/// 发放请求的附加信息
///
/// target_ref 对帖子、评论、点赞、合作方类动作是必填的；
/// occurred_at 决定每日类动作落在哪个自然日，必须是事件的真实发生时间，缺省为当前时间
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl AwardMetadata {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn target(target_ref: impl Into<String>) -> Self {
        Self {
            target_ref: Some(target_ref.into()),
            occurred_at: None,
        }
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// 未写入流水的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 幂等键已存在
    AlreadyAwarded,
    /// 撤回类动作没有可撤回的奖励
    ReversedNothing,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyAwarded => "already_awarded",
            Self::ReversedNothing => "reversed_nothing",
        }
    }
}

/// 单次发放结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub user_id: String,
    pub action: ActionType,
    pub target_ref: String,
    /// 本次实际生效的经验变动，未写入时为 0
    pub delta: i64,
    pub leveled_up: bool,
    pub previous_level: i32,
    pub new_level: i32,
    pub new_total: i64,
    /// 未产生任何状态变化
    pub deduplicated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_entry_id: Option<i64>,
}

impl AwardResult {
    pub(crate) fn applied(applied: &AppliedAward) -> Self {
        let entry = &applied.entry;
        Self {
            user_id: entry.user_id.clone(),
            action: entry.action_type,
            target_ref: entry.target_ref.clone(),
            delta: entry.delta,
            leveled_up: applied.new_level != applied.previous_level,
            previous_level: applied.previous_level,
            new_level: applied.new_level,
            new_total: applied.new_total,
            deduplicated: false,
            skip_reason: None,
            ledger_entry_id: Some(entry.id),
        }
    }

    /// 未写入时回报当前进度
    pub(crate) fn skipped(
        user_id: &str,
        action: ActionType,
        target_ref: String,
        current: Option<UserProgress>,
        reason: SkipReason,
    ) -> Self {
        let current = current.unwrap_or_else(|| UserProgress::new(user_id));
        Self {
            user_id: user_id.to_string(),
            action,
            target_ref,
            delta: 0,
            leveled_up: false,
            previous_level: current.level,
            new_level: current.level,
            new_total: current.total_experience,
            deduplicated: true,
            skip_reason: Some(reason),
            ledger_entry_id: None,
        }
    }

    /// 等级是否上升（下降也算 leveled_up，但不触发等级徽章）
    pub fn level_increased(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// 一次登录的处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub streak: StreakUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_award: Option<AwardResult>,
    pub unlocked_badges: Vec<UserBadge>,
}

/// 协作方钩子的处理结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award: Option<AwardResult>,
    pub unlocked_badges: Vec<UserBadge>,
}

impl ActivityOutcome {
    pub fn is_empty(&self) -> bool {
        self.award.is_none() && self.unlocked_badges.is_empty()
    }
}
