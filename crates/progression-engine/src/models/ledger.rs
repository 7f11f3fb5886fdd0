//! 经验流水相关实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ActionType;

/// 经验流水
///
/// 只追加，不更新不删除；是用户累计经验的唯一事实来源。
/// (user_id, action_type, target_ref) 全局唯一，即幂等键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceLedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub action_type: ActionType,
    /// 带符号的经验变动
    pub delta: i64,
    /// 触发奖励的实体引用（帖子 ID、点赞 ID、日期等）
    pub target_ref: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的流水
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub action_type: ActionType,
    pub delta: i64,
    pub target_ref: String,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn new(
        user_id: impl Into<String>,
        action_type: ActionType,
        delta: i64,
        target_ref: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action_type,
            delta,
            target_ref: target_ref.into(),
            created_at: Utc::now(),
        }
    }
}

/// 一次原子写入请求
///
/// `requires_prior` 用于撤回类动作：只有同一目标上存在被撤回动作的流水时才允许写入，
/// 实际写入的 delta 取被撤回流水 delta 的相反数，`entry.delta` 被忽略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWrite {
    pub entry: NewLedgerEntry,
    pub requires_prior: Option<ActionType>,
}

/// 写入成功后的快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedAward {
    pub entry: ExperienceLedgerEntry,
    pub previous_total: i64,
    pub new_total: i64,
    pub previous_level: i32,
    pub new_level: i32,
}

/// 原子写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(AppliedAward),
    /// 幂等键已存在，未做任何修改
    Duplicate,
    /// 撤回类动作找不到可撤回的奖励，未做任何修改
    MissingPrior,
}
