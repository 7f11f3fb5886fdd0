//! 用户徽章实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::BadgeType;

/// 用户徽章
///
/// 每个 (user_id, badge_type) 最多一条，获得后不撤销、不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub id: i64,
    pub user_id: String,
    pub badge_type: BadgeType,
    pub earned_at: DateTime<Utc>,
    /// 触发条件快照，如达到的阈值或注册序位
    #[sqlx(default)]
    pub metadata: Option<serde_json::Value>,
}

/// 待写入的用户徽章
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserBadge {
    pub user_id: String,
    pub badge_type: BadgeType,
    pub metadata: Option<serde_json::Value>,
    pub earned_at: DateTime<Utc>,
}

impl NewUserBadge {
    pub fn new(user_id: impl Into<String>, badge_type: BadgeType) -> Self {
        Self {
            user_id: user_id.into(),
            badge_type,
            metadata: None,
            earned_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
