//! 经验动作表
//!
//! actionType -> { delta, 幂等范围, 撤回关系 }

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{ProgressionError, Result};
use crate::models::{ActionType, IdempotencyScope};

/// 单个动作的发放规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRule {
    pub action: ActionType,
    pub delta: i64,
    pub scope: IdempotencyScope,
    /// 撤回类动作对应的原动作，如 POST_DELETE 撤回 POST_CREATE
    pub reverses: Option<ActionType>,
}

impl ActionRule {
    const fn new(action: ActionType, delta: i64, scope: IdempotencyScope) -> Self {
        Self {
            action,
            delta,
            scope,
            reverses: None,
        }
    }

    const fn reversing(action: ActionType, delta: i64, original: ActionType) -> Self {
        Self {
            action,
            delta,
            scope: IdempotencyScope::Target,
            reverses: Some(original),
        }
    }
}

/// 动作表 v1 默认分值
const DEFAULT_RULES: [ActionRule; 10] = [
    ActionRule::new(ActionType::PostCreate, 10, IdempotencyScope::Target),
    ActionRule::reversing(ActionType::PostDelete, -10, ActionType::PostCreate),
    ActionRule::new(ActionType::CommentCreate, 5, IdempotencyScope::Target),
    ActionRule::reversing(ActionType::CommentDelete, -5, ActionType::CommentCreate),
    ActionRule::new(ActionType::LikeReceived, 2, IdempotencyScope::Event),
    ActionRule::new(ActionType::DailyLogin, 5, IdempotencyScope::Daily),
    ActionRule::new(ActionType::ProfileComplete, 30, IdempotencyScope::Once),
    ActionRule::new(ActionType::PartnerRating, 5, IdempotencyScope::Target),
    ActionRule::new(ActionType::PartnerComment, 3, IdempotencyScope::Target),
    ActionRule::new(ActionType::PartnerLike, 1, IdempotencyScope::Target),
];

pub const DEFAULT_ACHIEVEMENT_BONUS: i64 = 20;

/// 经验动作表
#[derive(Debug, Clone)]
pub struct ActionTable {
    rules: HashMap<ActionType, ActionRule>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::v1(DEFAULT_ACHIEVEMENT_BONUS)
    }
}

impl ActionTable {
    /// v1 默认表；成就奖励为 0 时不启用 ACHIEVEMENT_UNLOCKED
    pub fn v1(achievement_bonus: i64) -> Self {
        let mut rules: HashMap<ActionType, ActionRule> =
            DEFAULT_RULES.iter().map(|rule| (rule.action, *rule)).collect();

        if achievement_bonus != 0 {
            rules.insert(
                ActionType::AchievementUnlocked,
                ActionRule::new(
                    ActionType::AchievementUnlocked,
                    achievement_bonus,
                    IdempotencyScope::Target,
                ),
            );
        }

        Self { rules }
    }

    /// 在默认表上应用配置覆盖
    ///
    /// key 为动作名（大小写不敏感），值为 0 表示停用该动作。
    /// 撤回类动作只能停用：撤回写入的是原流水 delta 的相反数，
    /// 表中的值随原动作的覆盖同步，仅用于展示。
    pub fn with_overrides(achievement_bonus: i64, points: &HashMap<String, i64>) -> Result<Self> {
        if achievement_bonus < 0 {
            return Err(ProgressionError::Validation(format!(
                "成就奖励不能为负: {}",
                achievement_bonus
            )));
        }

        let mut table = Self::v1(achievement_bonus);

        for (name, &delta) in points {
            let action = ActionType::from_str(name)?;
            if action == ActionType::AchievementUnlocked {
                return Err(ProgressionError::Validation(
                    "ACHIEVEMENT_UNLOCKED 请通过 achievement_bonus 配置".to_string(),
                ));
            }

            if delta == 0 {
                table.rules.remove(&action);
                continue;
            }

            let mut rule = DEFAULT_RULES
                .iter()
                .find(|rule| rule.action == action)
                .copied()
                .ok_or(ProgressionError::ActionDisabled(action))?;

            if rule.reverses.is_some() {
                return Err(ProgressionError::Validation(format!(
                    "撤回动作 {} 的分值由原动作决定，只能配置为 0 停用",
                    action
                )));
            }
            if delta < 0 {
                return Err(ProgressionError::Validation(format!(
                    "动作 {} 的分值必须为正: {}",
                    action, delta
                )));
            }

            rule.delta = delta;
            table.rules.insert(action, rule);
        }

        let originals: Vec<(ActionType, i64)> = table
            .rules
            .values()
            .filter(|rule| rule.reverses.is_none())
            .map(|rule| (rule.action, rule.delta))
            .collect();
        for rule in table.rules.values_mut() {
            if let Some((_, delta)) = originals
                .iter()
                .find(|(action, _)| Some(*action) == rule.reverses)
            {
                rule.delta = -delta;
            }
        }

        Ok(table)
    }

    /// 查询动作规则，未启用返回 ActionDisabled
    pub fn rule(&self, action: ActionType) -> Result<&ActionRule> {
        self.rules
            .get(&action)
            .ok_or(ProgressionError::ActionDisabled(action))
    }

    pub fn is_enabled(&self, action: ActionType) -> bool {
        self.rules.contains_key(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_defaults() {
        let table = ActionTable::default();
        let post = table.rule(ActionType::PostCreate).unwrap();
        assert_eq!(post.delta, 10);
        assert_eq!(post.scope, IdempotencyScope::Target);

        let delete = table.rule(ActionType::PostDelete).unwrap();
        assert_eq!(delete.delta, -10);
        assert_eq!(delete.reverses, Some(ActionType::PostCreate));

        let like = table.rule(ActionType::LikeReceived).unwrap();
        assert_eq!(like.scope, IdempotencyScope::Event);

        assert_eq!(
            table.rule(ActionType::AchievementUnlocked).unwrap().delta,
            DEFAULT_ACHIEVEMENT_BONUS
        );
    }

    #[test]
    fn test_every_reversal_mirrors_original() {
        let table = ActionTable::default();
        for action in ActionType::ALL {
            let Ok(rule) = table.rule(action) else { continue };
            if let Some(original) = rule.reverses {
                let original = table.rule(original).unwrap();
                assert_eq!(rule.delta, -original.delta);
                assert_eq!(rule.scope, original.scope);
            }
        }
    }

    #[test]
    fn test_zero_bonus_disables_achievement() {
        let table = ActionTable::v1(0);
        assert!(!table.is_enabled(ActionType::AchievementUnlocked));
        assert!(matches!(
            table.rule(ActionType::AchievementUnlocked),
            Err(ProgressionError::ActionDisabled(ActionType::AchievementUnlocked))
        ));
    }

    #[test]
    fn test_overrides() {
        let points = HashMap::from([
            ("post_create".to_string(), 15),
            ("PARTNER_LIKE".to_string(), 0),
        ]);
        let table = ActionTable::with_overrides(20, &points).unwrap();
        assert_eq!(table.rule(ActionType::PostCreate).unwrap().delta, 15);
        assert!(!table.is_enabled(ActionType::PartnerLike));
    }

    #[test]
    fn test_override_sign_validation() {
        let points = HashMap::from([("POST_DELETE".to_string(), -15)]);
        assert!(ActionTable::with_overrides(20, &points).is_err());

        let points = HashMap::from([("COMMENT_CREATE".to_string(), -5)]);
        assert!(ActionTable::with_overrides(20, &points).is_err());
    }

    #[test]
    fn test_reversal_follows_overridden_original() {
        let points = HashMap::from([("POST_CREATE".to_string(), 15)]);
        let table = ActionTable::with_overrides(20, &points).unwrap();
        assert_eq!(table.rule(ActionType::PostDelete).unwrap().delta, -15);
        assert_eq!(table.rule(ActionType::CommentDelete).unwrap().delta, -5);
    }

    #[test]
    fn test_reversal_can_only_be_disabled() {
        let points = HashMap::from([("COMMENT_DELETE".to_string(), 0)]);
        let table = ActionTable::with_overrides(20, &points).unwrap();
        assert!(!table.is_enabled(ActionType::CommentDelete));
    }

    #[test]
    fn test_override_unknown_action() {
        let points = HashMap::from([("SHARE_POST".to_string(), 3)]);
        let err = ActionTable::with_overrides(20, &points).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");
    }
}
