//! 进度引擎配置
//!
//! 配置段名为 `progression`，与共享的 AppConfig 使用同一套分层来源，
//! 如 `PROGRESSION_PROGRESSION__EARLY_ADOPTER_LIMIT=50`。

use std::collections::HashMap;

use config::ConfigError;
use serde::Deserialize;

use progression_shared::config::AppConfig;

use crate::calendar::DayReference;
use crate::catalog::{
    ActionTable, BadgeCatalog, DEFAULT_ACHIEVEMENT_BONUS, DEFAULT_EARLY_ADOPTER_LIMIT,
};
use crate::error::Result;
use crate::level::LevelCurve;

pub const CONFIG_SECTION: &str = "progression";

/// 进度引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub level_curve: LevelCurve,
    /// 动作分值覆盖，值为 0 表示停用该动作；撤回类动作只能停用
    pub points: HashMap<String, i64>,
    /// 早期用户徽章的用户数上限，<= 0 不发放
    pub early_adopter_limit: i64,
    /// 切分自然日的参考时区（相对 UTC 的分钟数）
    pub reference_utc_offset_minutes: i32,
    /// 每解锁一枚徽章奖励的经验，0 表示不奖励
    pub achievement_bonus: i64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            level_curve: LevelCurve::v1(),
            points: HashMap::new(),
            early_adopter_limit: DEFAULT_EARLY_ADOPTER_LIMIT,
            reference_utc_offset_minutes: 0,
            achievement_bonus: DEFAULT_ACHIEVEMENT_BONUS,
        }
    }
}

impl ProgressionConfig {
    /// 从配置文件和环境变量加载，缺少配置段时使用默认值
    pub fn load(service_name: &str) -> Result<Self> {
        let source = AppConfig::builder(service_name)?.build()?;
        let config = match source.get::<ProgressionConfig>(CONFIG_SECTION) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验全部配置项
    pub fn validate(&self) -> Result<()> {
        self.level_curve.validate()?;
        self.action_table()?;
        self.day_reference()?;
        Ok(())
    }

    pub fn action_table(&self) -> Result<ActionTable> {
        ActionTable::with_overrides(self.achievement_bonus, &self.points)
    }

    pub fn badge_catalog(&self) -> BadgeCatalog {
        BadgeCatalog::standard(self.early_adopter_limit)
    }

    pub fn day_reference(&self) -> Result<DayReference> {
        DayReference::from_offset_minutes(self.reference_utc_offset_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionType;
    use config::Config;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProgressionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.level_curve, LevelCurve::v1());
        assert_eq!(config.early_adopter_limit, 100);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let source = Config::builder()
            .set_override("progression.reference_utc_offset_minutes", 540)
            .unwrap()
            .set_override("progression.points.post_create", 12)
            .unwrap()
            .set_override("progression.level_curve.max_level", 60)
            .unwrap()
            .build()
            .unwrap();

        let config: ProgressionConfig = source.get(CONFIG_SECTION).unwrap();
        assert_eq!(config.reference_utc_offset_minutes, 540);
        assert_eq!(config.level_curve.max_level, 60);
        assert_eq!(config.level_curve.quadratic, 5);
        assert_eq!(config.achievement_bonus, DEFAULT_ACHIEVEMENT_BONUS);
        assert_eq!(
            config.action_table().unwrap().rule(ActionType::PostCreate).unwrap().delta,
            12
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let config = ProgressionConfig {
            reference_utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_bonus_rejected() {
        let config = ProgressionConfig {
            achievement_bonus: -5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_section_uses_defaults() {
        // SAFETY: 指向不存在的目录，仅影响本测试读取的配置源
        unsafe {
            std::env::set_var("CONFIG_DIR", "/nonexistent-progression-config");
        }
        let config = ProgressionConfig::load("progression-config-test").unwrap();
        assert_eq!(config, ProgressionConfig::default());
        unsafe {
            std::env::remove_var("CONFIG_DIR");
        }
    }
}
