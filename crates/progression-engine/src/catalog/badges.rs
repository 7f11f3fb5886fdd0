//! 徽章目录
//!
//! 每条规则是 { badgeType, 指标来源, 阈值 }，由同一个评估例程处理

use serde_json::{Value, json};

use crate::models::{BadgeType, MetricSource};

pub const DEFAULT_EARLY_ADOPTER_LIMIT: i64 = 100;

/// 阈值比较方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 指标 >= 阈值
    AtLeast,
    /// 指标 <= 阈值（早期用户按注册时的用户总数判断）
    AtMost,
}

/// 单条徽章规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeRule {
    pub badge_type: BadgeType,
    pub metric: MetricSource,
    pub threshold: i64,
    pub comparison: Comparison,
}

impl BadgeRule {
    const fn at_least(badge_type: BadgeType, metric: MetricSource, threshold: i64) -> Self {
        Self {
            badge_type,
            metric,
            threshold,
            comparison: Comparison::AtLeast,
        }
    }

    pub fn is_satisfied(&self, observed: i64) -> bool {
        match self.comparison {
            Comparison::AtLeast => observed >= self.threshold,
            Comparison::AtMost => observed >= 1 && observed <= self.threshold,
        }
    }

    /// 写入 UserBadge.metadata 的触发快照
    pub fn metadata(&self, observed: i64) -> Value {
        match self.metric {
            MetricSource::SignupCohort => json!({
                "metric": self.metric.as_str(),
                "cohortPosition": observed,
                "limit": self.threshold,
            }),
            _ => json!({
                "metric": self.metric.as_str(),
                "threshold": self.threshold,
                "observed": observed,
            }),
        }
    }
}

const TIERED_RULES: [BadgeRule; 17] = [
    BadgeRule::at_least(BadgeType::FirstPost, MetricSource::PostCount, 1),
    BadgeRule::at_least(BadgeType::Post10, MetricSource::PostCount, 10),
    BadgeRule::at_least(BadgeType::Post50, MetricSource::PostCount, 50),
    BadgeRule::at_least(BadgeType::Post100, MetricSource::PostCount, 100),
    BadgeRule::at_least(BadgeType::FirstComment, MetricSource::CommentCount, 1),
    BadgeRule::at_least(BadgeType::Comment10, MetricSource::CommentCount, 10),
    BadgeRule::at_least(BadgeType::Comment50, MetricSource::CommentCount, 50),
    BadgeRule::at_least(BadgeType::Comment100, MetricSource::CommentCount, 100),
    BadgeRule::at_least(BadgeType::LikeReceived10, MetricSource::LikesReceived, 10),
    BadgeRule::at_least(BadgeType::LikeReceived50, MetricSource::LikesReceived, 50),
    BadgeRule::at_least(BadgeType::LikeReceived100, MetricSource::LikesReceived, 100),
    BadgeRule::at_least(BadgeType::Level5, MetricSource::Level, 5),
    BadgeRule::at_least(BadgeType::Level10, MetricSource::Level, 10),
    BadgeRule::at_least(BadgeType::Level20, MetricSource::Level, 20),
    BadgeRule::at_least(BadgeType::Level50, MetricSource::Level, 50),
    BadgeRule::at_least(BadgeType::Streak7, MetricSource::LoginStreak, 7),
    BadgeRule::at_least(BadgeType::Streak30, MetricSource::LoginStreak, 30),
];

/// 徽章目录
#[derive(Debug, Clone)]
pub struct BadgeCatalog {
    rules: Vec<BadgeRule>,
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self::standard(DEFAULT_EARLY_ADOPTER_LIMIT)
    }
}

impl BadgeCatalog {
    /// 标准目录；early_adopter_limit <= 0 时不设早期用户徽章
    pub fn standard(early_adopter_limit: i64) -> Self {
        let mut rules = TIERED_RULES.to_vec();
        if early_adopter_limit > 0 {
            rules.push(BadgeRule {
                badge_type: BadgeType::EarlyAdopter,
                metric: MetricSource::SignupCohort,
                threshold: early_adopter_limit,
                comparison: Comparison::AtMost,
            });
        }
        rules.sort_by_key(|rule| (rule.metric.as_str(), rule.threshold));
        Self { rules }
    }

    /// 某个指标下的全部规则（阈值升序）
    pub fn rules_for(&self, metric: MetricSource) -> impl Iterator<Item = &BadgeRule> {
        self.rules.iter().filter(move |rule| rule.metric == metric)
    }

    /// 当前指标值满足的全部档位
    ///
    /// 返回所有已达到的档位而不只是最高档，用户可能一次跳过多个档位
    pub fn tiers_reached(&self, metric: MetricSource, observed: i64) -> Vec<BadgeRule> {
        self.rules_for(metric)
            .filter(|rule| rule.is_satisfied(observed))
            .copied()
            .collect()
    }

    pub fn rule(&self, badge_type: BadgeType) -> Option<&BadgeRule> {
        self.rules.iter().find(|rule| rule.badge_type == badge_type)
    }
}
