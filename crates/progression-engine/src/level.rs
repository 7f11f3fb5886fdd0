//! 等级计算
//!
//! 纯函数：累计经验 -> 等级 / 升级进度。
//!
//! 曲线 v1：`threshold(L) = quadratic·(L-1)² + linear·(L-1)`，默认系数 5 / 20，
//! 即 0, 25, 60, 105, 160, ...。曲线是版本化常量，修改系数会让同一份流水
//! 推导出不同等级，必须同时提升 version 并对存量用户执行重建。

use serde::{Deserialize, Serialize};

use crate::error::{ProgressionError, Result};
use crate::models::LevelProgress;

pub const CURVE_VERSION_V1: u32 = 1;

/// 等级阈值曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCurve {
    pub version: u32,
    pub quadratic: i64,
    pub linear: i64,
    pub max_level: i32,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::v1()
    }
}

impl LevelCurve {
    pub const fn v1() -> Self {
        Self {
            version: CURVE_VERSION_V1,
            quadratic: 5,
            linear: 20,
            max_level: 100,
        }
    }

    /// 校验曲线严格递增，且 max_level 的阈值不会饱和
    pub fn validate(&self) -> Result<()> {
        if self.quadratic < 0 || self.linear < 0 {
            return Err(ProgressionError::Validation(
                "等级曲线系数不能为负".to_string(),
            ));
        }
        if self.quadratic == 0 && self.linear == 0 {
            return Err(ProgressionError::Validation(
                "等级曲线系数不能全为 0".to_string(),
            ));
        }
        if self.max_level < 1 {
            return Err(ProgressionError::Validation(format!(
                "最高等级必须 >= 1: {}",
                self.max_level
            )));
        }
        if self.checked_threshold(self.max_level).is_none() {
            return Err(ProgressionError::Validation(format!(
                "最高等级 {} 的经验阈值超出 i64 范围",
                self.max_level
            )));
        }
        Ok(())
    }

    /// 不饱和的阈值计算，溢出返回 None
    fn checked_threshold(&self, level: i32) -> Option<i64> {
        let n = i64::from(level.max(1) - 1);
        self.quadratic
            .checked_mul(n)?
            .checked_mul(n)?
            .checked_add(self.linear.checked_mul(n)?)
    }

    /// 达到 `level` 所需的最低累计经验
    ///
    /// 小于 1 的等级按 1 处理
    pub fn threshold_for(&self, level: i32) -> i64 {
        let n = i64::from(level.max(1) - 1);
        self.quadratic
            .saturating_mul(n)
            .saturating_mul(n)
            .saturating_add(self.linear.saturating_mul(n))
    }

    /// 满足 `total >= threshold(L)` 的最大等级，上限 max_level，下限 1
    pub fn level_of(&self, total_experience: i64) -> i32 {
        if total_experience <= 0 {
            return 1;
        }

        let (mut lo, mut hi) = (1, self.max_level.max(1));
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.threshold_for(mid) <= total_experience {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// 当前等级内的进度百分比，范围 [0, 100)，满级为 0
    pub fn progress(&self, total_experience: i64, level: i32) -> f64 {
        if level >= self.max_level {
            return 0.0;
        }
        let floor = self.threshold_for(level);
        let ceiling = self.threshold_for(level + 1);
        if total_experience <= floor {
            return 0.0;
        }

        let span = (ceiling - floor) as f64;
        let pct = ((total_experience - floor) as f64 * 1000.0 / span).floor() / 10.0;
        pct.clamp(0.0, 99.9)
    }

    /// 组装等级进度视图
    pub fn level_progress(&self, total_experience: i64) -> LevelProgress {
        let level = self.level_of(total_experience);
        let experience_for_next_level =
            (level < self.max_level).then(|| self.threshold_for(level + 1));

        LevelProgress {
            current_level: level,
            current_experience: total_experience,
            experience_for_next_level,
            progress_percentage: self.progress(total_experience, level),
        }
    }
}
