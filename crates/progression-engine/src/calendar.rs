//! 自然日计算
//!
//! 每日登录和连续登录都按同一个参考时区切日，不使用请求方本地时钟。

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::{ProgressionError, Result};

/// 参考时区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayReference {
    offset: FixedOffset,
}

impl Default for DayReference {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayReference {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// 以相对 UTC 的分钟偏移构造，如 KST 为 540
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ProgressionError::Validation(format!("无效的参考时区偏移: {} 分钟", minutes))
            })?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// 时间点在参考时区下所属的自然日
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}
