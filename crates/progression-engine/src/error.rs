//! 进度引擎错误类型
//!
//! 区分调用方可修正的校验错误和存储层的系统错误。
//! 重复发放不是错误，由服务层返回去重结果。

use thiserror::Error;

use crate::models::ActionType;

/// 进度引擎错误类型
#[derive(Debug, Error)]
pub enum ProgressionError {
    // === 校验错误 ===
    #[error("未知的经验动作类型: {0}")]
    UnknownAction(String),

    #[error("动作缺少目标引用: action={0}")]
    MissingTarget(ActionType),

    #[error("动作未启用: action={0}")]
    ActionDisabled(ActionType),

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("基础设施错误: {0}")]
    Shared(#[from] progression_shared::error::SharedError),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 进度引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, ProgressionError>;

impl ProgressionError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Shared(e) => e.is_retryable(),
            _ => matches!(
                self,
                Self::Database(_) | Self::Storage(_) | Self::ConcurrencyConflict
            ),
        }
    }

    /// 检查是否为调用方参数问题
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction(_)
                | Self::MissingTarget(_)
                | Self::ActionDisabled(_)
                | Self::Validation(_)
        )
    }

    /// 获取错误码（用于日志和上层响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::MissingTarget(_) => "MISSING_TARGET",
            Self::ActionDisabled(_) => "ACTION_DISABLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Shared(e) => e.code(),
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}
