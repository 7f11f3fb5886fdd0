//! 基础设施错误
//!
//! 只覆盖连接池和配置加载，业务错误由各自的 crate 定义并通过 `#[from]` 包装。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 错误码，业务 crate 包装后沿用
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// 连接类错误可重试，配置错误需要人工修正
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let db_err = SharedError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(db_err.code(), "DATABASE_ERROR");
        assert!(db_err.is_retryable());

        let cfg_err = SharedError::Config(config::ConfigError::Message("bad".to_string()));
        assert_eq!(cfg_err.code(), "CONFIG_ERROR");
        assert!(!cfg_err.is_retryable());
    }
}
