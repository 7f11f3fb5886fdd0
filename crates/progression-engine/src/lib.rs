//! 经验、等级与徽章进度引擎
//!
//! 社区用户的成长体系：发帖、评论、被点赞、登录等行为获得经验，
//! 经验累计决定等级，达到指标阈值解锁徽章。
//!
//! ## 核心功能
//!
//! - **经验流水**：只追加的带符号流水是累计经验的唯一事实来源
//! - **幂等发放**：(用户, 动作, 目标) 唯一，重复请求返回去重结果而不是错误
//! - **等级计算**：版本化的单调阈值曲线
//! - **徽章评估**：声明式阈值目录，跳档时补发所有已达到的档位
//! - **连续登录**：按参考时区切分自然日的连续登录状态机
//! - **缓存修复**：从流水重算缓存的累计经验与等级
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `catalog`: 动作表与徽章目录
//! - `level`: 等级曲线
//! - `calendar`: 参考时区自然日
//! - `repository`: 存储层（PostgreSQL / 内存）
//! - `service`: 发放、评估、登录、查询服务
//! - `engine`: 面向协作方的门面
//! - `config`: 引擎配置

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod level;
pub mod models;
pub mod repository;
pub mod service;

pub use calendar::DayReference;
pub use catalog::{ActionRule, ActionTable, BadgeCatalog, BadgeRule, Comparison};
pub use config::ProgressionConfig;
pub use engine::ProgressionEngine;
pub use error::{ProgressionError, Result};
pub use level::LevelCurve;
pub use models::*;
pub use repository::{
    ActivityCounts, BadgeStore, LedgerStore, LoginStreakStore, MemoryProgressionRepository,
    PgProgressionRepository, ProgressionRepository,
};
pub use service::{
    ActivityOutcome, AwardCoordinator, AwardMetadata, AwardResult, BadgeEvaluator, LoginResult,
    LoginStreakTracker, ProgressQueryService, SkipReason, dto,
};
