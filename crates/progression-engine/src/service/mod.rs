//! 服务层
//!
//! 协调仓储、动作表、徽章目录和等级曲线，实现发放与评估流程。
//!
//! ## 模块结构
//!
//! - `dto`: 请求与结果结构
//! - `award_service`: 经验发放协调器
//! - `badge_evaluator`: 徽章评估
//! - `streak_service`: 连续登录跟踪
//! - `query_service`: 进度查询与缓存修复

pub mod award_service;
pub mod badge_evaluator;
pub mod dto;
pub mod query_service;
pub mod streak_service;

pub use award_service::{AwardCoordinator, ONCE_TARGET_REF};
pub use badge_evaluator::BadgeEvaluator;
pub use dto::*;
pub use query_service::{MAX_LEDGER_PAGE, ProgressQueryService};
pub use streak_service::LoginStreakTracker;
