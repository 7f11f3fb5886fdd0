//! 配置表
//!
//! 动作表和徽章目录都是声明式数据：新增动作或徽章只需要加一行配置，
//! 不需要改发放或评估流程。

mod actions;
mod badges;

pub use actions::{ActionRule, ActionTable, DEFAULT_ACHIEVEMENT_BONUS};
pub use badges::{BadgeCatalog, BadgeRule, Comparison, DEFAULT_EARLY_ADOPTER_LIMIT};
