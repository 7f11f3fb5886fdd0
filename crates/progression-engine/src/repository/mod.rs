//! 仓储层
//!
//! ## 设计原则
//!
//! - 服务层依赖 trait，存储实现可替换
//! - 流水写入和缓存更新在同一个存储原子操作内完成，由仓储保证
//! - 幂等键 (user_id, action_type, target_ref) 和 (user_id, badge_type) 由存储唯一约束兜底
//! - 同一用户的读-改-写通过行锁（Postgres）或分片锁（内存）串行化

mod memory_repo;
mod pg_repo;
mod traits;

pub use memory_repo::MemoryProgressionRepository;
pub use pg_repo::PgProgressionRepository;
pub use traits::*;
