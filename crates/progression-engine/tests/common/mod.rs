//! 集成测试共用的协作方替身

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use progression_engine::{
    ActivityCounts, MemoryProgressionRepository, ProgressionConfig, ProgressionEngine, Result,
};

/// 宿主持久层的活动计数替身
#[derive(Debug, Default)]
pub struct FakeActivityCounts {
    posts: DashMap<String, i64>,
    comments: DashMap<String, i64>,
    likes: DashMap<String, i64>,
    total_users: AtomicI64,
}

impl FakeActivityCounts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_posts(&self, user_id: &str, count: i64) {
        self.posts.insert(user_id.to_string(), count);
    }

    pub fn set_comments(&self, user_id: &str, count: i64) {
        self.comments.insert(user_id.to_string(), count);
    }

    pub fn set_likes(&self, user_id: &str, count: i64) {
        self.likes.insert(user_id.to_string(), count);
    }

    /// 模拟一次注册，返回注册后的用户总数
    pub fn register_user(&self) -> i64 {
        self.total_users.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_total_users(&self, total: i64) {
        self.total_users.store(total, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActivityCounts for FakeActivityCounts {
    async fn post_count(&self, user_id: &str) -> Result<i64> {
        Ok(self.posts.get(user_id).map_or(0, |count| *count))
    }

    async fn comment_count(&self, user_id: &str) -> Result<i64> {
        Ok(self.comments.get(user_id).map_or(0, |count| *count))
    }

    async fn likes_received(&self, user_id: &str) -> Result<i64> {
        Ok(self.likes.get(user_id).map_or(0, |count| *count))
    }

    async fn total_users(&self) -> Result<i64> {
        Ok(self.total_users.load(Ordering::SeqCst))
    }
}

pub struct TestHarness {
    pub engine: Arc<ProgressionEngine>,
    pub repo: Arc<MemoryProgressionRepository>,
    pub counts: Arc<FakeActivityCounts>,
}

/// 内存存储 + 默认配置
pub fn harness() -> TestHarness {
    harness_with(&ProgressionConfig::default())
}

pub fn harness_with(config: &ProgressionConfig) -> TestHarness {
    progression_shared::observability::tracing::init_for_tests();

    let repo = Arc::new(MemoryProgressionRepository::new());
    let counts = FakeActivityCounts::new();
    let engine = ProgressionEngine::new(repo.clone(), counts.clone(), config)
        .expect("测试配置必须合法");
    TestHarness {
        engine: Arc::new(engine),
        repo,
        counts,
    }
}

/// 不发放成就奖励，便于精确断言经验值
pub fn harness_without_bonus() -> TestHarness {
    harness_with(&ProgressionConfig {
        achievement_bonus: 0,
        ..Default::default()
    })
}
