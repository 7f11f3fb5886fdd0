//! 经验发放流程集成测试
//!
//! 使用内存存储，覆盖发放、去重、撤回、升级连锁和缓存修复

mod common;

use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use common::{harness, harness_with, harness_without_bonus};
use progression_engine::{
    ActionType, AwardMetadata, BadgeType, LedgerStore, LevelCurve, ProgressionConfig,
    ProgressionEngine, ProgressionError, SkipReason,
};
use progression_shared::test_utils::{test_entity_id, test_user_id};

#[tokio::test]
async fn test_three_posts_level_up_on_third() {
    let h = harness_without_bonus();
    let user = test_user_id();

    let mut level_ups = Vec::new();
    for _ in 0..3 {
        let outcome = h
            .engine
            .award(
                &user,
                ActionType::PostCreate,
                &AwardMetadata::target(test_entity_id("post")),
            )
            .await
            .unwrap();
        level_ups.push(outcome.award.unwrap().leveled_up);
    }

    assert_eq!(level_ups, vec![false, false, true]);
    let view = h.engine.level_progress(&user).await.unwrap();
    assert_eq!(view.current_experience, 30);
    assert_eq!(view.current_level, 2);
}

#[tokio::test]
async fn test_second_comment_on_same_post_deduplicated() {
    let h = harness_without_bonus();
    let user = test_user_id();
    let post = test_entity_id("post");

    let first = h.engine.on_comment_created(&user, &post).await;
    let second = h.engine.on_comment_created(&user, &post).await;

    let first = first.award.unwrap();
    let second = second.award.unwrap();
    assert!(!first.deduplicated);
    assert!(second.deduplicated);
    assert_eq!(second.skip_reason, Some(SkipReason::AlreadyAwarded));
    assert_eq!(first.new_total, 5);
    assert_eq!(second.new_total, 5);
}

#[tokio::test]
async fn test_create_then_delete_restores_total() {
    let h = harness_without_bonus();
    let user = test_user_id();
    let post = test_entity_id("post");

    h.engine
        .award(&user, ActionType::ProfileComplete, &AwardMetadata::none())
        .await
        .unwrap();
    let before = h.engine.level_progress(&user).await.unwrap().current_experience;

    let created = h.engine.on_post_created(&user, &post).await.award.unwrap();
    let deleted = h.engine.on_post_deleted(&user, &post).await.award.unwrap();
    assert!(!created.deduplicated);
    assert!(!deleted.deduplicated);
    assert_eq!(deleted.new_total, before);

    let again = h.engine.on_post_deleted(&user, &post).await.award.unwrap();
    assert!(again.deduplicated);
    assert_eq!(again.new_total, before);
}

#[tokio::test]
async fn test_overridden_create_then_delete_nets_zero() {
    let config = ProgressionConfig {
        achievement_bonus: 0,
        points: HashMap::from([("post_create".to_string(), 15)]),
        ..Default::default()
    };
    let h = harness_with(&config);
    let user = test_user_id();

    let created = h.engine.on_post_created(&user, "p1").await.award.unwrap();
    let deleted = h.engine.on_post_deleted(&user, "p1").await.award.unwrap();

    assert_eq!(created.delta, 15);
    assert_eq!(deleted.delta, -15);
    assert_eq!(deleted.new_total, 0);
    assert_eq!(h.repo.sum_for(&user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_reverses_value_granted_before_table_change() {
    // 创建时 POST_CREATE 为 5，删除时已恢复默认的 10
    let old = harness_with(&ProgressionConfig {
        achievement_bonus: 0,
        points: HashMap::from([("post_create".to_string(), 5)]),
        ..Default::default()
    });
    let user = test_user_id();
    old.engine.on_post_created(&user, "p1").await;

    let current = ProgressionEngine::new(
        old.repo.clone(),
        old.counts.clone(),
        &ProgressionConfig {
            achievement_bonus: 0,
            ..Default::default()
        },
    )
    .unwrap();
    let deleted = current.on_post_deleted(&user, "p1").await.award.unwrap();

    assert_eq!(deleted.delta, -5);
    assert_eq!(deleted.new_total, 0);
    assert_eq!(old.repo.sum_for(&user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_without_create_is_noop() {
    let h = harness_without_bonus();
    let user = test_user_id();

    let outcome = h
        .engine
        .award(
            &user,
            ActionType::CommentDelete,
            &AwardMetadata::target("never-commented"),
        )
        .await
        .unwrap();

    let award = outcome.award.unwrap();
    assert_eq!(award.skip_reason, Some(SkipReason::ReversedNothing));
    assert_eq!(h.repo.sum_for(&user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deletion_lowers_level_but_not_below_one() {
    let h = harness_without_bonus();
    let user = test_user_id();

    for post in ["a", "b", "c"] {
        h.engine.on_post_created(&user, post).await;
    }
    assert_eq!(h.engine.level_progress(&user).await.unwrap().current_level, 2);

    let outcome = h.engine.on_post_deleted(&user, "a").await;
    let award = outcome.award.unwrap();
    assert!(award.leveled_up);
    assert_eq!(award.new_level, 1);
    assert_eq!(award.new_total, 20);
}

#[tokio::test]
async fn test_validation_errors_leave_no_trace() {
    let h = harness_without_bonus();
    let user = test_user_id();

    let err = h
        .engine
        .award(&user, ActionType::PostCreate, &AwardMetadata::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::MissingTarget(ActionType::PostCreate)));

    let err = h
        .engine
        .award_named(&user, "SHARE_POST", &AwardMetadata::target("p1"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_ACTION");

    assert!(h.engine.recent_ledger(&user, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_daily_login_only_through_login_hook() {
    let h = harness_without_bonus();
    let user = test_user_id();
    let backdated = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

    let err = h
        .engine
        .award(
            &user,
            ActionType::DailyLogin,
            &AwardMetadata::none().at(backdated),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = h
        .engine
        .award_named(&user, "ACHIEVEMENT_UNLOCKED", &AwardMetadata::target("POST_10"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(h.repo.sum_for(&user).await.unwrap(), 0);
    assert_eq!(h.engine.login_streak(&user).await.unwrap().consecutive_days, 0);

    let login = h.engine.on_login(&user, backdated).await.unwrap();
    assert!(!login.daily_award.unwrap().deduplicated);
    assert_eq!(h.repo.sum_for(&user).await.unwrap(), 5);
}

#[tokio::test]
async fn test_received_like_alias() {
    let h = harness_without_bonus();
    let user = test_user_id();

    let outcome = h
        .engine
        .award_named(&user, "received_like", &AwardMetadata::target("like-1"))
        .await
        .unwrap();
    let award = outcome.award.unwrap();
    assert_eq!(award.action, ActionType::LikeReceived);
    assert_eq!(award.delta, 2);
}

#[tokio::test]
async fn test_best_effort_hides_validation_failure() {
    let h = harness_without_bonus();
    let outcome = h
        .engine
        .award_best_effort("u1", ActionType::LikeReceived, &AwardMetadata::none())
        .await;
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_profile_complete_only_once() {
    let h = harness_without_bonus();
    let user = test_user_id();

    let first = h.engine.on_profile_completed(&user).await.award.unwrap();
    let second = h.engine.on_profile_completed(&user).await.award.unwrap();
    assert_eq!(first.new_total, 30);
    assert!(second.deduplicated);
}

#[tokio::test]
async fn test_partner_activity_per_partner() {
    let h = harness_without_bonus();
    let user = test_user_id();

    h.engine
        .on_partner_activity(&user, ActionType::PartnerRating, "partner-1")
        .await;
    h.engine
        .on_partner_activity(&user, ActionType::PartnerRating, "partner-1")
        .await;
    h.engine
        .on_partner_activity(&user, ActionType::PartnerLike, "partner-1")
        .await;
    h.engine
        .on_partner_activity(&user, ActionType::PartnerComment, "partner-2")
        .await;
    let ignored = h
        .engine
        .on_partner_activity(&user, ActionType::PostCreate, "partner-3")
        .await;

    assert!(ignored.is_empty());
    assert_eq!(h.repo.sum_for(&user).await.unwrap(), 5 + 1 + 3);
}

#[tokio::test]
async fn test_level_up_unlocks_level_badge_and_bonus() {
    let h = harness();
    let user = test_user_id();

    // LEVEL_5 需要 160 经验
    for i in 0..16 {
        h.engine.on_post_created(&user, &format!("post-{}", i)).await;
    }

    assert!(h.engine.has_badge(&user, BadgeType::Level5).await.unwrap());

    let ledger = h.engine.recent_ledger(&user, 100).await.unwrap();
    let bonuses: Vec<_> = ledger
        .iter()
        .filter(|entry| entry.action_type == ActionType::AchievementUnlocked)
        .collect();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].target_ref, "LEVEL_5");

    let view = h.engine.level_progress(&user).await.unwrap();
    assert_eq!(view.current_experience, 160 + 20);
    assert_eq!(view.current_experience, h.repo.sum_for(&user).await.unwrap());
}

#[tokio::test]
async fn test_cache_matches_ledger_after_mixed_activity() {
    let h = harness();
    let user = test_user_id();
    h.counts.set_posts(&user, 1);
    h.counts.set_comments(&user, 1);

    h.engine.on_post_created(&user, "p1").await;
    h.engine.on_comment_created(&user, "p1").await;
    h.engine.on_like_received(&user, "like-1").await;
    h.engine.on_like_received(&user, "like-1").await;
    h.engine.on_comment_deleted(&user, "p1").await;
    h.engine.on_profile_completed(&user).await;

    let outcome = h.engine.rebuild_progress(&user).await.unwrap();
    assert!(!outcome.drift_corrected());
    assert_eq!(
        outcome.progress.total_experience,
        h.repo.sum_for(&user).await.unwrap()
    );

    // FIRST_POST 与 FIRST_COMMENT 各奖励 20
    assert_eq!(outcome.progress.total_experience, 10 + 5 + 2 - 5 + 30 + 40);
}

#[tokio::test]
async fn test_rebuild_after_curve_change_grants_level_badges() {
    // 旧曲线把等级封顶在 1 级
    let capped = harness_with(&ProgressionConfig {
        achievement_bonus: 0,
        level_curve: LevelCurve {
            max_level: 1,
            ..LevelCurve::v1()
        },
        ..Default::default()
    });
    let user = test_user_id();
    for i in 0..16 {
        capped
            .engine
            .award(
                &user,
                ActionType::PostCreate,
                &AwardMetadata::target(format!("post-{}", i)),
            )
            .await
            .unwrap();
    }
    assert_eq!(capped.repo.get_progress(&user).await.unwrap().unwrap().level, 1);

    let current = ProgressionEngine::new(
        capped.repo.clone(),
        capped.counts.clone(),
        &ProgressionConfig {
            achievement_bonus: 0,
            ..Default::default()
        },
    )
    .unwrap();

    // 视图按当前曲线推导，重建前缓存仍是旧等级
    assert_eq!(current.level_progress(&user).await.unwrap().current_level, 5);
    assert!(!current.has_badge(&user, BadgeType::Level5).await.unwrap());

    let outcome = current.rebuild_progress(&user).await.unwrap();
    assert_eq!(outcome.previous_level, 1);
    assert_eq!(outcome.progress.level, 5);
    assert!(current.has_badge(&user, BadgeType::Level5).await.unwrap());
}
