//! 经验发放协调器
//!
//! 发放流程：
//! 1. 查动作表 -> 2. 解析幂等键 target_ref -> 3. 原子写入流水并更新缓存
//!    -> 4. 报告是否升级
//!
//! 重复发放、撤回不存在的奖励都返回去重结果而不是错误，调用方无需预先检查。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use progression_shared::observability::metrics as progression_metrics;

use crate::calendar::DayReference;
use crate::catalog::{ActionRule, ActionTable};
use crate::error::{ProgressionError, Result};
use crate::level::LevelCurve;
use crate::models::{ActionType, ApplyOutcome, IdempotencyScope, LedgerWrite, NewLedgerEntry};
use crate::repository::LedgerStore;
use crate::service::dto::{AwardMetadata, AwardResult, SkipReason};

/// 每个用户只能发放一次的动作使用的固定 target_ref
pub const ONCE_TARGET_REF: &str = "once";

/// 经验发放协调器
pub struct AwardCoordinator {
    store: Arc<dyn LedgerStore>,
    actions: ActionTable,
    curve: LevelCurve,
    calendar: DayReference,
}

impl AwardCoordinator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        actions: ActionTable,
        curve: LevelCurve,
        calendar: DayReference,
    ) -> Self {
        Self {
            store,
            actions,
            curve,
            calendar,
        }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    /// 按动作名发放，名称无法识别时返回 UnknownAction
    pub async fn award_named(
        &self,
        user_id: &str,
        action: &str,
        metadata: &AwardMetadata,
    ) -> Result<AwardResult> {
        let action = action.parse::<ActionType>()?;
        self.award(user_id, action, metadata).await
    }

    /// 发放经验
    ///
    /// 校验失败时不产生任何状态变化；存储失败时整次发放回滚
    #[instrument(skip(self, metadata), fields(user_id = %user_id, action = %action))]
    pub async fn award(
        &self,
        user_id: &str,
        action: ActionType,
        metadata: &AwardMetadata,
    ) -> Result<AwardResult> {
        let start = Instant::now();

        let outcome = self.try_award(user_id, action, metadata).await;

        let label = match &outcome {
            Ok(result) => result.skip_reason.map_or("applied", |reason| reason.as_str()),
            Err(e) if e.is_validation() => "rejected",
            Err(_) => "error",
        };
        progression_metrics::record_award(
            action.as_str(),
            label,
            start.elapsed().as_secs_f64(),
        );

        outcome
    }

    /// 作为主操作副作用的发放：失败只记录日志，不向上传播
    pub async fn award_best_effort(
        &self,
        user_id: &str,
        action: ActionType,
        metadata: &AwardMetadata,
    ) -> Option<AwardResult> {
        match self.award(user_id, action, metadata).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(
                    user_id = %user_id,
                    action = %action,
                    error_code = e.error_code(),
                    error = %e,
                    "经验发放失败，已忽略"
                );
                None
            }
        }
    }

    async fn try_award(
        &self,
        user_id: &str,
        action: ActionType,
        metadata: &AwardMetadata,
    ) -> Result<AwardResult> {
        if user_id.trim().is_empty() {
            return Err(ProgressionError::Validation("user_id 不能为空".to_string()));
        }

        let rule = self.actions.rule(action)?;
        let target_ref = self.resolve_target(rule, metadata)?;

        let write = LedgerWrite {
            entry: NewLedgerEntry::new(user_id, action, rule.delta, target_ref),
            requires_prior: rule.reverses,
        };

        let skip_reason = match self.store.apply_award(&write, &self.curve).await? {
            ApplyOutcome::Applied(applied) => {
                let result = AwardResult::applied(&applied);
                info!(
                    user_id = %user_id,
                    action = %action,
                    delta = result.delta,
                    new_total = result.new_total,
                    "经验已发放"
                );
                if result.leveled_up {
                    info!(
                        user_id = %user_id,
                        previous_level = result.previous_level,
                        new_level = result.new_level,
                        "用户等级变化"
                    );
                    if result.level_increased() {
                        progression_metrics::record_level_up(result.new_level);
                    }
                }
                return Ok(result);
            }
            ApplyOutcome::Duplicate => SkipReason::AlreadyAwarded,
            ApplyOutcome::MissingPrior => SkipReason::ReversedNothing,
        };

        debug!(
            user_id = %user_id,
            action = %action,
            target_ref = %write.entry.target_ref,
            reason = skip_reason.as_str(),
            "未写入流水"
        );

        let current = self.store.get_progress(user_id).await?;
        Ok(AwardResult::skipped(
            user_id,
            action,
            write.entry.target_ref,
            current,
            skip_reason,
        ))
    }

    /// 按幂等范围解析 target_ref
    fn resolve_target(&self, rule: &ActionRule, metadata: &AwardMetadata) -> Result<String> {
        match rule.scope {
            IdempotencyScope::Target | IdempotencyScope::Event => metadata
                .target_ref
                .as_deref()
                .map(str::trim)
                .filter(|target| !target.is_empty())
                .map(str::to_string)
                .ok_or(ProgressionError::MissingTarget(rule.action)),
            IdempotencyScope::Daily => {
                let at = metadata.occurred_at.unwrap_or_else(Utc::now);
                Ok(self.calendar.day_of(at).format("%Y-%m-%d").to_string())
            }
            IdempotencyScope::Once => Ok(ONCE_TARGET_REF.to_string()),
        }
    }
}
