//! Progress Recorder: per-user completion state for resources and modules.
//!
//! Both kinds of row are upserted on their `(user, target)` pair. Module
//! completion is asserted by the caller and is never derived from the
//! resource rows underneath it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::guard::AccessGuard;
use crate::models::{
    ModuleProgress, ModuleProgressReq, ModuleProgressUpdate, ResourceProgress,
    ResourceProgressReq, ResourceProgressUpdate,
};
use crate::store::Store;

/// Clamp a caller-supplied percentage into `0..=100`, rounding to an integer.
pub fn clamp_percent(value: f64) -> AppResult<i32> {
    if value.is_nan() {
        return Err(AppError::Validation("progress must be a number".into()));
    }
    Ok(value.clamp(0.0, 100.0).round() as i32)
}

impl ResourceProgressReq {
    pub fn into_update(self) -> AppResult<ResourceProgressUpdate> {
        let time_spent_secs = self.time_spent_seconds.unwrap_or(0);
        if time_spent_secs < 0 {
            return Err(AppError::Validation(
                "timeSpentSeconds must not be negative".into(),
            ));
        }
        Ok(ResourceProgressUpdate {
            is_completed: self.is_completed,
            progress: self.progress.map(clamp_percent).transpose()?,
            viewed_at: self.viewed_at,
            time_spent_secs,
        })
    }
}

impl ModuleProgressReq {
    pub fn into_update(self) -> AppResult<ModuleProgressUpdate> {
        Ok(ModuleProgressUpdate {
            is_completed: self.is_completed,
            progress: self.progress.map(clamp_percent).transpose()?,
            completed_at: self.completed_at,
        })
    }
}

// Completing without an explicit percentage means 100.
fn effective_percent(is_completed: Option<bool>, progress: Option<i32>) -> Option<i32> {
    progress.or(match is_completed {
        Some(true) => Some(100),
        _ => None,
    })
}

/// Next completion timestamp given the stored one and the asserted flag.
///
/// Re-asserting completion keeps the first timestamp; un-completing clears it.
fn next_completed_at(
    current: Option<DateTime<Utc>>,
    is_completed: Option<bool>,
    stamp: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match is_completed {
        None => current,
        Some(true) => current.or(Some(stamp)),
        Some(false) => None,
    }
}

pub fn new_resource_progress(
    user_id: Uuid,
    resource_id: Uuid,
    update: &ResourceProgressUpdate,
    now: DateTime<Utc>,
) -> ResourceProgress {
    ResourceProgress {
        id: Uuid::new_v4(),
        user_id,
        resource_id,
        is_completed: update.is_completed.unwrap_or(false),
        progress: effective_percent(update.is_completed, update.progress).unwrap_or(0),
        viewed_at: Some(update.viewed_at.unwrap_or(now)),
        completed_at: next_completed_at(None, update.is_completed, now),
        time_spent_secs: update.time_spent_secs,
        created_at: now,
        updated_at: now,
    }
}

/// Fold `update` into an existing row. Fails without touching the row when
/// the accumulated time would overflow.
pub fn merge_resource_progress(
    row: &mut ResourceProgress,
    update: &ResourceProgressUpdate,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let time_spent_secs = row
        .time_spent_secs
        .checked_add(update.time_spent_secs)
        .ok_or_else(|| AppError::Validation("timeSpentSeconds is out of range".into()))?;

    if let Some(done) = update.is_completed {
        row.is_completed = done;
    }
    if let Some(percent) = effective_percent(update.is_completed, update.progress) {
        row.progress = percent;
    }
    if row.viewed_at.is_none() {
        row.viewed_at = Some(update.viewed_at.unwrap_or(now));
    }
    row.completed_at = next_completed_at(row.completed_at, update.is_completed, now);
    row.time_spent_secs = time_spent_secs;
    row.updated_at = now;
    Ok(())
}

pub fn new_module_progress(
    user_id: Uuid,
    module_id: Uuid,
    update: &ModuleProgressUpdate,
    now: DateTime<Utc>,
) -> ModuleProgress {
    ModuleProgress {
        id: Uuid::new_v4(),
        user_id,
        module_id,
        is_completed: update.is_completed.unwrap_or(false),
        progress: effective_percent(update.is_completed, update.progress).unwrap_or(0),
        started_at: now,
        completed_at: next_completed_at(
            None,
            update.is_completed,
            update.completed_at.unwrap_or(now),
        ),
        created_at: now,
        updated_at: now,
    }
}

pub fn merge_module_progress(
    row: &mut ModuleProgress,
    update: &ModuleProgressUpdate,
    now: DateTime<Utc>,
) {
    if let Some(done) = update.is_completed {
        row.is_completed = done;
    }
    if let Some(percent) = effective_percent(update.is_completed, update.progress) {
        row.progress = percent;
    }
    row.completed_at = next_completed_at(
        row.completed_at,
        update.is_completed,
        update.completed_at.unwrap_or(now),
    );
    row.updated_at = now;
}

/// Records resource and module progress for the calling user.
#[derive(Clone)]
pub struct ProgressRecorder {
    store: Arc<dyn Store>,
    guard: AccessGuard,
}

impl ProgressRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = AccessGuard::new(store.clone());
        Self { store, guard }
    }

    pub async fn record_resource_progress(
        &self,
        caller: &Caller,
        resource_id: Uuid,
        req: ResourceProgressReq,
    ) -> AppResult<ResourceProgress> {
        self.guard.resource_for_read(caller, resource_id).await?;
        let update = req.into_update()?;

        let progress = self
            .store
            .upsert_resource_progress(caller.user_id, resource_id, &update, Utc::now())
            .await?;

        tracing::info!(
            user_id = %caller.user_id,
            resource_id = %resource_id,
            is_completed = progress.is_completed,
            progress = progress.progress,
            "Recorded resource progress"
        );
        Ok(progress)
    }

    pub async fn record_module_progress(
        &self,
        caller: &Caller,
        module_id: Uuid,
        req: ModuleProgressReq,
    ) -> AppResult<ModuleProgress> {
        self.guard.module_for_read(caller, module_id).await?;
        let update = req.into_update()?;

        let progress = self
            .store
            .upsert_module_progress(caller.user_id, module_id, &update, Utc::now())
            .await?;

        tracing::info!(
            user_id = %caller.user_id,
            module_id = %module_id,
            is_completed = progress.is_completed,
            progress = progress.progress,
            "Recorded module progress"
        );
        Ok(progress)
    }
}
