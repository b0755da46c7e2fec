//! Storage seam for the progress service.
//!
//! Components receive an `Arc<dyn Store>` at construction instead of reaching
//! for a global client. [`PgStore`] is the production backend; [`MemoryStore`]
//! keeps everything in-process and backs the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Course, CourseModule, EnrolledStudent, ModuleProgress, ModuleProgressUpdate, ModuleResource,
    NewModule, NewResource, ResourceProgress, ResourceProgressUpdate,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // --- courses & enrollment (owned by the platform, read-only here) ---

    async fn find_course(&self, id: Uuid) -> AppResult<Option<Course>>;

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool>;

    /// Enrolled students of a course ordered by display name.
    async fn enrolled_students(&self, course_id: Uuid) -> AppResult<Vec<EnrolledStudent>>;

    // --- modules ---

    async fn find_module(&self, id: Uuid) -> AppResult<Option<CourseModule>>;

    /// Modules of a course ordered by position.
    async fn list_modules(&self, course_id: Uuid) -> AppResult<Vec<CourseModule>>;

    async fn count_modules(&self, course_id: Uuid) -> AppResult<i64>;

    async fn insert_module(&self, new: &NewModule, now: DateTime<Utc>) -> AppResult<CourseModule>;

    /// Overwrite every mutable column of an existing module.
    async fn save_module(&self, module: &CourseModule) -> AppResult<CourseModule>;

    /// Remove a module, its resources and every progress row hanging off
    /// them, all or nothing. Returns `false` if the module did not exist.
    async fn delete_module(&self, id: Uuid) -> AppResult<bool>;

    // --- resources ---

    async fn find_resource(&self, id: Uuid) -> AppResult<Option<ModuleResource>>;

    /// Resources of the given modules ordered by position within each module.
    async fn list_resources(&self, module_ids: &[Uuid]) -> AppResult<Vec<ModuleResource>>;

    async fn insert_resource(
        &self,
        new: &NewResource,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleResource>;

    async fn save_resource(&self, resource: &ModuleResource) -> AppResult<ModuleResource>;

    /// Remove a resource and its progress rows atomically.
    async fn delete_resource(&self, id: Uuid) -> AppResult<bool>;

    // --- progress ---

    async fn resource_progress_for(
        &self,
        user_id: Uuid,
        resource_ids: &[Uuid],
    ) -> AppResult<Vec<ResourceProgress>>;

    async fn module_progress_for(
        &self,
        user_id: Uuid,
        module_ids: &[Uuid],
    ) -> AppResult<Vec<ModuleProgress>>;

    /// Atomic insert-or-merge on the `(user_id, resource_id)` pair.
    async fn upsert_resource_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        update: &ResourceProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ResourceProgress>;

    /// Atomic insert-or-merge on the `(user_id, module_id)` pair.
    async fn upsert_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        update: &ModuleProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleProgress>;

    /// Per-user count of completed modules within a course.
    async fn completed_module_counts(&self, course_id: Uuid) -> AppResult<Vec<(Uuid, i64)>>;
}
