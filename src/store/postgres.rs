use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Store;
use crate::db::Db;
use crate::error::AppResult;
use crate::models::{
    Course, CourseModule, EnrolledStudent, ModuleProgress, ModuleProgressUpdate, ModuleResource,
    NewModule, NewResource, ResourceProgress, ResourceProgressUpdate,
};

const COURSE_COLUMNS: &str = "id, code, title, description, instructor_id, schedule, location, \
    max_enrollment, start_date, end_date, created_at";

const MODULE_COLUMNS: &str =
    "id, course_id, title, description, position, is_published, created_at, updated_at";

const RESOURCE_COLUMNS: &str = "id, module_id, title, description, kind, content, duration, \
    position, is_published, created_at, updated_at";

const RESOURCE_PROGRESS_COLUMNS: &str = "id, user_id, resource_id, is_completed, progress, \
    viewed_at, completed_at, time_spent_secs, created_at, updated_at";

const MODULE_PROGRESS_COLUMNS: &str = "id, user_id, module_id, is_completed, progress, \
    started_at, completed_at, created_at, updated_at";

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_course(&self, id: Uuid) -> AppResult<Option<Course>> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        Ok(sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }

    async fn enrolled_students(&self, course_id: Uuid) -> AppResult<Vec<EnrolledStudent>> {
        Ok(sqlx::query_as::<_, EnrolledStudent>(
            "SELECT u.id AS user_id, u.name AS name
             FROM enrollments e
             JOIN users u ON u.id = e.user_id
             WHERE e.course_id = $1
             ORDER BY u.name, u.id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_module(&self, id: Uuid) -> AppResult<Option<CourseModule>> {
        let query = format!("SELECT {MODULE_COLUMNS} FROM course_modules WHERE id = $1");
        Ok(sqlx::query_as::<_, CourseModule>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_modules(&self, course_id: Uuid) -> AppResult<Vec<CourseModule>> {
        let query = format!(
            "SELECT {MODULE_COLUMNS} FROM course_modules
             WHERE course_id = $1
             ORDER BY position ASC"
        );
        Ok(sqlx::query_as::<_, CourseModule>(&query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_modules(&self, course_id: Uuid) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM course_modules WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn insert_module(&self, new: &NewModule, now: DateTime<Utc>) -> AppResult<CourseModule> {
        let mut tx = self.pool.begin().await?;

        // Appends read MAX(position); lock the course so two of them cannot
        // pick the same slot.
        sqlx::query("SELECT 1 FROM courses WHERE id = $1 FOR UPDATE")
            .bind(new.course_id)
            .execute(&mut *tx)
            .await?;

        // A missing position appends after the current last module.
        let query = format!(
            "INSERT INTO course_modules
                (id, course_id, title, description, position, is_published, created_at, updated_at)
             VALUES ($1, $2, $3, $4,
                     COALESCE($5, (SELECT COALESCE(MAX(position), 0) + 1
                                   FROM course_modules WHERE course_id = $2)),
                     $6, $7, $7)
             RETURNING {MODULE_COLUMNS}"
        );
        let module = sqlx::query_as::<_, CourseModule>(&query)
            .bind(Uuid::new_v4())
            .bind(new.course_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.order)
            .bind(new.is_published)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(module)
    }

    async fn save_module(&self, module: &CourseModule) -> AppResult<CourseModule> {
        let query = format!(
            "UPDATE course_modules
             SET title = $2, description = $3, position = $4, is_published = $5, updated_at = $6
             WHERE id = $1
             RETURNING {MODULE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, CourseModule>(&query)
            .bind(module.id)
            .bind(&module.title)
            .bind(&module.description)
            .bind(module.order)
            .bind(module.is_published)
            .bind(module.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_module(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM resource_progress
             WHERE resource_id IN (SELECT id FROM module_resources WHERE module_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM module_resources WHERE module_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM module_progress WHERE module_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM course_modules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_resource(&self, id: Uuid) -> AppResult<Option<ModuleResource>> {
        let query = format!("SELECT {RESOURCE_COLUMNS} FROM module_resources WHERE id = $1");
        Ok(sqlx::query_as::<_, ModuleResource>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_resources(&self, module_ids: &[Uuid]) -> AppResult<Vec<ModuleResource>> {
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {RESOURCE_COLUMNS} FROM module_resources
             WHERE module_id = ANY($1)
             ORDER BY module_id, position ASC, created_at ASC"
        );
        Ok(sqlx::query_as::<_, ModuleResource>(&query)
            .bind(module_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_resource(
        &self,
        new: &NewResource,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleResource> {
        let query = format!(
            "INSERT INTO module_resources
                (id, module_id, title, description, kind, content, duration, position,
                 is_published, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7,
                     COALESCE($8, (SELECT COALESCE(MAX(position), 0) + 1
                                   FROM module_resources WHERE module_id = $2)),
                     $9, $10, $10)
             RETURNING {RESOURCE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ModuleResource>(&query)
            .bind(Uuid::new_v4())
            .bind(new.module_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.kind)
            .bind(&new.content)
            .bind(new.duration)
            .bind(new.order)
            .bind(new.is_published)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn save_resource(&self, resource: &ModuleResource) -> AppResult<ModuleResource> {
        let query = format!(
            "UPDATE module_resources
             SET title = $2, description = $3, kind = $4, content = $5, duration = $6,
                 position = $7, is_published = $8, updated_at = $9
             WHERE id = $1
             RETURNING {RESOURCE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ModuleResource>(&query)
            .bind(resource.id)
            .bind(&resource.title)
            .bind(&resource.description)
            .bind(resource.kind)
            .bind(&resource.content)
            .bind(resource.duration)
            .bind(resource.order)
            .bind(resource.is_published)
            .bind(resource.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_resource(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM resource_progress WHERE resource_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM module_resources WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn resource_progress_for(
        &self,
        user_id: Uuid,
        resource_ids: &[Uuid],
    ) -> AppResult<Vec<ResourceProgress>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {RESOURCE_PROGRESS_COLUMNS} FROM resource_progress
             WHERE user_id = $1 AND resource_id = ANY($2)"
        );
        Ok(sqlx::query_as::<_, ResourceProgress>(&query)
            .bind(user_id)
            .bind(resource_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn module_progress_for(
        &self,
        user_id: Uuid,
        module_ids: &[Uuid],
    ) -> AppResult<Vec<ModuleProgress>> {
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {MODULE_PROGRESS_COLUMNS} FROM module_progress
             WHERE user_id = $1 AND module_id = ANY($2)"
        );
        Ok(sqlx::query_as::<_, ModuleProgress>(&query)
            .bind(user_id)
            .bind(module_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_resource_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        update: &ResourceProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ResourceProgress> {
        // Same rules as `progress::merge_resource_progress`, resolved by the
        // unique constraint so concurrent first writes cannot duplicate rows.
        let query = format!(
            "INSERT INTO resource_progress AS rp
                (id, user_id, resource_id, is_completed, progress, viewed_at, completed_at,
                 time_spent_secs, created_at, updated_at)
             VALUES ($1, $2, $3,
                     COALESCE($4, false),
                     COALESCE($5, CASE WHEN $4 THEN 100 ELSE 0 END),
                     COALESCE($6, $8),
                     CASE WHEN $4 THEN $8 END,
                     $7, $8, $8)
             ON CONFLICT (user_id, resource_id) DO UPDATE SET
                is_completed = COALESCE($4, rp.is_completed),
                progress = COALESCE($5, CASE WHEN $4 THEN 100 ELSE rp.progress END),
                viewed_at = COALESCE(rp.viewed_at, EXCLUDED.viewed_at),
                completed_at = CASE
                    WHEN $4 IS NULL THEN rp.completed_at
                    WHEN $4 THEN COALESCE(rp.completed_at, $8)
                    ELSE NULL
                END,
                time_spent_secs = rp.time_spent_secs + $7,
                updated_at = $8
             RETURNING {RESOURCE_PROGRESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ResourceProgress>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(resource_id)
            .bind(update.is_completed)
            .bind(update.progress)
            .bind(update.viewed_at)
            .bind(update.time_spent_secs)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn upsert_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        update: &ModuleProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleProgress> {
        let query = format!(
            "INSERT INTO module_progress AS mp
                (id, user_id, module_id, is_completed, progress, started_at, completed_at,
                 created_at, updated_at)
             VALUES ($1, $2, $3,
                     COALESCE($4, false),
                     COALESCE($5, CASE WHEN $4 THEN 100 ELSE 0 END),
                     $7,
                     CASE WHEN $4 THEN COALESCE($6, $7) END,
                     $7, $7)
             ON CONFLICT (user_id, module_id) DO UPDATE SET
                is_completed = COALESCE($4, mp.is_completed),
                progress = COALESCE($5, CASE WHEN $4 THEN 100 ELSE mp.progress END),
                completed_at = CASE
                    WHEN $4 IS NULL THEN mp.completed_at
                    WHEN $4 THEN COALESCE(mp.completed_at, $6, $7)
                    ELSE NULL
                END,
                updated_at = $7
             RETURNING {MODULE_PROGRESS_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ModuleProgress>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(module_id)
            .bind(update.is_completed)
            .bind(update.progress)
            .bind(update.completed_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn completed_module_counts(&self, course_id: Uuid) -> AppResult<Vec<(Uuid, i64)>> {
        Ok(sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT mp.user_id, COUNT(*)
             FROM module_progress mp
             JOIN course_modules m ON m.id = mp.module_id
             WHERE m.course_id = $1 AND mp.is_completed
             GROUP BY mp.user_id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
