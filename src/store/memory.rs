use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    Course, CourseModule, EnrolledStudent, ModuleProgress, ModuleProgressUpdate, ModuleResource,
    NewModule, NewResource, ResourceProgress, ResourceProgressUpdate, Role,
};
use crate::progress;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, (String, Role)>,
    courses: HashMap<Uuid, Course>,
    enrollments: HashSet<(Uuid, Uuid)>, // (user_id, course_id)
    modules: HashMap<Uuid, CourseModule>,
    resources: HashMap<Uuid, ModuleResource>,
    resource_progress: HashMap<(Uuid, Uuid), ResourceProgress>, // (user_id, resource_id)
    module_progress: HashMap<(Uuid, Uuid), ModuleProgress>,     // (user_id, module_id)
}

impl Tables {
    fn position_taken(&self, course_id: Uuid, position: i32, except: Option<Uuid>) -> bool {
        self.modules
            .values()
            .any(|m| m.course_id == course_id && m.order == position && Some(m.id) != except)
    }

    fn require_user(&self, user_id: Uuid) -> AppResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(AppError::Validation("Referenced record does not exist".into()))
        }
    }
}

/// Position after `last`, or 1 for an empty list.
fn append_position(last: Option<i32>) -> AppResult<i32> {
    last.unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| AppError::Validation("order is out of range".into()))
}

/// In-process [`Store`] holding every table behind one lock.
///
/// Each trait call takes the lock once, so multi-row operations (cascading
/// deletes, upserts) are atomic with respect to other callers. Users,
/// courses and enrollments are seeded through the inherent methods.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: Uuid, name: impl Into<String>, role: Role) {
        self.tables.write().await.users.insert(id, (name.into(), role));
    }

    pub async fn add_course(&self, course: Course) {
        self.tables.write().await.courses.insert(course.id, course);
    }

    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) {
        self.tables
            .write()
            .await
            .enrollments
            .insert((user_id, course_id));
    }

    pub async fn unenroll(&self, user_id: Uuid, course_id: Uuid) {
        self.tables
            .write()
            .await
            .enrollments
            .remove(&(user_id, course_id));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_course(&self, id: Uuid) -> AppResult<Option<Course>> {
        Ok(self.tables.read().await.courses.get(&id).cloned())
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .contains(&(user_id, course_id)))
    }

    async fn enrolled_students(&self, course_id: Uuid) -> AppResult<Vec<EnrolledStudent>> {
        let tables = self.tables.read().await;
        let mut students: Vec<EnrolledStudent> = tables
            .enrollments
            .iter()
            .filter(|(_, course)| *course == course_id)
            .filter_map(|(user_id, _)| {
                tables.users.get(user_id).map(|(name, _)| EnrolledStudent {
                    user_id: *user_id,
                    name: name.clone(),
                })
            })
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
        Ok(students)
    }

    async fn find_module(&self, id: Uuid) -> AppResult<Option<CourseModule>> {
        Ok(self.tables.read().await.modules.get(&id).cloned())
    }

    async fn list_modules(&self, course_id: Uuid) -> AppResult<Vec<CourseModule>> {
        let tables = self.tables.read().await;
        let mut modules: Vec<CourseModule> = tables
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order);
        Ok(modules)
    }

    async fn count_modules(&self, course_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .count() as i64)
    }

    async fn insert_module(&self, new: &NewModule, now: DateTime<Utc>) -> AppResult<CourseModule> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&new.course_id) {
            return Err(AppError::Validation("Referenced record does not exist".into()));
        }

        let position = match new.order {
            Some(position) => {
                if tables.position_taken(new.course_id, position, None) {
                    return Err(AppError::Conflict(format!(
                        "a module already occupies position {position} in this course"
                    )));
                }
                position
            }
            None => append_position(
                tables
                    .modules
                    .values()
                    .filter(|m| m.course_id == new.course_id)
                    .map(|m| m.order)
                    .max(),
            )?,
        };

        let module = CourseModule {
            id: Uuid::new_v4(),
            course_id: new.course_id,
            title: new.title.clone(),
            description: new.description.clone(),
            order: position,
            is_published: new.is_published,
            created_at: now,
            updated_at: now,
        };
        tables.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn save_module(&self, module: &CourseModule) -> AppResult<CourseModule> {
        let mut tables = self.tables.write().await;
        if !tables.modules.contains_key(&module.id) {
            return Err(AppError::Database(sqlx::Error::RowNotFound));
        }
        if tables.position_taken(module.course_id, module.order, Some(module.id)) {
            return Err(AppError::Conflict(format!(
                "a module already occupies position {} in this course",
                module.order
            )));
        }
        tables.modules.insert(module.id, module.clone());
        Ok(module.clone())
    }

    async fn delete_module(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.modules.remove(&id).is_none() {
            return Ok(false);
        }

        let resource_ids: HashSet<Uuid> = tables
            .resources
            .values()
            .filter(|r| r.module_id == id)
            .map(|r| r.id)
            .collect();
        tables.resources.retain(|rid, _| !resource_ids.contains(rid));
        tables
            .resource_progress
            .retain(|(_, rid), _| !resource_ids.contains(rid));
        tables.module_progress.retain(|(_, mid), _| *mid != id);
        Ok(true)
    }

    async fn find_resource(&self, id: Uuid) -> AppResult<Option<ModuleResource>> {
        Ok(self.tables.read().await.resources.get(&id).cloned())
    }

    async fn list_resources(&self, module_ids: &[Uuid]) -> AppResult<Vec<ModuleResource>> {
        let tables = self.tables.read().await;
        let mut resources: Vec<ModuleResource> = tables
            .resources
            .values()
            .filter(|r| module_ids.contains(&r.module_id))
            .cloned()
            .collect();
        resources.sort_by_key(|r| (r.module_id, r.order, r.created_at));
        Ok(resources)
    }

    async fn insert_resource(
        &self,
        new: &NewResource,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleResource> {
        let mut tables = self.tables.write().await;
        if !tables.modules.contains_key(&new.module_id) {
            return Err(AppError::Validation("Referenced record does not exist".into()));
        }

        let position = match new.order {
            Some(position) => position,
            None => append_position(
                tables
                    .resources
                    .values()
                    .filter(|r| r.module_id == new.module_id)
                    .map(|r| r.order)
                    .max(),
            )?,
        };

        let resource = ModuleResource {
            id: Uuid::new_v4(),
            module_id: new.module_id,
            title: new.title.clone(),
            description: new.description.clone(),
            kind: new.kind,
            content: new.content.clone(),
            duration: new.duration,
            order: position,
            is_published: new.is_published,
            created_at: now,
            updated_at: now,
        };
        tables.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn save_resource(&self, resource: &ModuleResource) -> AppResult<ModuleResource> {
        let mut tables = self.tables.write().await;
        match tables.resources.get_mut(&resource.id) {
            Some(row) => {
                *row = resource.clone();
                Ok(resource.clone())
            }
            None => Err(AppError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn delete_resource(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.resources.remove(&id).is_none() {
            return Ok(false);
        }
        tables.resource_progress.retain(|(_, rid), _| *rid != id);
        Ok(true)
    }

    async fn resource_progress_for(
        &self,
        user_id: Uuid,
        resource_ids: &[Uuid],
    ) -> AppResult<Vec<ResourceProgress>> {
        let tables = self.tables.read().await;
        Ok(resource_ids
            .iter()
            .filter_map(|rid| tables.resource_progress.get(&(user_id, *rid)).cloned())
            .collect())
    }

    async fn module_progress_for(
        &self,
        user_id: Uuid,
        module_ids: &[Uuid],
    ) -> AppResult<Vec<ModuleProgress>> {
        let tables = self.tables.read().await;
        Ok(module_ids
            .iter()
            .filter_map(|mid| tables.module_progress.get(&(user_id, *mid)).cloned())
            .collect())
    }

    async fn upsert_resource_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        update: &ResourceProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ResourceProgress> {
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.resources.contains_key(&resource_id) {
            return Err(AppError::Validation("Referenced record does not exist".into()));
        }

        let key = (user_id, resource_id);
        match tables.resource_progress.get_mut(&key) {
            Some(row) => {
                progress::merge_resource_progress(row, update, now)?;
                Ok(row.clone())
            }
            None => {
                let row = progress::new_resource_progress(user_id, resource_id, update, now);
                tables.resource_progress.insert(key, row.clone());
                Ok(row)
            }
        }
    }

    async fn upsert_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        update: &ModuleProgressUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ModuleProgress> {
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.modules.contains_key(&module_id) {
            return Err(AppError::Validation("Referenced record does not exist".into()));
        }

        let row = tables
            .module_progress
            .entry((user_id, module_id))
            .and_modify(|row| progress::merge_module_progress(row, update, now))
            .or_insert_with(|| progress::new_module_progress(user_id, module_id, update, now));
        Ok(row.clone())
    }

    async fn completed_module_counts(&self, course_id: Uuid) -> AppResult<Vec<(Uuid, i64)>> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for ((user_id, module_id), row) in &tables.module_progress {
            let in_course = tables
                .modules
                .get(module_id)
                .is_some_and(|m| m.course_id == course_id);
            if in_course && row.is_completed {
                *counts.entry(*user_id).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}
