//! Access Guard: role and enrollment checks that run before any read or
//! write of course content.
//!
//! Nothing is cached; every call reloads the ownership and enrollment rows
//! it needs, since enrollment can change between requests.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::{Course, CourseModule, ModuleResource};
use crate::store::Store;

/// What a caller who passed the read check may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Instructor of record or administrator: everything, published or not.
    Manage,
    /// Enrolled learner: published content only.
    Enrolled,
}

impl Access {
    pub fn can_manage(self) -> bool {
        self == Access::Manage
    }
}

/// Whether `caller` manages `course` without needing an enrollment lookup.
pub fn manages(caller: &Caller, course: &Course) -> bool {
    caller.is_admin() || course.instructor_id == caller.user_id
}

#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn Store>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn course(&self, course_id: Uuid) -> AppResult<Course> {
        self.store
            .find_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", course_id))
    }

    /// Instructor of record or admin only.
    pub async fn authorize_write(&self, caller: &Caller, course_id: Uuid) -> AppResult<Course> {
        let course = self.course(course_id).await?;
        if !manages(caller, &course) {
            tracing::warn!(
                user_id = %caller.user_id,
                course_id = %course_id,
                "Write denied: caller is not the instructor of record"
            );
            return Err(AppError::PermissionDenied(
                "Only the course instructor or an administrator can perform this action".into(),
            ));
        }
        Ok(course)
    }

    /// Enrolled learners, the instructor of record, or an admin.
    pub async fn authorize_read(&self, caller: &Caller, course_id: Uuid) -> AppResult<Access> {
        let course = self.course(course_id).await?;
        if manages(caller, &course) {
            return Ok(Access::Manage);
        }
        if self.store.is_enrolled(caller.user_id, course_id).await? {
            return Ok(Access::Enrolled);
        }
        tracing::warn!(
            user_id = %caller.user_id,
            course_id = %course_id,
            "Read denied: caller is not enrolled"
        );
        Err(AppError::PermissionDenied(
            "You must be enrolled in this course to access its content".into(),
        ))
    }

    async fn module(&self, module_id: Uuid) -> AppResult<CourseModule> {
        self.store
            .find_module(module_id)
            .await?
            .ok_or_else(|| AppError::not_found("Module", module_id))
    }

    async fn resource(&self, resource_id: Uuid) -> AppResult<(ModuleResource, CourseModule)> {
        let resource = self
            .store
            .find_resource(resource_id)
            .await?
            .ok_or_else(|| AppError::not_found("Resource", resource_id))?;
        let module = self.module(resource.module_id).await?;
        Ok((resource, module))
    }

    pub async fn module_for_write(
        &self,
        caller: &Caller,
        module_id: Uuid,
    ) -> AppResult<CourseModule> {
        let module = self.module(module_id).await?;
        self.authorize_write(caller, module.course_id).await?;
        Ok(module)
    }

    /// Unpublished modules are reported as missing to learners.
    pub async fn module_for_read(
        &self,
        caller: &Caller,
        module_id: Uuid,
    ) -> AppResult<(CourseModule, Access)> {
        let module = self.module(module_id).await?;
        let access = self.authorize_read(caller, module.course_id).await?;
        if !access.can_manage() && !module.is_published {
            return Err(AppError::not_found("Module", module_id));
        }
        Ok((module, access))
    }

    pub async fn resource_for_write(
        &self,
        caller: &Caller,
        resource_id: Uuid,
    ) -> AppResult<(ModuleResource, CourseModule)> {
        let (resource, module) = self.resource(resource_id).await?;
        self.authorize_write(caller, module.course_id).await?;
        Ok((resource, module))
    }

    /// Resources are hidden from learners when they or their module are unpublished.
    pub async fn resource_for_read(
        &self,
        caller: &Caller,
        resource_id: Uuid,
    ) -> AppResult<(ModuleResource, CourseModule, Access)> {
        let (resource, module) = self.resource(resource_id).await?;
        let access = self.authorize_read(caller, module.course_id).await?;
        if !access.can_manage() && !(module.is_published && resource.is_published) {
            return Err(AppError::not_found("Resource", resource_id));
        }
        Ok((resource, module, access))
    }
}
