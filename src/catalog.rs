//! Resource Store: modules and their resources.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::guard::{Access, AccessGuard};
use crate::models::{
    CourseModule, CreateModuleReq, CreateResourceReq, ModuleResource, ModuleView, NewModule,
    NewResource, ResourceView, UpdateModuleReq, UpdateResourceReq,
};
use crate::store::Store;

fn required_text(field: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn non_negative(field: &str, value: Option<i32>) -> AppResult<Option<i32>> {
    match value {
        Some(v) if v < 0 => Err(AppError::Validation(format!("{field} must not be negative"))),
        other => Ok(other),
    }
}

impl UpdateModuleReq {
    /// Apply the supplied fields; omitted ones keep their stored values.
    pub fn apply(self, module: &mut CourseModule) -> AppResult<()> {
        if let Some(title) = self.title {
            module.title = required_text("title", title)?;
        }
        if let Some(description) = self.description {
            module.description = description;
        }
        if let Some(order) = non_negative("order", self.order)? {
            module.order = order;
        }
        if let Some(published) = self.is_published {
            module.is_published = published;
        }
        Ok(())
    }
}

impl UpdateResourceReq {
    pub fn apply(self, resource: &mut ModuleResource) -> AppResult<()> {
        if let Some(title) = self.title {
            resource.title = required_text("title", title)?;
        }
        if let Some(description) = self.description {
            resource.description = description;
        }
        if let Some(kind) = self.kind {
            resource.kind = kind;
        }
        if let Some(content) = self.content {
            resource.content = required_text("content", content)?;
        }
        if let Some(duration) = self.duration {
            resource.duration = non_negative("duration", duration)?;
        }
        if let Some(order) = non_negative("order", self.order)? {
            resource.order = order;
        }
        if let Some(published) = self.is_published {
            resource.is_published = published;
        }
        Ok(())
    }
}

/// CRUD over modules and resources, gated by [`AccessGuard`].
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
    guard: AccessGuard,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = AccessGuard::new(store.clone());
        Self { store, guard }
    }

    pub async fn create_module(
        &self,
        caller: &Caller,
        course_id: Uuid,
        req: CreateModuleReq,
    ) -> AppResult<CourseModule> {
        self.guard.authorize_write(caller, course_id).await?;

        let new = NewModule {
            course_id,
            title: required_text("title", req.title)?,
            description: req.description,
            order: non_negative("order", req.order)?,
            is_published: req.is_published.unwrap_or(false),
        };
        let module = self.store.insert_module(&new, Utc::now()).await?;

        tracing::info!(
            module_id = %module.id,
            course_id = %course_id,
            order = module.order,
            "Created module"
        );
        Ok(module)
    }

    pub async fn update_module(
        &self,
        caller: &Caller,
        module_id: Uuid,
        req: UpdateModuleReq,
    ) -> AppResult<CourseModule> {
        let mut module = self.guard.module_for_write(caller, module_id).await?;
        req.apply(&mut module)?;
        module.updated_at = Utc::now();

        let module = self.store.save_module(&module).await?;
        tracing::info!(module_id = %module_id, "Updated module");
        Ok(module)
    }

    /// Deletes the module together with its resources and all progress rows.
    pub async fn delete_module(&self, caller: &Caller, module_id: Uuid) -> AppResult<()> {
        let module = self.guard.module_for_write(caller, module_id).await?;
        if !self.store.delete_module(module_id).await? {
            return Err(AppError::not_found("Module", module_id));
        }
        tracing::info!(module_id = %module_id, course_id = %module.course_id, "Deleted module");
        Ok(())
    }

    pub async fn get_module(&self, caller: &Caller, module_id: Uuid) -> AppResult<ModuleView> {
        let (module, access) = self.guard.module_for_read(caller, module_id).await?;
        let mut views = self.assemble(caller, vec![module], access).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("module view assembly returned nothing".into()))
    }

    /// All modules of a course visible to the caller, ordered by position.
    pub async fn course_modules(
        &self,
        caller: &Caller,
        course_id: Uuid,
    ) -> AppResult<Vec<ModuleView>> {
        let access = self.guard.authorize_read(caller, course_id).await?;
        let modules = self
            .store
            .list_modules(course_id)
            .await?
            .into_iter()
            .filter(|m| access.can_manage() || m.is_published)
            .collect();
        self.assemble(caller, modules, access).await
    }

    pub async fn create_resource(
        &self,
        caller: &Caller,
        module_id: Uuid,
        req: CreateResourceReq,
    ) -> AppResult<ModuleResource> {
        self.guard.module_for_write(caller, module_id).await?;

        let new = NewResource {
            module_id,
            title: required_text("title", req.title)?,
            description: req.description,
            kind: req.kind,
            content: required_text("content", req.content)?,
            duration: non_negative("duration", req.duration)?,
            order: non_negative("order", req.order)?,
            is_published: req.is_published.unwrap_or(true),
        };
        let resource = self.store.insert_resource(&new, Utc::now()).await?;

        tracing::info!(
            resource_id = %resource.id,
            module_id = %module_id,
            kind = %resource.kind,
            "Created resource"
        );
        Ok(resource)
    }

    pub async fn get_resource(&self, caller: &Caller, resource_id: Uuid) -> AppResult<ResourceView> {
        let (resource, _, _) = self.guard.resource_for_read(caller, resource_id).await?;
        let progress = self
            .store
            .resource_progress_for(caller.user_id, &[resource_id])
            .await?
            .pop();
        Ok(ResourceView { resource, progress })
    }

    pub async fn update_resource(
        &self,
        caller: &Caller,
        resource_id: Uuid,
        req: UpdateResourceReq,
    ) -> AppResult<ModuleResource> {
        let (mut resource, _) = self.guard.resource_for_write(caller, resource_id).await?;
        req.apply(&mut resource)?;
        resource.updated_at = Utc::now();

        let resource = self.store.save_resource(&resource).await?;
        tracing::info!(resource_id = %resource_id, "Updated resource");
        Ok(resource)
    }

    pub async fn delete_resource(&self, caller: &Caller, resource_id: Uuid) -> AppResult<()> {
        self.guard.resource_for_write(caller, resource_id).await?;
        if !self.store.delete_resource(resource_id).await? {
            return Err(AppError::not_found("Resource", resource_id));
        }
        tracing::info!(resource_id = %resource_id, "Deleted resource");
        Ok(())
    }

    // Attach ordered resources plus the caller's own progress rows.
    async fn assemble(
        &self,
        caller: &Caller,
        modules: Vec<CourseModule>,
        access: Access,
    ) -> AppResult<Vec<ModuleView>> {
        let module_ids: Vec<Uuid> = modules.iter().map(|m| m.id).collect();

        let resources: Vec<ModuleResource> = self
            .store
            .list_resources(&module_ids)
            .await?
            .into_iter()
            .filter(|r| access.can_manage() || r.is_published)
            .collect();
        let resource_ids: Vec<Uuid> = resources.iter().map(|r| r.id).collect();

        let mut resource_progress: HashMap<Uuid, _> = self
            .store
            .resource_progress_for(caller.user_id, &resource_ids)
            .await?
            .into_iter()
            .map(|p| (p.resource_id, p))
            .collect();
        let mut module_progress: HashMap<Uuid, _> = self
            .store
            .module_progress_for(caller.user_id, &module_ids)
            .await?
            .into_iter()
            .map(|p| (p.module_id, p))
            .collect();

        let mut by_module: HashMap<Uuid, Vec<ResourceView>> = HashMap::new();
        for resource in resources {
            let progress = resource_progress.remove(&resource.id);
            by_module
                .entry(resource.module_id)
                .or_default()
                .push(ResourceView { resource, progress });
        }

        Ok(modules
            .into_iter()
            .map(|module| {
                let mut resources = by_module.remove(&module.id).unwrap_or_default();
                resources.sort_by_key(|v| (v.resource.order, v.resource.created_at));
                ModuleView {
                    progress: module_progress.remove(&module.id),
                    resources,
                    module,
                }
            })
            .collect())
    }
}
