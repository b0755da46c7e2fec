use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::Caller,
    error::AppResult,
    extract::{ApiJson, ApiPath},
    models::*,
    response::ApiResponse,
    AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        // course-scoped
        .route(
            "/courses/:course_id/modules",
            get(get_course_modules).post(create_module),
        )
        .route("/courses/:course_id/statistics", get(get_course_statistics))
        // modules
        .route(
            "/modules/:id",
            get(get_module).put(update_module).delete(delete_module),
        )
        .route("/modules/:id/resources", post(create_resource))
        .route("/modules/:id/progress", post(record_module_progress))
        // resources
        .route(
            "/resources/:id",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .route("/resources/:id/progress", post(record_resource_progress))
        .with_state(state)
}

type Created<T> = (StatusCode, Json<ApiResponse<T>>);

// --- modules ---

async fn create_module(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(course_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateModuleReq>,
) -> AppResult<Created<CourseModule>> {
    let module = state.catalog.create_module(&caller, course_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(module).with_message("Module created successfully")),
    ))
}

async fn get_course_modules(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(course_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<ModuleView>>>> {
    let modules = state.catalog.course_modules(&caller, course_id).await?;
    Ok(Json(ApiResponse::data(modules)))
}

async fn get_module(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<ModuleView>>> {
    let module = state.catalog.get_module(&caller, id).await?;
    Ok(Json(ApiResponse::data(module)))
}

async fn update_module(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateModuleReq>,
) -> AppResult<Json<ApiResponse<CourseModule>>> {
    let module = state.catalog.update_module(&caller, id, req).await?;
    Ok(Json(
        ApiResponse::data(module).with_message("Module updated successfully"),
    ))
}

async fn delete_module(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.catalog.delete_module(&caller, id).await?;
    Ok(Json(ApiResponse::message("Module deleted successfully")))
}

async fn record_module_progress(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ModuleProgressReq>,
) -> AppResult<Json<ApiResponse<ModuleProgress>>> {
    let progress = state.progress.record_module_progress(&caller, id, req).await?;
    Ok(Json(
        ApiResponse::data(progress).with_message("Progress updated successfully"),
    ))
}

// --- resources ---

async fn create_resource(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(module_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateResourceReq>,
) -> AppResult<Created<ModuleResource>> {
    let resource = state.catalog.create_resource(&caller, module_id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(resource).with_message("Resource created successfully")),
    ))
}

async fn get_resource(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<ResourceView>>> {
    let resource = state.catalog.get_resource(&caller, id).await?;
    Ok(Json(ApiResponse::data(resource)))
}

async fn update_resource(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateResourceReq>,
) -> AppResult<Json<ApiResponse<ModuleResource>>> {
    let resource = state.catalog.update_resource(&caller, id, req).await?;
    Ok(Json(
        ApiResponse::data(resource).with_message("Resource updated successfully"),
    ))
}

async fn delete_resource(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.catalog.delete_resource(&caller, id).await?;
    Ok(Json(ApiResponse::message("Resource deleted successfully")))
}

async fn record_resource_progress(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ResourceProgressReq>,
) -> AppResult<Json<ApiResponse<ResourceProgress>>> {
    let progress = state
        .progress
        .record_resource_progress(&caller, id, req)
        .await?;
    Ok(Json(
        ApiResponse::data(progress).with_message("Progress updated successfully"),
    ))
}

// --- statistics ---

async fn get_course_statistics(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(course_id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<CourseStatistics>>> {
    let stats = state
        .statistics
        .course_statistics(&caller, course_id)
        .await?;
    Ok(Json(ApiResponse::data(stats)))
}
