#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use whiteboard_progress::models::{Course, Role};
use whiteboard_progress::store::MemoryStore;
use whiteboard_progress::{app, AppState};

/// A seeded course with an instructor, two enrolled students, an outsider
/// student, a second instructor and an admin.
pub struct Fixture {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub course_id: Uuid,
    pub instructor: Uuid,
    pub other_instructor: Uuid,
    pub admin: Uuid,
    pub student: Uuid,
    pub classmate: Uuid,
    pub outsider: Uuid,
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());

    let instructor = Uuid::new_v4();
    let other_instructor = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let student = Uuid::new_v4();
    let classmate = Uuid::new_v4();
    let outsider = Uuid::new_v4();

    store.add_user(instructor, "Dr. Sarah Johnson", Role::Instructor).await;
    store.add_user(other_instructor, "Prof. Michael Chen", Role::Instructor).await;
    store.add_user(admin, "Admin User", Role::Admin).await;
    store.add_user(student, "Alice Smith", Role::Student).await;
    store.add_user(classmate, "Bob Wilson", Role::Student).await;
    store.add_user(outsider, "Carol Davis", Role::Student).await;

    let course_id = add_course(&store, instructor, "CS101").await;
    store.enroll(student, course_id).await;
    store.enroll(classmate, course_id).await;

    let state = AppState::new(store.clone());
    Fixture {
        app: app(state, "api"),
        store,
        course_id,
        instructor,
        other_instructor,
        admin,
        student,
        classmate,
        outsider,
    }
}

pub async fn add_course(store: &MemoryStore, instructor: Uuid, code: &str) -> Uuid {
    let id = Uuid::new_v4();
    store
        .add_course(Course {
            id,
            code: code.into(),
            title: format!("{code} course"),
            description: None,
            instructor_id: instructor,
            schedule: Some("Mon/Wed 10:00 AM".into()),
            location: None,
            max_enrollment: Some(30),
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
        })
        .await;
    id
}

pub fn role_of(fx: &Fixture, user: Uuid) -> &'static str {
    if user == fx.admin {
        "ADMIN"
    } else if user == fx.instructor || user == fx.other_instructor {
        "INSTRUCTOR"
    } else {
        "STUDENT"
    }
}

/// Send a request as `user` (or anonymously) and return status plus JSON body.
pub async fn send(
    fx: &Fixture,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let caller = user.map(|user| (user, role_of(fx, user)));
    request(&fx.app, method, uri, caller, body).await
}

/// Send a request to `app` carrying `caller`'s identity headers.
pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<(Uuid, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = caller {
        builder = builder
            .header("x-user-id", user.to_string())
            .header("x-user-role", role);
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Create a module as the instructor and return its id.
pub async fn create_module(fx: &Fixture, title: &str, published: bool) -> Uuid {
    let (status, json) = send(
        fx,
        Method::POST,
        &format!("/api/courses/{}/modules", fx.course_id),
        Some(fx.instructor),
        Some(serde_json::json!({ "title": title, "isPublished": published })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

/// Create a published video resource in `module_id` and return its id.
pub async fn create_resource(fx: &Fixture, module_id: Uuid, title: &str) -> Uuid {
    let (status, json) = send(
        fx,
        Method::POST,
        &format!("/api/modules/{module_id}/resources"),
        Some(fx.instructor),
        Some(serde_json::json!({
            "title": title,
            "type": "VIDEO",
            "content": "https://example.com/watch",
            "duration": 480,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

pub async fn complete_resource(fx: &Fixture, user: Uuid, resource_id: Uuid) -> Value {
    let (status, json) = send(
        fx,
        Method::POST,
        &format!("/api/resources/{resource_id}/progress"),
        Some(user),
        Some(serde_json::json!({ "isCompleted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json
}

pub async fn complete_module(fx: &Fixture, user: Uuid, module_id: Uuid) -> Value {
    let (status, json) = send(
        fx,
        Method::POST,
        &format!("/api/modules/{module_id}/progress"),
        Some(user),
        Some(serde_json::json!({ "isCompleted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json
}
