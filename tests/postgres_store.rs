//! The HTTP surface running over `PgStore`.
//!
//! Each test gets a fresh database with the crate migrations applied, so
//! `DATABASE_URL` must point at a Postgres server the tests may create
//! databases on.

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::task::JoinSet;
use uuid::Uuid;
use whiteboard_progress::store::PgStore;
use whiteboard_progress::{app, AppState};

use common::request;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Seeded {
    app: Router,
    pool: PgPool,
    course_id: Uuid,
    instructor: Uuid,
    student: Uuid,
}

impl Seeded {
    fn instructor(&self) -> Option<(Uuid, &'static str)> {
        Some((self.instructor, "INSTRUCTOR"))
    }

    fn student(&self) -> Option<(Uuid, &'static str)> {
        Some((self.student, "STUDENT"))
    }
}

async fn seed(pool: PgPool) -> Seeded {
    let instructor = Uuid::new_v4();
    let student = Uuid::new_v4();
    for (id, name, email, role) in [
        (instructor, "Dr. Sarah Johnson", "sarah.johnson@example.edu", "INSTRUCTOR"),
        (student, "Alice Smith", "alice.smith@example.edu", "STUDENT"),
    ] {
        sqlx::query("INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(role)
            .execute(&pool)
            .await
            .unwrap();
    }

    let course_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO courses (id, code, title, instructor_id)
         VALUES ($1, 'CS101', 'Introduction to Computer Science', $2)",
    )
    .bind(course_id)
    .bind(instructor)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2)")
        .bind(student)
        .bind(course_id)
        .execute(&pool)
        .await
        .unwrap();

    let state = AppState::new(Arc::new(PgStore::new(pool.clone())));
    Seeded {
        app: app(state, "api"),
        pool,
        course_id,
        instructor,
        student,
    }
}

async fn post_module(s: &Seeded, body: Value) -> (StatusCode, Value) {
    request(
        &s.app,
        Method::POST,
        &format!("/api/courses/{}/modules", s.course_id),
        s.instructor(),
        Some(body),
    )
    .await
}

async fn published_module(s: &Seeded, title: &str) -> Uuid {
    let (status, json) = post_module(s, json!({ "title": title, "isPublished": true })).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

async fn video(s: &Seeded, module_id: Uuid, title: &str) -> Uuid {
    let (status, json) = request(
        &s.app,
        Method::POST,
        &format!("/api/modules/{module_id}/resources"),
        s.instructor(),
        Some(json!({
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

async fn record(s: &Seeded, resource_id: Uuid, body: Value) -> (StatusCode, Value) {
    request(
        &s.app,
        Method::POST,
        &format!("/api/resources/{resource_id}/progress"),
        s.student(),
        Some(body),
    )
    .await
}

async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
}

// ---------------------------------------------------------------------------
// Progress upserts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn repeated_completion_keeps_the_first_timestamp(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;

    let (status, first) = record(&s, resource_id, json!({ "isCompleted": true })).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (_, second) = record(&s, resource_id, json!({ "isCompleted": true })).await;

    assert_eq!(first["data"]["progress"], 100);
    assert!(first["data"]["completedAt"].is_string());
    assert_eq!(second["data"]["completedAt"], first["data"]["completedAt"]);
    assert_eq!(second["data"]["id"], first["data"]["id"]);

    let (_, undone) = record(&s, resource_id, json!({ "isCompleted": false })).await;
    assert_eq!(undone["data"]["isCompleted"], false);
    assert!(undone["data"]["completedAt"].is_null());
    assert_eq!(undone["data"]["progress"], 100);
}

#[sqlx::test(migrations = "./migrations")]
async fn out_of_range_percentages_are_clamped(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;

    for (supplied, stored) in [(150.0, 100), (-10.0, 0), (62.5, 63)] {
        let (status, json) = record(&s, resource_id, json!({ "progress": supplied })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["progress"], stored, "supplied {supplied}");
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn first_view_is_kept_and_time_spent_accumulates(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;

    record(
        &s,
        resource_id,
        json!({ "viewedAt": "2024-02-01T09:00:00Z", "timeSpentSeconds": 90 }),
    )
    .await;
    let (_, json) = record(
        &s,
        resource_id,
        json!({ "viewedAt": "2024-02-03T09:00:00Z", "timeSpentSeconds": 30 }),
    )
    .await;

    assert_eq!(json["data"]["viewedAt"], "2024-02-01T09:00:00Z");
    assert_eq!(json["data"]["timeSpentSeconds"], 120);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_first_writes_produce_one_row(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let app = s.app.clone();
        let caller = s.student();
        tasks.spawn(async move {
            request(
                &app,
                Method::POST,
                &format!("/api/resources/{resource_id}/progress"),
                caller,
                Some(json!({ "timeSpentSeconds": 5 })),
            )
            .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (status, json) = joined.unwrap();
        assert_eq!(status, StatusCode::OK, "{json}");
    }

    let totals: Vec<i64> = sqlx::query_scalar(
        "SELECT time_spent_secs FROM resource_progress WHERE user_id = $1 AND resource_id = $2",
    )
    .bind(s.student)
    .bind(resource_id)
    .fetch_all(&s.pool)
    .await
    .unwrap();
    assert_eq!(totals, vec![40]);
}

#[sqlx::test(migrations = "./migrations")]
async fn time_spent_overflow_is_a_validation_error(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;
    let body = json!({ "timeSpentSeconds": i64::MAX });

    let (status, _) = record(&s, resource_id, body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = record(&s, resource_id, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "./migrations")]
async fn module_completion_honours_supplied_timestamp_once(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let uri = format!("/api/modules/{module_id}/progress");

    let (status, first) = request(
        &s.app,
        Method::POST,
        &uri,
        s.student(),
        Some(json!({ "isCompleted": true, "completedAt": "2024-03-01T12:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["completedAt"], "2024-03-01T12:00:00Z");

    let (_, again) = request(
        &s.app,
        Method::POST,
        &uri,
        s.student(),
        Some(json!({ "isCompleted": true, "completedAt": "2024-04-01T12:00:00Z" })),
    )
    .await;
    assert_eq!(again["data"]["completedAt"], "2024-03-01T12:00:00Z");

    let (status, stats) = request(
        &s.app,
        Method::GET,
        &format!("/api/courses/{}/statistics", s.course_id),
        s.instructor(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["totalModules"], 1);
    assert_eq!(stats["data"]["completedModules"], 1);
    assert_eq!(stats["data"]["averageProgress"], 100);
    assert_eq!(stats["data"]["studentProgress"][0]["userName"], "Alice Smith");
}

// ---------------------------------------------------------------------------
// Modules and resources
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_module_cascades(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;
    let resource_id = video(&s, module_id, "Welcome").await;
    record(&s, resource_id, json!({ "isCompleted": true })).await;
    request(
        &s.app,
        Method::POST,
        &format!("/api/modules/{module_id}/progress"),
        s.student(),
        Some(json!({ "isCompleted": true })),
    )
    .await;

    let (status, json) = request(
        &s.app,
        Method::DELETE,
        &format!("/api/modules/{module_id}"),
        s.instructor(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Module deleted successfully");

    let modules = "SELECT COUNT(*) FROM course_modules WHERE id = $1";
    let resources = "SELECT COUNT(*) FROM module_resources WHERE module_id = $1";
    let module_rows = "SELECT COUNT(*) FROM module_progress WHERE module_id = $1";
    let resource_rows = "SELECT COUNT(*) FROM resource_progress WHERE resource_id = $1";
    assert_eq!(count(&s.pool, modules, module_id).await, 0);
    assert_eq!(count(&s.pool, resources, module_id).await, 0);
    assert_eq!(count(&s.pool, module_rows, module_id).await, 0);
    assert_eq!(count(&s.pool, resource_rows, resource_id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_resource_type_is_rejected_without_a_row(pool: PgPool) {
    let s = seed(pool).await;
    let module_id = published_module(&s, "Introduction").await;

    let (status, json) = request(
        &s.app,
        Method::POST,
        &format!("/api/modules/{module_id}/resources"),
        s.instructor(),
        Some(json!({ "title": "Episode 1", "type": "PODCAST", "content": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let resources = "SELECT COUNT(*) FROM module_resources WHERE module_id = $1";
    assert_eq!(count(&s.pool, resources, module_id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_appends_get_distinct_positions(pool: PgPool) {
    let s = seed(pool).await;

    let mut tasks = JoinSet::new();
    for n in 0..6 {
        let app = s.app.clone();
        let caller = s.instructor();
        let uri = format!("/api/courses/{}/modules", s.course_id);
        tasks.spawn(async move {
            request(
                &app,
                Method::POST,
                &uri,
                caller,
                Some(json!({ "title": format!("Week {n}") })),
            )
            .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (status, json) = joined.unwrap();
        assert_eq!(status, StatusCode::CREATED, "{json}");
    }

    let positions: Vec<i32> = sqlx::query_scalar(
        "SELECT position FROM course_modules WHERE course_id = $1 ORDER BY position",
    )
    .bind(s.course_id)
    .fetch_all(&s.pool)
    .await
    .unwrap();
    assert_eq!(positions, (1..=6).collect::<Vec<_>>());
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_and_overflowing_positions(pool: PgPool) {
    let s = seed(pool).await;

    let (status, _) = post_module(&s, json!({ "title": "First", "order": 1 })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = post_module(&s, json!({ "title": "Clash", "order": 1 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");

    let (status, _) = post_module(&s, json!({ "title": "Last", "order": i32::MAX })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = post_module(&s, json!({ "title": "After last" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}
