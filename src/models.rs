use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

// --- roles & resource kinds ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "INSTRUCTOR" => Ok(Role::Instructor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::Unauthorized(format!("unknown role {other:?}"))),
        }
    }
}

/// Kind of learning unit a resource represents.
///
/// Parsing is case-insensitive; anything outside the six kinds is a
/// validation error rather than a deserialization failure.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "resource_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ResourceType {
    Video,
    Document,
    Reading,
    Link,
    Quiz,
    Assignment,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Video => "VIDEO",
            ResourceType::Document => "DOCUMENT",
            ResourceType::Reading => "READING",
            ResourceType::Link => "LINK",
            ResourceType::Quiz => "QUIZ",
            ResourceType::Assignment => "ASSIGNMENT",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VIDEO" => Ok(ResourceType::Video),
            "DOCUMENT" => Ok(ResourceType::Document),
            "READING" => Ok(ResourceType::Reading),
            "LINK" => Ok(ResourceType::Link),
            "QUIZ" => Ok(ResourceType::Quiz),
            "ASSIGNMENT" => Ok(ResourceType::Assignment),
            _ => Err(AppError::Validation(format!(
                "unsupported resource type {s:?}; expected one of VIDEO, DOCUMENT, READING, LINK, QUIZ, ASSIGNMENT"
            ))),
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- persisted rows ---

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: Uuid,
    pub schedule: Option<String>,
    pub location: Option<String>,
    pub max_enrollment: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "position")]
    pub order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResource {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub content: String,
    /// Length in seconds, for timed media.
    pub duration: Option<i32>,
    #[sqlx(rename = "position")]
    pub order: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub is_completed: bool,
    pub progress: i32,
    pub viewed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "timeSpentSeconds")]
    pub time_spent_secs: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub is_completed: bool,
    pub progress: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An enrolled student as seen by the statistics rollup.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct EnrolledStudent {
    pub user_id: Uuid,
    pub name: String,
}

// --- requests ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateModuleReq {
    pub title: String,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

/// Partial module update. `description: null` clears it; omission keeps it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateModuleReq {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateResourceReq {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub content: String,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateResourceReq {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(rename = "type")]
    pub kind: Option<ResourceType>,
    pub content: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub duration: Option<Option<i32>>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceProgressReq {
    pub is_completed: Option<bool>,
    #[serde(alias = "progressPercent")]
    pub progress: Option<f64>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModuleProgressReq {
    pub is_completed: Option<bool>,
    #[serde(alias = "progressPercent")]
    pub progress: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- validated store inputs ---

#[derive(Debug, Clone)]
pub struct NewModule {
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// `None` appends after the current last module.
    pub order: Option<i32>,
    pub is_published: bool,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub kind: ResourceType,
    pub content: String,
    pub duration: Option<i32>,
    /// `None` appends after the current last resource of the module.
    pub order: Option<i32>,
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceProgressUpdate {
    pub is_completed: Option<bool>,
    /// Already clamped to 0..=100.
    pub progress: Option<i32>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub time_spent_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleProgressUpdate {
    pub is_completed: Option<bool>,
    /// Already clamped to 0..=100.
    pub progress: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- responses ---

/// A resource together with the caller's own progress on it, if any.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: ModuleResource,
    pub progress: Option<ResourceProgress>,
}

/// A module with its ordered resources and the caller's module progress.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    #[serde(flatten)]
    pub module: CourseModule,
    pub resources: Vec<ResourceView>,
    pub progress: Option<ModuleProgress>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub user_id: Uuid,
    pub user_name: String,
    pub overall_progress: i32,
    pub completed_modules: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseStatistics {
    pub course_id: Uuid,
    pub total_modules: i64,
    /// Number of (student, module) completions across enrolled students.
    pub completed_modules: i64,
    pub average_progress: i32,
    pub student_progress: Vec<StudentProgress>,
}
