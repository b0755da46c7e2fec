//! Statistics Aggregator: per-course completion rollups for instructors.
//!
//! Read-only. The handful of queries it issues are not wrapped in a
//! snapshot; progress written concurrently may or may not be counted.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppResult;
use crate::guard::AccessGuard;
use crate::models::{CourseStatistics, EnrolledStudent, StudentProgress};
use crate::store::Store;

/// `round(100 * completed / total)`, or 0 for a course without modules.
pub fn overall_progress(completed: i64, total_modules: i64) -> i32 {
    if total_modules <= 0 {
        return 0;
    }
    (100.0 * completed as f64 / total_modules as f64).round() as i32
}

/// Fold raw completion counts into the course summary.
///
/// Only enrolled students are reported; `completions` may contain users
/// who have since left the course and they are ignored.
pub fn rollup(
    course_id: Uuid,
    total_modules: i64,
    students: Vec<EnrolledStudent>,
    completions: &HashMap<Uuid, i64>,
) -> CourseStatistics {
    let student_progress: Vec<StudentProgress> = students
        .into_iter()
        .map(|s| {
            let completed = completions.get(&s.user_id).copied().unwrap_or(0);
            StudentProgress {
                user_id: s.user_id,
                user_name: s.name,
                overall_progress: overall_progress(completed, total_modules),
                completed_modules: completed,
            }
        })
        .collect();

    let completed_modules = student_progress.iter().map(|s| s.completed_modules).sum();
    let average_progress = if student_progress.is_empty() {
        0
    } else {
        let sum: i64 = student_progress
            .iter()
            .map(|s| i64::from(s.overall_progress))
            .sum();
        (sum as f64 / student_progress.len() as f64).round() as i32
    };

    CourseStatistics {
        course_id,
        total_modules,
        completed_modules,
        average_progress,
        student_progress,
    }
}

#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn Store>,
    guard: AccessGuard,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = AccessGuard::new(store.clone());
        Self { store, guard }
    }

    /// Instructor of record or admin only.
    pub async fn course_statistics(
        &self,
        caller: &Caller,
        course_id: Uuid,
    ) -> AppResult<CourseStatistics> {
        self.guard.authorize_write(caller, course_id).await?;

        let total_modules = self.store.count_modules(course_id).await?;
        let students = self.store.enrolled_students(course_id).await?;
        let completions: HashMap<Uuid, i64> = self
            .store
            .completed_module_counts(course_id)
            .await?
            .into_iter()
            .collect();

        let stats = rollup(course_id, total_modules, students, &completions);
        tracing::debug!(
            course_id = %course_id,
            total_modules,
            students = stats.student_progress.len(),
            average_progress = stats.average_progress,
            "Computed course statistics"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str) -> EnrolledStudent {
        EnrolledStudent {
            user_id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    #[test]
    fn overall_progress_rounds_to_nearest() {
        assert_eq!(overall_progress(1, 2), 50);
        assert_eq!(overall_progress(1, 3), 33);
        assert_eq!(overall_progress(2, 3), 67);
        assert_eq!(overall_progress(3, 3), 100);
        assert_eq!(overall_progress(0, 0), 0);
    }

    #[test]
    fn no_students_yields_zeros() {
        let stats = rollup(Uuid::new_v4(), 4, Vec::new(), &HashMap::new());
        assert_eq!(stats.total_modules, 4);
        assert_eq!(stats.completed_modules, 0);
        assert_eq!(stats.average_progress, 0);
        assert!(stats.student_progress.is_empty());
    }

    #[test]
    fn no_modules_yields_zero_progress_per_student() {
        let stats = rollup(Uuid::new_v4(), 0, vec![student("Alice")], &HashMap::new());
        assert_eq!(stats.student_progress[0].overall_progress, 0);
        assert_eq!(stats.average_progress, 0);
    }

    #[test]
    fn aggregates_completions_and_ignores_unenrolled_users() {
        let alice = student("Alice");
        let bob = student("Bob");
        let mut completions = HashMap::new();
        completions.insert(alice.user_id, 2);
        completions.insert(bob.user_id, 1);
        completions.insert(Uuid::new_v4(), 3); // left the course

        let stats = rollup(Uuid::new_v4(), 3, vec![alice, bob], &completions);

        assert_eq!(stats.completed_modules, 3);
        assert_eq!(stats.student_progress[0].overall_progress, 67);
        assert_eq!(stats.student_progress[1].overall_progress, 33);
        assert_eq!(stats.average_progress, 50);
    }
}
