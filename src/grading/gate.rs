use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::database::{self as db, AttemptRecord, NewAttempt};
use crate::error::SubmitError;

use super::{Grader, KeyedLocks};

/// What the caller learns about a recorded attempt
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub attempt_id: u32,
    pub passed: bool,
    pub passed_tests: u32,
    pub total_tests: u32,
    pub message: String,
    pub created_at: String,
}

impl From<AttemptRecord> for AttemptResult {
    fn from(record: AttemptRecord) -> Self {
        Self {
            attempt_id: record.id,
            passed: record.passed,
            passed_tests: record.passed_tests,
            total_tests: record.total_tests,
            message: record.message,
            created_at: record.created_time,
        }
    }
}

/// Decides whether a submission may be graded, grades it and records the attempt
///
/// For one (user, task) pair the "already solved" check, the grading run and
/// the attempt insert happen under a single lock, so concurrent submissions
/// cannot both slip past the check. The partial unique index on passing
/// attempts backs this up for writers outside this process.
pub struct SubmissionGate {
    pool: SqlitePool,
    grader: Grader,
    min_test_cases: u32,
    locks: KeyedLocks<(u32, u32)>,
}

impl SubmissionGate {
    pub fn new(pool: SqlitePool, grader: Grader, min_test_cases: u32) -> Self {
        Self {
            pool,
            grader,
            min_test_cases,
            locks: KeyedLocks::new(),
        }
    }

    pub fn grader(&self) -> &Grader {
        &self.grader
    }

    pub async fn submit(
        &self,
        user_id: u32,
        task_id: u32,
        code: &str,
    ) -> Result<AttemptResult, SubmitError> {
        if !db::find_user(user_id, &self.pool).await? {
            return Err(SubmitError::NotFound(format!("User {user_id} not found.")));
        }
        if !db::find_task(task_id, &self.pool).await? {
            return Err(SubmitError::NotFound(format!("Task {task_id} not found.")));
        }

        let _guard = self.locks.lock((user_id, task_id)).await;

        if db::has_passing_attempt(user_id, task_id, &self.pool).await? {
            log::info!("Rejected submission of user {user_id} for solved task {task_id}");
            return Err(SubmitError::AlreadySolved);
        }

        let count = db::count_test_cases(task_id, &self.pool).await?;
        if count < self.min_test_cases {
            log::info!("Rejected submission for task {task_id} with only {count} test cases");
            return Err(SubmitError::InsufficientTestCases {
                actual: count,
                required: self.min_test_cases,
            });
        }

        if code.trim().is_empty() {
            return Err(SubmitError::Validation("code must not be empty".to_string()));
        }

        let Some(task) = db::get_task(task_id, &self.pool).await? else {
            return Err(SubmitError::NotFound(format!("Task {task_id} not found.")));
        };
        let result = self.grader.grade_submission(&task, code).await;
        log::info!(
            "User {user_id} task {task_id}: {}/{} passed",
            result.passed_count,
            result.total_count
        );

        let attempt = NewAttempt {
            user_id,
            task_id,
            code,
            passed: result.all_passed,
            passed_tests: result.passed_count,
            total_tests: result.total_count,
            message: &result.message,
        };
        let record = db::save_attempt(&attempt, &self.pool)
            .await
            .map_err(|e| {
                let duplicate_pass = e
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation());
                if duplicate_pass {
                    log::warn!("Passing attempt for user {user_id} task {task_id} already stored");
                    SubmitError::AlreadySolved
                } else {
                    log::error!("Failed to save attempt for user {user_id} task {task_id}: {e}");
                    SubmitError::Storage(e)
                }
            })?;

        log::info!("Saved attempt {} for user {user_id} task {task_id}", record.id);
        Ok(record.into())
    }
}
