#![allow(dead_code)]

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use lesson_judge::config::RunnerConfig;
use lesson_judge::database as db;
use lesson_judge::grading::{Grader, SubmissionGate};
use lesson_judge::sandbox::Executor;

pub const HELLO: &str = "Привет, мир!";

/// A database living in its own temporary directory, removed on drop
pub struct TestDb {
    pub pool: SqlitePool,
    pub learner: u32,
    _dir: TempDir,
}

pub async fn create_test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_db(dir.path().join("test.sqlite3")).await.unwrap();
    let learner = db::create_user("learner", &pool).await.unwrap();

    TestDb {
        pool,
        learner,
        _dir: dir,
    }
}

/// Creates a task whose test cases all expect `expected` for empty input
pub async fn create_task(pool: &SqlitePool, title: &str, expected: &str, cases: usize) -> u32 {
    let topic = db::create_topic("Введение", "", 0, pool).await.unwrap();
    let task = db::create_task(topic, title, "statement", 0, pool)
        .await
        .unwrap();
    for _ in 0..cases {
        db::add_test_case(task, "", expected, pool).await.unwrap();
    }
    task
}

pub fn runner_config(work_root: &std::path::Path) -> RunnerConfig {
    RunnerConfig {
        timeout_seconds: 2,
        work_dir: Some(work_root.to_path_buf()),
        ..RunnerConfig::default()
    }
}

pub fn create_gate(
    pool: &SqlitePool,
    executor: Arc<dyn Executor>,
    work_root: &std::path::Path,
) -> SubmissionGate {
    let grader = Grader::new(executor, runner_config(work_root));
    SubmissionGate::new(pool.clone(), grader, 4)
}

pub async fn count_attempts(
    pool: &SqlitePool,
    user_id: u32,
    task_id: u32,
    passed_only: bool,
) -> i64 {
    let sql = if passed_only {
        "SELECT COUNT(*) FROM attempts WHERE user_id = ? AND task_id = ? AND passed = 1"
    } else {
        "SELECT COUNT(*) FROM attempts WHERE user_id = ? AND task_id = ?"
    };
    sqlx::query_scalar(sql)
        .bind(user_id)
        .bind(task_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
