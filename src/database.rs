use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use crate::create_timestamp;

const DATABASE_NAME: &str = "lesson-judge.sqlite3";

/// One (input, expected output) pair of a task
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: u32,
    pub input: String,
    pub expected_output: String,
}

/// A graded exercise with its test cases in insertion order
#[derive(sqlx::FromRow, Serialize, Debug, Clone, Default)]
pub struct Task {
    pub id: u32,
    pub topic_id: u32,
    pub title: String,
    pub statement: String,
    #[sqlx(skip)]
    pub test_cases: Vec<TestCase>,
}

/// A topic as shown to learners browsing the course
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Topic {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub sort_order: i64,
    pub has_tasks: bool,
}

/// Public projection of a task, without its test data
#[derive(sqlx::FromRow, Serialize, Debug)]
pub struct TaskView {
    pub id: u32,
    pub topic_id: u32,
    pub topic_title: String,
    pub title: String,
    pub statement: String,
    pub test_case_count: u32,
}

/// Fields of an attempt known before it is stored
#[derive(Debug)]
pub struct NewAttempt<'a> {
    pub user_id: u32,
    pub task_id: u32,
    pub code: &'a str,
    pub passed: bool,
    pub passed_tests: u32,
    pub total_tests: u32,
    pub message: &'a str,
}

/// An attempt as stored; never modified after insertion
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: u32,
    pub user_id: u32,
    pub task_id: u32,
    pub code: String,
    pub passed: bool,
    pub passed_tests: u32,
    pub total_tests: u32,
    pub message: String,
    pub created_time: String,
}

/// An attempt joined with the titles of its task and topic
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct AttemptView {
    pub id: u32,
    #[serde(skip)]
    pub user_id: u32,
    pub task_id: u32,
    pub task_title: String,
    pub topic_id: u32,
    pub topic_title: String,
    pub code: String,
    pub passed: bool,
    pub passed_tests: u32,
    pub total_tests: u32,
    pub message: String,
    pub created_time: String,
}

pub fn get_db_path() -> anyhow::Result<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "lesson-judge")
        .ok_or_else(|| anyhow::anyhow!("Unable to find user directory"))?;
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir)?;

    Ok(data_dir.join(DATABASE_NAME))
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display()); // rwc = read/write/create
    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .min_connections(0)
        .connect(&db_url)
        .await?;

    // PRAGMA statements cannot run inside a transaction
    for pragma_sql in &[
        "PRAGMA foreign_keys = ON;",
        "PRAGMA busy_timeout = 2000;", // 2 seconds timeout for lock contention
        "PRAGMA journal_mode = WAL;",
        "PRAGMA synchronous = NORMAL;",
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY,
            name          TEXT    NOT NULL UNIQUE
        );",
        r"
        CREATE TABLE IF NOT EXISTS topics (
            id            INTEGER PRIMARY KEY,
            title         TEXT    NOT NULL,
            description   TEXT    NOT NULL DEFAULT '',
            sort_order    INTEGER NOT NULL DEFAULT 0
        );",
        r"
        CREATE TABLE IF NOT EXISTS tasks (
            id            INTEGER PRIMARY KEY,
            topic_id      INTEGER NOT NULL,
            title         TEXT    NOT NULL,
            statement     TEXT    NOT NULL DEFAULT '',
            sort_order    INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (topic_id)  REFERENCES topics (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS test_cases (
            id              INTEGER PRIMARY KEY,
            task_id         INTEGER NOT NULL,
            input           TEXT    NOT NULL DEFAULT '',
            expected_output TEXT    NOT NULL,
            FOREIGN KEY (task_id)  REFERENCES tasks (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS attempts (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL,
            task_id       INTEGER NOT NULL,
            code          TEXT    NOT NULL,
            passed        INTEGER NOT NULL,
            passed_tests  INTEGER NOT NULL,
            total_tests   INTEGER NOT NULL,
            message       TEXT    NOT NULL,
            created_time  TEXT    NOT NULL,
            FOREIGN KEY (user_id)  REFERENCES users (id),
            FOREIGN KEY (task_id)  REFERENCES tasks (id)
        );",
        // At most one passing attempt per (user, task)
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_attempts_single_pass
            ON attempts (user_id, task_id) WHERE passed = 1;",
        "CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts (user_id, created_time);",
        "CREATE INDEX IF NOT EXISTS idx_test_cases_task ON test_cases (task_id);",
        "INSERT OR IGNORE INTO users (id, name) VALUES (0, 'root');",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // Remove WAL and SHM files (ignore errors as they might not exist)
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

pub async fn find_user(id: u32, pool: &SqlitePool) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn create_user(name: &str, pool: &SqlitePool) -> sqlx::Result<u32> {
    let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid() as u32)
}

pub async fn create_topic(
    title: &str,
    description: &str,
    sort_order: i64,
    pool: &SqlitePool,
) -> sqlx::Result<u32> {
    let result =
        sqlx::query("INSERT INTO topics (title, description, sort_order) VALUES (?, ?, ?)")
            .bind(title)
            .bind(description)
            .bind(sort_order)
            .execute(pool)
            .await?;

    Ok(result.last_insert_rowid() as u32)
}

pub async fn create_task(
    topic_id: u32,
    title: &str,
    statement: &str,
    sort_order: i64,
    pool: &SqlitePool,
) -> sqlx::Result<u32> {
    let result = sqlx::query(
        "INSERT INTO tasks (topic_id, title, statement, sort_order) VALUES (?, ?, ?, ?)",
    )
    .bind(topic_id)
    .bind(title)
    .bind(statement)
    .bind(sort_order)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid() as u32)
}

pub async fn find_task(id: u32, pool: &SqlitePool) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn add_test_case(
    task_id: u32,
    input: &str,
    expected_output: &str,
    pool: &SqlitePool,
) -> sqlx::Result<u32> {
    let result =
        sqlx::query("INSERT INTO test_cases (task_id, input, expected_output) VALUES (?, ?, ?)")
            .bind(task_id)
            .bind(input)
            .bind(expected_output)
            .execute(pool)
            .await?;

    Ok(result.last_insert_rowid() as u32)
}

/// Loads a task together with its test cases, or `None` when it does not exist
pub async fn get_task(id: u32, pool: &SqlitePool) -> sqlx::Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(
        "SELECT id, topic_id, title, statement FROM tasks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(mut task) = task else {
        return Ok(None);
    };
    task.test_cases = list_test_cases(id, pool).await?;

    log::debug!(
        "Fetched task {id} with {} test cases",
        task.test_cases.len()
    );
    Ok(Some(task))
}

/// Test cases of a task in insertion order
pub async fn list_test_cases(task_id: u32, pool: &SqlitePool) -> sqlx::Result<Vec<TestCase>> {
    sqlx::query_as::<_, TestCase>(
        "SELECT id, input, expected_output FROM test_cases WHERE task_id = ? ORDER BY id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}

pub async fn count_test_cases(task_id: u32, pool: &SqlitePool) -> sqlx::Result<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM test_cases WHERE task_id = ?")
        .bind(task_id)
        .fetch_one(pool)
        .await?;

    Ok(count as u32)
}

const TASK_VIEW_SELECT: &str = "SELECT t.id, t.topic_id, tp.title AS topic_title, t.title, \
     t.statement, (SELECT COUNT(*) FROM test_cases tc WHERE tc.task_id = t.id) AS test_case_count \
     FROM tasks t JOIN topics tp ON tp.id = t.topic_id";

pub async fn fetch_task_view(id: u32, pool: &SqlitePool) -> sqlx::Result<Option<TaskView>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(TASK_VIEW_SELECT);
    qb.push(" WHERE t.id = ").push_bind(id);

    qb.build_query_as::<TaskView>().fetch_optional(pool).await
}

/// Tasks of a topic in course order
pub async fn list_topic_tasks(topic_id: u32, pool: &SqlitePool) -> sqlx::Result<Vec<TaskView>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(TASK_VIEW_SELECT);
    qb.push(" WHERE t.topic_id = ").push_bind(topic_id);
    qb.push(" ORDER BY t.sort_order, t.id");

    qb.build_query_as::<TaskView>().fetch_all(pool).await
}

const TOPIC_SELECT: &str = "SELECT tp.id, tp.title, tp.description, tp.sort_order, \
     EXISTS (SELECT 1 FROM tasks t WHERE t.topic_id = tp.id) AS has_tasks FROM topics tp";

pub async fn list_topics(pool: &SqlitePool) -> sqlx::Result<Vec<Topic>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(TOPIC_SELECT);
    qb.push(" ORDER BY tp.sort_order, tp.id");

    qb.build_query_as::<Topic>().fetch_all(pool).await
}

pub async fn fetch_topic(id: u32, pool: &SqlitePool) -> sqlx::Result<Option<Topic>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(TOPIC_SELECT);
    qb.push(" WHERE tp.id = ").push_bind(id);

    qb.build_query_as::<Topic>().fetch_optional(pool).await
}

pub async fn has_passing_attempt(
    user_id: u32,
    task_id: u32,
    pool: &SqlitePool,
) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM attempts WHERE user_id = ? AND task_id = ? AND passed = 1")
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Stores a new attempt, assigning its id and creation time
///
/// # Errors
///
/// Fails with a unique-violation database error when `attempt` passed and the
/// user already has a passing attempt for the task.
pub async fn save_attempt(
    attempt: &NewAttempt<'_>,
    pool: &SqlitePool,
) -> sqlx::Result<AttemptRecord> {
    let now = create_timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO attempts
            (user_id, task_id, code, passed, passed_tests, total_tests, message, created_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attempt.user_id)
    .bind(attempt.task_id)
    .bind(attempt.code)
    .bind(attempt.passed)
    .bind(attempt.passed_tests)
    .bind(attempt.total_tests)
    .bind(attempt.message)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(AttemptRecord {
        id: result.last_insert_rowid() as u32,
        user_id: attempt.user_id,
        task_id: attempt.task_id,
        code: attempt.code.to_string(),
        passed: attempt.passed,
        passed_tests: attempt.passed_tests,
        total_tests: attempt.total_tests,
        message: attempt.message.to_string(),
        created_time: now,
    })
}

const ATTEMPT_VIEW_SELECT: &str = "SELECT a.id, a.user_id, a.task_id, t.title AS task_title, \
     t.topic_id, tp.title AS topic_title, a.code, a.passed, a.passed_tests, a.total_tests, \
     a.message, a.created_time \
     FROM attempts a JOIN tasks t ON t.id = a.task_id JOIN topics tp ON tp.id = t.topic_id";

/// Attempts of a user, optionally narrowed to one task, newest first
pub async fn list_attempts(
    user_id: u32,
    task_id: Option<u32>,
    pool: &SqlitePool,
) -> sqlx::Result<Vec<AttemptView>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(ATTEMPT_VIEW_SELECT);

    qb.push(" WHERE a.user_id = ").push_bind(user_id);
    if let Some(task_id) = task_id {
        qb.push(" AND a.task_id = ").push_bind(task_id);
    }
    qb.push(" ORDER BY a.created_time DESC, a.id DESC");

    qb.build_query_as::<AttemptView>().fetch_all(pool).await
}

pub async fn fetch_attempt(id: u32, pool: &SqlitePool) -> sqlx::Result<Option<AttemptView>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(ATTEMPT_VIEW_SELECT);
    qb.push(" WHERE a.id = ").push_bind(id);

    qb.build_query_as::<AttemptView>().fetch_optional(pool).await
}

/// Inserts the introductory topics and tasks unless topics already exist
///
/// Returns whether anything was inserted.
pub async fn seed_demo_data(pool: &SqlitePool) -> sqlx::Result<bool> {
    let topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
        .fetch_one(pool)
        .await?;
    if topics > 0 {
        return Ok(false);
    }

    let intro = create_topic(
        "Введение в язык 1С",
        "Базовые конструкции и типы данных",
        0,
        pool,
    )
    .await?;
    seed_task(
        intro,
        "Первая программа",
        "Напишите программу, которая выводит одну строку:\n\nПривет, мир!\n\n\
         Используйте процедуру Сообщить().",
        "Привет, мир!",
        pool,
    )
    .await?;

    let control_flow =
        create_topic("Условия и циклы", "Если-Тогда, циклы Для и Пока", 1, pool).await?;
    seed_task(
        control_flow,
        "Вывод числа",
        "Напишите программу, которая выводит число 42.",
        "42",
        pool,
    )
    .await?;
    seed_task(
        control_flow,
        "Строка результата",
        "Выведите одну строку (ровно):\n\nГотово.",
        "Готово.",
        pool,
    )
    .await?;

    let procedures = create_topic(
        "Процедуры и функции",
        "Объявление и вызов процедур, возврат значения",
        2,
        pool,
    )
    .await?;
    seed_task(
        procedures,
        "Вывод приветствия",
        "Напишите программу, которая выводит строку: Добрый день!",
        "Добрый день!",
        pool,
    )
    .await?;

    log::info!("Seeded demo topics and tasks");
    Ok(true)
}

async fn seed_task(
    topic_id: u32,
    title: &str,
    statement: &str,
    expected_output: &str,
    pool: &SqlitePool,
) -> sqlx::Result<u32> {
    let task_id = create_task(topic_id, title, statement, 0, pool).await?;
    for _ in 0..4 {
        add_test_case(task_id, "", expected_output, pool).await?;
    }
    Ok(task_id)
}
