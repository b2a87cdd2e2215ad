mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use lesson_judge::database::{self as db, NewAttempt};
use lesson_judge::error::SubmitError;
use lesson_judge::sandbox::{ProcessOutput, ScriptedExecutor};

use common::{HELLO, count_attempts, create_gate, create_task, create_test_db};

// Prints the submitted source back, so the code itself is the program output
fn echoing() -> Arc<ScriptedExecutor> {
    Arc::new(ScriptedExecutor::new(|call| {
        Ok(ProcessOutput::success(call.source.clone()))
    }))
}

#[tokio::test]
async fn test_correct_submission_passes_every_case() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let executor = echoing();
    let gate = create_gate(&test_db.pool, executor.clone(), root.path());

    let result = gate.submit(test_db.learner, task, HELLO).await.unwrap();

    assert!(result.passed);
    assert_eq!((result.passed_tests, result.total_tests), (4, 4));
    assert_eq!(result.message, "All tests passed.");
    assert_eq!(executor.call_count(), 4);
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, true).await, 1);
}

#[tokio::test]
async fn test_wrong_case_fails_every_case() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let gate = create_gate(&test_db.pool, echoing(), root.path());

    let result = gate
        .submit(test_db.learner, task, "привет, мир!")
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!((result.passed_tests, result.total_tests), (0, 4));
    assert_eq!(result.message, "Passed 0 of 4 tests.");
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, false).await, 1);
}

#[tokio::test]
async fn test_too_few_test_cases_rejects_without_running() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Черновик", HELLO, 3).await;
    let executor = echoing();
    let gate = create_gate(&test_db.pool, executor.clone(), root.path());

    let err = gate.submit(test_db.learner, task, HELLO).await.unwrap_err();

    assert!(matches!(
        err,
        SubmitError::InsufficientTestCases {
            actual: 3,
            required: 4
        }
    ));
    assert_eq!(
        err.to_string(),
        "A task must have at least 4 test cases before accepting submissions. Currently: 3"
    );
    assert_eq!(executor.call_count(), 0);
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, false).await, 0);
}

#[tokio::test]
async fn test_minimum_is_checked_against_current_test_cases() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Черновик", HELLO, 3).await;
    let gate = create_gate(&test_db.pool, echoing(), root.path());

    let err = gate.submit(test_db.learner, task, HELLO).await.unwrap_err();
    assert!(matches!(err, SubmitError::InsufficientTestCases { actual: 3, .. }));

    db::add_test_case(task, "", HELLO, &test_db.pool).await.unwrap();
    assert_eq!(db::count_test_cases(task, &test_db.pool).await.unwrap(), 4);

    let result = gate.submit(test_db.learner, task, HELLO).await.unwrap();
    assert!(result.passed);
    assert_eq!(result.total_tests, 4);
}

#[tokio::test]
async fn test_unknown_user_or_task_is_not_found() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let executor = echoing();
    let gate = create_gate(&test_db.pool, executor.clone(), root.path());

    let err = gate.submit(999, task, HELLO).await.unwrap_err();
    assert!(matches!(err, SubmitError::NotFound(ref msg) if msg == "User 999 not found."));

    let err = gate.submit(test_db.learner, 999, HELLO).await.unwrap_err();
    assert!(matches!(err, SubmitError::NotFound(ref msg) if msg == "Task 999 not found."));

    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn test_blank_code_is_rejected_without_an_attempt() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let executor = echoing();
    let gate = create_gate(&test_db.pool, executor.clone(), root.path());

    let err = gate.submit(test_db.learner, task, "  \n\t").await.unwrap_err();

    assert!(matches!(err, SubmitError::Validation(_)));
    assert_eq!(executor.call_count(), 0);
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, false).await, 0);
}

#[tokio::test]
async fn test_solved_task_refuses_resubmission() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let executor = echoing();
    let gate = create_gate(&test_db.pool, executor.clone(), root.path());

    gate.submit(test_db.learner, task, HELLO).await.unwrap();
    let err = gate.submit(test_db.learner, task, HELLO).await.unwrap_err();

    assert!(matches!(err, SubmitError::AlreadySolved));
    assert_eq!(
        err.to_string(),
        "Task already solved. Resubmission is not available."
    );
    // The second submission never reached the interpreter
    assert_eq!(executor.call_count(), 4);
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, false).await, 1);
}

#[tokio::test]
async fn test_failed_attempts_can_be_retried() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let gate = create_gate(&test_db.pool, echoing(), root.path());

    let first = gate.submit(test_db.learner, task, "Привет").await.unwrap();
    let second = gate.submit(test_db.learner, task, "Привет, мир").await.unwrap();
    let third = gate.submit(test_db.learner, task, HELLO).await.unwrap();

    assert!(!first.passed);
    assert!(!second.passed);
    assert!(third.passed);

    let attempts = db::list_attempts(test_db.learner, Some(task), &test_db.pool)
        .await
        .unwrap();
    let ids: Vec<u32> = attempts.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![third.attempt_id, second.attempt_id, first.attempt_id]);
    assert_eq!(attempts[0].code, HELLO);
    assert_eq!(attempts[0].task_title, "Первая программа");
}

#[tokio::test]
async fn test_other_users_are_independent() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let other = db::create_user("other", &test_db.pool).await.unwrap();
    let gate = create_gate(&test_db.pool, echoing(), root.path());

    gate.submit(test_db.learner, task, HELLO).await.unwrap();
    let result = gate.submit(other, task, HELLO).await.unwrap();

    assert!(result.passed);
    assert!(
        db::list_attempts(other, None, &test_db.pool)
            .await
            .unwrap()
            .iter()
            .all(|a| a.user_id == other)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_record_one_pass() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let gate = Arc::new(create_gate(&test_db.pool, echoing(), root.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let user = test_db.learner;
            tokio::spawn(async move { gate.submit(user, task, HELLO).await })
        })
        .collect();

    let mut passed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) if result.passed => passed += 1,
            Err(SubmitError::AlreadySolved) => refused += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!((passed, refused), (1, 7));
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, true).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_gates_on_one_database_record_one_pass() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;

    // Slow enough that both gates pass the "already solved" check before
    // either stores its attempt
    let slow = || {
        Arc::new(ScriptedExecutor::new(|call| {
            std::thread::sleep(Duration::from_millis(100));
            Ok(ProcessOutput::success(call.source.clone()))
        }))
    };
    let first = Arc::new(create_gate(&test_db.pool, slow(), root.path()));
    let second = Arc::new(create_gate(&test_db.pool, slow(), root.path()));

    let user = test_db.learner;
    let a = tokio::spawn(async move { first.submit(user, task, HELLO).await });
    let b = tokio::spawn(async move { second.submit(user, task, HELLO).await });
    let outcomes = [a.await.unwrap(), b.await.unwrap()];

    let passed = outcomes.iter().filter(|o| o.is_ok()).count();
    let refused = outcomes
        .iter()
        .filter(|o| matches!(o, Err(SubmitError::AlreadySolved)))
        .count();
    assert_eq!((passed, refused), (1, 1));
    assert_eq!(count_attempts(&test_db.pool, user, task, true).await, 1);
}

#[tokio::test]
async fn test_second_passing_attempt_violates_unique_index() {
    let test_db = create_test_db().await;
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let attempt = NewAttempt {
        user_id: test_db.learner,
        task_id: task,
        code: HELLO,
        passed: true,
        passed_tests: 4,
        total_tests: 4,
        message: "All tests passed.",
    };

    db::save_attempt(&attempt, &test_db.pool).await.unwrap();
    let err = db::save_attempt(&attempt, &test_db.pool).await.unwrap_err();

    assert!(
        err.as_database_error()
            .is_some_and(|e| e.is_unique_violation())
    );

    // Failing attempts are never constrained
    let failing = NewAttempt {
        passed: false,
        passed_tests: 0,
        message: "Passed 0 of 4 tests.",
        ..attempt
    };
    db::save_attempt(&failing, &test_db.pool).await.unwrap();
    db::save_attempt(&failing, &test_db.pool).await.unwrap();
    assert_eq!(count_attempts(&test_db.pool, test_db.learner, task, false).await, 3);
}

#[tokio::test]
async fn test_demo_tasks_accept_submissions() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();

    assert!(db::seed_demo_data(&test_db.pool).await.unwrap());
    assert!(!db::seed_demo_data(&test_db.pool).await.unwrap());

    let task = db::get_task(1, &test_db.pool).await.unwrap().unwrap();
    assert_eq!(task.title, "Первая программа");
    assert_eq!(task.test_cases.len(), 4);
    assert_eq!(db::count_test_cases(1, &test_db.pool).await.unwrap(), 4);

    let gate = create_gate(&test_db.pool, echoing(), root.path());
    let result = gate.submit(test_db.learner, 1, HELLO).await.unwrap();
    assert!(result.passed);
}

#[tokio::test]
async fn test_work_root_is_left_empty() {
    let test_db = create_test_db().await;
    let root = tempfile::tempdir().unwrap();
    let task = create_task(&test_db.pool, "Первая программа", HELLO, 4).await;
    let gate = create_gate(&test_db.pool, echoing(), root.path());

    gate.submit(test_db.learner, task, "Пока").await.unwrap();

    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}
