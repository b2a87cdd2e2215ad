use std::sync::Arc;

use serde::Serialize;

use crate::config::RunnerConfig;
use crate::database::{Task, TestCase};
use crate::sandbox::{Executor, ProcessOutput, RunError, ScriptWorkspace};

use super::normalize;

const EMPTY_CODE: &str = "code must not be empty";
const NO_TEST_CASES: &str = "no test cases for task";
const APPROXIMATE_NOTE: &str = "approximate check, interpreter unavailable";
const INFRASTRUCTURE_NOTE: &str =
    "The interpreter could not be run; this is a grading infrastructure problem, not a fault in your code.";

/// Verdict for a single test case
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    pub message: String,
    /// The host, not the submission, prevented this test from running
    #[serde(skip)]
    pub infrastructure: bool,
}

impl TestOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            infrastructure: false,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            infrastructure: false,
        }
    }
}

/// Aggregate verdict of one grading run
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub all_passed: bool,
    pub passed_count: u32,
    pub total_count: u32,
    pub message: String,
    pub test_results: Vec<TestOutcome>,
}

impl RunResult {
    /// A run that stopped before any test case executed
    fn rejected(message: impl Into<String>, total_count: u32) -> Self {
        Self {
            all_passed: false,
            passed_count: 0,
            total_count,
            message: message.into(),
            test_results: Vec::new(),
        }
    }

    fn from_outcomes(test_results: Vec<TestOutcome>, approximate: bool) -> Self {
        let total_count = test_results.len() as u32;
        let passed_count = test_results.iter().filter(|t| t.passed).count() as u32;
        let all_passed = passed_count == total_count;

        let mut message = match (all_passed, approximate) {
            (true, false) => "All tests passed.".to_string(),
            (false, false) => format!("Passed {passed_count} of {total_count} tests."),
            (true, true) => format!("All tests passed ({APPROXIMATE_NOTE})."),
            (false, true) => {
                format!("Passed {passed_count} of {total_count} tests ({APPROXIMATE_NOTE}).")
            }
        };
        if test_results.iter().any(|t| t.infrastructure) {
            message.push(' ');
            message.push_str(INFRASTRUCTURE_NOTE);
        }

        Self {
            all_passed,
            passed_count,
            total_count,
            message,
            test_results,
        }
    }
}

/// Produces a verdict for submitted code against the test cases of a task
pub struct Grader {
    executor: Arc<dyn Executor>,
    config: RunnerConfig,
}

impl Grader {
    pub fn new(executor: Arc<dyn Executor>, config: RunnerConfig) -> Self {
        Self { executor, config }
    }

    /// Whether verdicts come from substring matching instead of execution
    pub fn is_degraded(&self) -> bool {
        !self.config.use_real_runner
    }

    /// Grades `code` against every test case of `task`, in stored order
    ///
    /// Never fails: infrastructure problems become a non-passing result whose
    /// message says the code was not at fault.
    pub async fn grade_submission(&self, task: &Task, code: &str) -> RunResult {
        if code.trim().is_empty() {
            return RunResult::rejected(EMPTY_CODE, 0);
        }
        if task.test_cases.is_empty() {
            return RunResult::rejected(NO_TEST_CASES, 0);
        }

        if self.is_degraded() {
            return grade_by_containment(task, code);
        }
        self.grade_by_execution(task, code).await
    }

    async fn grade_by_execution(&self, task: &Task, code: &str) -> RunResult {
        let total = task.test_cases.len() as u32;

        // One script for the whole run; removed when `workspace` drops
        let workspace = match ScriptWorkspace::create(
            &self.config.work_root(),
            &self.config.script_file_name,
            code,
        ) {
            Ok(workspace) => workspace,
            Err(e) => {
                log::error!("Cannot prepare a run for task {}: {e}", task.id);
                return RunResult::rejected(
                    "Grading infrastructure error: the submission could not be prepared \
                     for execution. Your code was not run.",
                    total,
                );
            }
        };

        let mut outcomes = Vec::with_capacity(task.test_cases.len());
        for (idx, case) in task.test_cases.iter().enumerate() {
            let outcome = self
                .executor
                .run(
                    workspace.script(),
                    workspace.dir(),
                    &case.input,
                    self.config.timeout(),
                )
                .await;
            outcomes.push(judge_case(task.id, idx, case, outcome));
        }

        RunResult::from_outcomes(outcomes, false)
    }
}

/// Turns one execution outcome into a test verdict
fn judge_case(
    task_id: u32,
    idx: usize,
    case: &TestCase,
    outcome: Result<ProcessOutput, RunError>,
) -> TestOutcome {
    let expected = normalize(Some(&case.expected_output));

    let output = match outcome {
        Ok(output) => output,
        Err(e) => {
            log::info!("Task {task_id} test {idx}: execution error: {e}");
            let mut verdict = TestOutcome::fail(format!("Execution error: {e}"));
            verdict.infrastructure = e.is_infrastructure();
            return verdict;
        }
    };

    if output.error {
        let stderr = output.stderr_text();
        let detail = match (stderr.trim(), output.exit_code) {
            (text, _) if !text.is_empty() => text.to_string(),
            (_, Some(code)) => format!("exit code {code}"),
            (_, None) => "terminated by a signal".to_string(),
        };
        log::info!("Task {task_id} test {idx}: execution error: {detail}");
        return TestOutcome::fail(format!("Execution error: {detail}"));
    }

    let mut actual = normalize(Some(&output.stdout_text()));
    // Some interpreters route regular output through stderr
    if actual.is_empty() {
        let stderr = output.stderr_text();
        if !stderr.trim().is_empty() {
            actual = normalize(Some(&stderr));
            log::debug!("Task {task_id} test {idx}: using stderr as output: [{actual}]");
        }
    }

    log::info!(
        "Task {task_id} test {idx}: expected=[{expected}], actual=[{actual}], exit code {:?}",
        output.exit_code
    );

    if actual == expected {
        TestOutcome::pass("OK")
    } else {
        TestOutcome::fail(format!("Expected: «{expected}», got: «{actual}»"))
    }
}

/// Degraded mode: a test passes when its expected output occurs in the code text
///
/// Trivially gameable. Only reachable with `use_real_runner = false`.
fn grade_by_containment(task: &Task, code: &str) -> RunResult {
    log::warn!("Grading task {} by substring containment", task.id);

    let outcomes = task
        .test_cases
        .iter()
        .map(|case| {
            let expected = normalize(Some(&case.expected_output));
            if code.contains(&expected) {
                TestOutcome::pass(format!("OK ({APPROXIMATE_NOTE})"))
            } else {
                TestOutcome::fail(format!(
                    "Expected output «{expected}» not found ({APPROXIMATE_NOTE})"
                ))
            }
        })
        .collect();

    RunResult::from_outcomes(outcomes, true)
}
