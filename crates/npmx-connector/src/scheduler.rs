//! Dependency-aware wave scheduler
//!
//! Approved operations run in waves. Each wave is every approved operation
//! whose predecessor (if any) has completed; the whole wave is dispatched at
//! once and the scheduler waits for all of it before computing the next one.
//!
//! - An operation whose predecessor failed is failed without running, with
//!   the reason recorded. Dependents of that operation follow on the next
//!   pass, so the failure cascades down the chain.
//! - Once any result asks for a one-time password and the call carried none,
//!   no further wave starts. Operations not yet run stay `approved` and are
//!   picked up by the next call, which is expected to bring an OTP.

use std::collections::HashSet;

use futures::future::join_all;

use npmx_core::api::{ExecuteResponse, OperationOutcome};
use npmx_core::{ExecutionResult, Operation, OperationId, OperationStatus};

use crate::executor::CommandExecutor;
use crate::store::OperationStore;

/// What a pass over the store found
struct Wave {
    ready: Vec<Operation>,
    skipped: usize,
}

/// Run every reachable approved operation to completion
pub async fn run(
    store: &OperationStore,
    executor: &dyn CommandExecutor,
    otp: Option<&str>,
) -> ExecuteResponse {
    let mut summary = ExecuteResponse::default();
    let mut wave_number = 0;

    loop {
        let wave = next_wave(store, &mut summary);

        if wave.ready.is_empty() {
            if wave.skipped > 0 {
                continue;
            }
            break;
        }

        if summary.otp_required && otp.is_none() {
            tracing::info!(
                "Stopping before {} operations: waiting for a one-time password",
                wave.ready.len()
            );
            break;
        }

        wave_number += 1;
        tracing::info!("Wave {}: running {} operations", wave_number, wave.ready.len());

        let mut dispatched = Vec::with_capacity(wave.ready.len());
        for op in wave.ready {
            if let Err(e) = store.start(&op.id) {
                // Deleted or changed since the snapshot
                tracing::debug!("Not starting {}: {}", op.id, e);
                continue;
            }
            dispatched.push(op);
        }

        let results = join_all(
            dispatched
                .iter()
                .map(|op| execute_one(executor, op, otp)),
        )
        .await;

        for (op, result) in dispatched.iter().zip(results) {
            record(store, &mut summary, &op.id, result);
        }
    }

    summary
}

/// Compute the next ready set, failing dependents of failed operations
fn next_wave(store: &OperationStore, summary: &mut ExecuteResponse) -> Wave {
    let snapshot = store.list();
    let known: HashSet<&OperationId> = snapshot.iter().map(|op| &op.id).collect();
    let mut completed: HashSet<OperationId> = HashSet::new();
    let mut failed: HashSet<OperationId> = HashSet::new();
    for op in &snapshot {
        match op.status {
            OperationStatus::Completed => {
                completed.insert(op.id.clone());
            }
            OperationStatus::Failed => {
                failed.insert(op.id.clone());
            }
            _ => {}
        }
    }

    let mut wave = Wave {
        ready: Vec::new(),
        skipped: 0,
    };

    for op in snapshot
        .iter()
        .filter(|op| op.status == OperationStatus::Approved)
    {
        match &op.depends_on {
            None => wave.ready.push(op.clone()),
            Some(dep) if completed.contains(dep) => wave.ready.push(op.clone()),
            Some(dep) if failed.contains(dep) => {
                if let Ok(skipped) = store.skip(&op.id) {
                    tracing::info!("Skipping {}: dependency {} failed", op.id, dep);
                    if let Some(result) = skipped.result {
                        summary.results.push(OperationOutcome {
                            id: skipped.id,
                            result,
                        });
                    }
                    wave.skipped += 1;
                }
            }
            Some(dep) if !known.contains(dep) => {
                tracing::warn!("Operation {} depends on unknown operation {}", op.id, dep);
            }
            Some(_) => {}
        }
    }

    wave
}

async fn execute_one(
    executor: &dyn CommandExecutor,
    op: &Operation,
    otp: Option<&str>,
) -> ExecutionResult {
    let command = match op.npm_command() {
        Ok(command) => command,
        Err(e) => return ExecutionResult::failure(e.to_string()),
    };

    tracing::debug!("Executing {} ({})", op.id, op.kind);
    executor.execute(&command, otp).await
}

fn record(
    store: &OperationStore,
    summary: &mut ExecuteResponse,
    id: &OperationId,
    result: ExecutionResult,
) {
    summary.otp_required |= result.requires_otp;
    summary.auth_failure |= result.auth_failure;

    if result.is_success() {
        tracing::info!("Operation {} completed", id);
    } else {
        tracing::info!("Operation {} failed (exit code {})", id, result.exit_code);
    }

    // Running operations cannot be deleted, so the record is still there
    if let Err(e) = store.finish(id, result.clone()) {
        tracing::error!("Failed to record result for {}: {}", id, e);
    }
    summary.results.push(OperationOutcome {
        id: id.clone(),
        result,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use npmx_core::{NewOperation, NpmCommand, OperationKind, QueryError};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::executor::ReadQuery;

    /// Executor scripted per team name, recording calls in order
    #[derive(Default)]
    struct ScriptedExecutor {
        results: Mutex<HashMap<String, ExecutionResult>>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedExecutor {
        fn respond(&self, team: &str, result: ExecutionResult) {
            self.results.lock().insert(team.to_string(), result);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    fn team_of(command: &NpmCommand) -> String {
        match command {
            NpmCommand::TeamCreate { scope_team } => scope_team.clone(),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, command: &NpmCommand, otp: Option<&str>) -> ExecutionResult {
            let team = team_of(command);
            self.calls
                .lock()
                .push((team.clone(), otp.map(str::to_string)));
            if let Some(delay) = self.delays.get(&team) {
                tokio::time::sleep(*delay).await;
            }
            self.results
                .lock()
                .get(&team)
                .cloned()
                .unwrap_or_default()
        }

        async fn whoami(&self) -> Option<String> {
            None
        }

        async fn query(&self, _query: &ReadQuery) -> Result<String, QueryError> {
            Ok(String::new())
        }
    }

    fn otp_challenge() -> ExecutionResult {
        ExecutionResult {
            exit_code: 1,
            requires_otp: true,
            ..ExecutionResult::failure("This operation requires a one-time password (OTP).")
        }
    }

    fn add(store: &OperationStore, team: &str, depends_on: Option<&OperationId>) -> OperationId {
        let op = store
            .add(NewOperation {
                kind: OperationKind::TeamCreate,
                params: [("scopeTeam".to_string(), team.to_string())].into(),
                description: format!("Create {}", team),
                command: format!("npm team create {}", team),
                depends_on: depends_on.cloned(),
            })
            .unwrap();
        store.approve(&op.id).unwrap();
        op.id
    }

    fn status(store: &OperationStore, id: &OperationId) -> OperationStatus {
        store.get(id).unwrap().status
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        let a = add(&store, "acme:a", None);
        let b = add(&store, "acme:b", Some(&a));

        let summary = run(&store, &executor, None).await;

        assert_eq!(status(&store, &a), OperationStatus::Completed);
        assert_eq!(status(&store, &b), OperationStatus::Completed);
        assert_eq!(executor.calls(), vec!["acme:a", "acme:b"]);
        assert_eq!(summary.results.len(), 2);
        assert!(!summary.otp_required && !summary.auth_failure);
    }

    #[tokio::test]
    async fn test_failure_cascades_without_executing() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond("acme:a", ExecutionResult::failure("npm ERR! 404 Not Found"));
        let a = add(&store, "acme:a", None);
        let b = add(&store, "acme:b", Some(&a));
        let c = add(&store, "acme:c", Some(&b));

        let summary = run(&store, &executor, None).await;

        assert_eq!(executor.calls(), vec!["acme:a"]);
        let a_op = store.get(&a).unwrap();
        assert_eq!(a_op.status, OperationStatus::Failed);
        assert_eq!(a_op.result.unwrap().stderr, "npm ERR! 404 Not Found");
        for id in [&b, &c] {
            let op = store.get(id).unwrap();
            assert_eq!(op.status, OperationStatus::Failed);
            assert_eq!(op.result.unwrap().stderr, npmx_core::types::DEPENDENCY_FAILED);
        }
        assert_eq!(summary.results.len(), 3);
    }

    #[tokio::test]
    async fn test_previously_failed_dependency_cascades() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond("acme:a", ExecutionResult::failure("boom"));
        let a = add(&store, "acme:a", None);
        run(&store, &executor, None).await;

        let b = add(&store, "acme:b", Some(&a));
        run(&store, &executor, None).await;

        assert_eq!(status(&store, &b), OperationStatus::Failed);
        assert_eq!(executor.calls(), vec!["acme:a"]);
    }

    #[tokio::test]
    async fn test_previously_completed_dependency_is_satisfied() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        let a = add(&store, "acme:a", None);
        run(&store, &executor, None).await;

        let b = add(&store, "acme:b", Some(&a));
        run(&store, &executor, None).await;

        assert_eq!(status(&store, &b), OperationStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_operations_run_concurrently() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor {
            delays: [
                ("acme:a".to_string(), Duration::from_millis(300)),
                ("acme:b".to_string(), Duration::from_millis(100)),
                ("acme:c".to_string(), Duration::from_millis(200)),
            ]
            .into(),
            ..Default::default()
        };
        add(&store, "acme:a", None);
        add(&store, "acme:b", None);
        add(&store, "acme:c", None);

        let started = tokio::time::Instant::now();
        let summary = run(&store, &executor, None).await;
        let elapsed = started.elapsed();

        assert_eq!(summary.results.len(), 3);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waves_are_sequential() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor {
            delays: [
                ("acme:a".to_string(), Duration::from_millis(100)),
                ("acme:b".to_string(), Duration::from_millis(100)),
            ]
            .into(),
            ..Default::default()
        };
        let a = add(&store, "acme:a", None);
        add(&store, "acme:b", Some(&a));

        let started = tokio::time::Instant::now();
        run(&store, &executor, None).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_otp_challenge_halts_later_waves() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond("acme:a", otp_challenge());
        let a = add(&store, "acme:a", None);
        let x = add(&store, "acme:x", None);
        let c = add(&store, "acme:c", Some(&x));

        let summary = run(&store, &executor, None).await;

        assert!(summary.otp_required);
        assert_eq!(status(&store, &a), OperationStatus::Failed);
        assert_eq!(status(&store, &x), OperationStatus::Completed);
        // x completed in the same wave, but the next wave never started
        assert_eq!(status(&store, &c), OperationStatus::Approved);
        assert_eq!(executor.calls(), vec!["acme:a", "acme:x"]);
    }

    #[tokio::test]
    async fn test_otp_retry_flow() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond("acme:c", otp_challenge());
        let c = add(&store, "acme:c", None);

        let summary = run(&store, &executor, None).await;
        assert!(summary.otp_required);
        assert_eq!(status(&store, &c), OperationStatus::Failed);

        store.retry(&c).unwrap();
        executor.respond("acme:c", ExecutionResult::default());
        let summary = run(&store, &executor, Some("123456")).await;

        assert!(!summary.otp_required);
        assert_eq!(status(&store, &c), OperationStatus::Completed);
        let calls = executor.calls.lock().clone();
        assert_eq!(calls[1], ("acme:c".to_string(), Some("123456".to_string())));
    }

    #[tokio::test]
    async fn test_otp_supplied_keeps_going() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond("acme:a", otp_challenge());
        let a = add(&store, "acme:a", None);
        let x = add(&store, "acme:x", None);
        let c = add(&store, "acme:c", Some(&x));

        let summary = run(&store, &executor, Some("000000")).await;

        assert!(summary.otp_required);
        assert_eq!(status(&store, &a), OperationStatus::Failed);
        assert_eq!(status(&store, &c), OperationStatus::Completed);
    }

    #[tokio::test]
    async fn test_auth_failure_is_summarized() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        executor.respond(
            "acme:a",
            ExecutionResult {
                auth_failure: true,
                ..ExecutionResult::failure("npm authentication failed.")
            },
        );
        add(&store, "acme:a", None);

        let summary = run(&store, &executor, None).await;
        assert!(summary.auth_failure);
        assert!(!summary.otp_required);
    }

    #[tokio::test]
    async fn test_pending_and_unknown_dependencies_are_left_alone() {
        let store = OperationStore::new();
        let executor = ScriptedExecutor::default();
        let pending = store
            .add(NewOperation {
                kind: OperationKind::TeamCreate,
                params: [("scopeTeam".to_string(), "acme:p".to_string())].into(),
                description: String::new(),
                command: String::new(),
                depends_on: None,
            })
            .unwrap();
        let orphan = add(&store, "acme:o", Some(&OperationId::from("gone")));

        let summary = run(&store, &executor, None).await;

        assert!(summary.results.is_empty());
        assert!(executor.calls().is_empty());
        assert_eq!(status(&store, &pending.id), OperationStatus::Pending);
        assert_eq!(status(&store, &orphan), OperationStatus::Approved);
    }

    #[tokio::test]
    async fn test_empty_store_converges() {
        let store = OperationStore::new();
        let summary = run(&store, &ScriptedExecutor::default(), None).await;
        assert_eq!(summary, ExecuteResponse::default());
    }
}
