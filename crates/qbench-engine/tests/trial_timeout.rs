use std::time::{Duration, Instant};

use qbench_core::BenchError;
use qbench_engine::{EngineSpec, ScriptRunner, TrialExecutor};
use qbench_gen::{CommandScript, Statement};
use tempfile::tempdir;

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn select_script() -> CommandScript {
    CommandScript::new(vec![Statement::Select {
        handle: "s0".to_string(),
        column: "db1.tbl1.col2".to_string(),
        low: 10,
        high: 20,
    }])
}

#[test]
fn hung_client_times_out_and_is_killed() {
    let dir = tempdir().expect("tempdir");
    let executor = TrialExecutor::new(sh("exec sleep 30"), dir.path())
        .with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err = executor.execute(&select_script()).unwrap_err();
    assert!(matches!(err, BenchError::Timeout(_)));
    assert!(err.is_trial_local());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn trial_time_covers_the_client_run() {
    let dir = tempdir().expect("tempdir");
    let mut executor = TrialExecutor::new(sh("cat > /dev/null; sleep 0.1"), dir.path());
    let elapsed = executor.run_script(&select_script()).expect("trial");
    assert!(elapsed >= 100_000, "elapsed {elapsed}us");
}

#[test]
fn missing_client_is_an_execution_error() {
    let dir = tempdir().expect("tempdir");
    let spec = EngineSpec {
        client_command: vec!["./no-such-client".to_string()],
        ..EngineSpec::for_source_dir(dir.path())
    };
    let err = TrialExecutor::from_spec(&spec)
        .execute(&select_script())
        .unwrap_err();
    assert!(matches!(err, BenchError::Execution(_)));
    assert_eq!(err.info().code, "client-spawn");
}
