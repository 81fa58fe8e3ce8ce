use std::fs;
use std::path::Path;

use qbench_core::{BenchError, EngineConfig};
use qbench_engine::{BuildParamStyle, EngineController, EngineLifecycle, EngineSpec, EngineState};
use tempfile::tempdir;

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn fake_engine(dir: &Path) -> EngineSpec {
    EngineSpec {
        clean_command: sh("rm -f built.txt"),
        build_command: sh("echo \"$0 $1\" > built.txt"),
        server_command: sh("exec sleep 30"),
        client_command: sh("cat > /dev/null"),
        settle_ms: 50,
        stop_grace_ms: 100,
        ..EngineSpec::for_source_dir(dir)
    }
}

#[test]
fn build_passes_config_as_make_variables() {
    let dir = tempdir().expect("tempdir");
    let mut engine = EngineController::new(fake_engine(dir.path())).expect("controller");
    engine.build(EngineConfig::threaded(3)).expect("build");
    assert_eq!(engine.state(), EngineState::Built);
    let params = fs::read_to_string(dir.path().join("built.txt")).expect("build output");
    assert_eq!(params.trim(), "MULTI_THREADING=1 THREAD_NUM=3");
}

#[test]
fn build_passes_config_through_the_environment() {
    let dir = tempdir().expect("tempdir");
    let spec = EngineSpec {
        build_command: sh("echo \"$MULTI_THREADING/$THREAD_NUM\" > built.txt"),
        build_params: BuildParamStyle::Environment,
        ..fake_engine(dir.path())
    };
    let mut engine = EngineController::new(spec).expect("controller");
    engine.build(EngineConfig::single_threaded()).expect("build");
    let params = fs::read_to_string(dir.path().join("built.txt")).expect("build output");
    assert_eq!(params.trim(), "0/4");
}

#[test]
fn failed_build_is_reported_and_blocks_start() {
    let dir = tempdir().expect("tempdir");
    let spec = EngineSpec {
        build_command: sh("echo broken >&2; exit 2"),
        ..fake_engine(dir.path())
    };
    let mut engine = EngineController::new(spec).expect("controller");
    let err = engine.build(EngineConfig::default()).unwrap_err();
    assert!(matches!(err, BenchError::Build(_)));
    assert_eq!(engine.state(), EngineState::NotBuilt);
    let log = fs::read_to_string(dir.path().join("compile.out")).expect("build log");
    assert!(log.contains("broken"));
    assert_eq!(engine.start().unwrap_err().info().code, "engine-not-built");
}

#[test]
fn start_stop_cycle_and_double_stop() {
    let dir = tempdir().expect("tempdir");
    let mut engine = EngineController::new(fake_engine(dir.path())).expect("controller");
    engine.stop().expect("stop before build is a no-op");
    engine.build(EngineConfig::default()).expect("build");
    engine.start().expect("start");
    assert_eq!(engine.state(), EngineState::Running);
    assert!(engine.pid().is_some());
    assert!(dir.path().join(EngineSpec::LOCK_FILE).exists());

    engine.stop().expect("first stop");
    engine.stop().expect("second stop");
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.pid().is_none());
    assert!(!dir.path().join(EngineSpec::LOCK_FILE).exists());

    engine.start().expect("restart without rebuild");
    engine.stop().expect("stop");
}

#[test]
fn reconfigure_is_rejected_while_running() {
    let dir = tempdir().expect("tempdir");
    let mut engine = EngineController::new(fake_engine(dir.path())).expect("controller");
    engine.build(EngineConfig::default()).expect("build");
    engine.start().expect("start");
    let err = engine.reconfigure(EngineConfig::threaded(2)).unwrap_err();
    assert!(matches!(err, BenchError::Lifecycle(_)));
    assert_eq!(engine.config(), EngineConfig::default());
    engine.stop().expect("stop");

    engine.reconfigure(EngineConfig::threaded(2)).expect("reconfigure");
    assert_eq!(engine.start().unwrap_err().info().code, "engine-rebuild-required");
    engine.build(EngineConfig::threaded(2)).expect("rebuild");
    engine.start().expect("start");
    assert_eq!(engine.start().unwrap_err().info().code, "engine-already-running");
}

#[test]
fn second_harness_cannot_share_the_engine() {
    let dir = tempdir().expect("tempdir");
    let mut first = EngineController::new(fake_engine(dir.path())).expect("first");
    let mut second = EngineController::new(fake_engine(dir.path())).expect("second");
    first.build(EngineConfig::default()).expect("build first");
    second.build(EngineConfig::default()).expect("build second");
    first.start().expect("start first");
    let err = second.start().unwrap_err();
    assert!(matches!(err, BenchError::Start(_)));
    assert_eq!(err.info().code, "engine-locked");
    first.stop().expect("stop first");
    second.start().expect("start second after release");
}

#[test]
fn engine_exiting_during_settle_is_a_start_error() {
    let dir = tempdir().expect("tempdir");
    let spec = EngineSpec {
        server_command: sh("exit 0"),
        settle_ms: 200,
        ..fake_engine(dir.path())
    };
    let mut engine = EngineController::new(spec).expect("controller");
    engine.build(EngineConfig::default()).expect("build");
    let err = engine.start().unwrap_err();
    assert_eq!(err.info().code, "engine-exited-during-settle");
    assert_ne!(engine.state(), EngineState::Running);
    assert!(!dir.path().join(EngineSpec::LOCK_FILE).exists());
}

#[test]
fn graceful_shutdown_sends_the_shutdown_command() {
    let dir = tempdir().expect("tempdir");
    let spec = EngineSpec {
        client_command: sh("cat > shutdown.dsl"),
        graceful_shutdown: true,
        ..fake_engine(dir.path())
    };
    let mut engine = EngineController::new(spec).expect("controller");
    engine.build(EngineConfig::default()).expect("build");
    engine.start().expect("start");
    engine.stop().expect("stop");
    let sent = fs::read_to_string(dir.path().join("shutdown.dsl")).expect("shutdown script");
    assert_eq!(sent, "shutdown\n");
}

#[test]
fn dropping_a_running_controller_stops_the_engine() {
    let dir = tempdir().expect("tempdir");
    {
        let mut engine = EngineController::new(fake_engine(dir.path())).expect("controller");
        engine.build(EngineConfig::default()).expect("build");
        engine.start().expect("start");
    }
    assert!(!dir.path().join(EngineSpec::LOCK_FILE).exists());
}
