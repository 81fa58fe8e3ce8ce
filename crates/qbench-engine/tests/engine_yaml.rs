use std::path::PathBuf;

use qbench_engine::{BuildParamStyle, EngineSpec};

#[test]
fn partial_yaml_fills_defaults() {
    let spec: EngineSpec = serde_yaml::from_str(
        "source_dir: /opt/engine\nsettle_ms: 250\nbuild_params: environment\n",
    )
    .expect("parse");
    assert_eq!(spec.source_dir, PathBuf::from("/opt/engine"));
    assert_eq!(spec.settle_ms, 250);
    assert_eq!(spec.build_params, BuildParamStyle::Environment);
    assert_eq!(spec.build_command, vec!["make".to_string()]);
    assert_eq!(spec.trial_timeout_secs, 30);
    assert_eq!(spec.lock_path(), PathBuf::from("/opt/engine/.qbench-engine.lock"));
    assert_eq!(spec.resolve(&spec.server_log), PathBuf::from("/opt/engine/server.out"));
    spec.validate().expect("valid");
}

#[test]
fn empty_client_command_is_rejected() {
    let spec: EngineSpec = serde_yaml::from_str("client_command: []\n").expect("parse");
    assert_eq!(spec.validate().unwrap_err().info().code, "engine-command-empty");
}
