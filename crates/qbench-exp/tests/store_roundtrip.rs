use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::{EngineConfig, ParamPoint, ResultSeries};
use qbench_exp::ResultStore;
use tempfile::tempdir;

fn sample(name: &str, offset: u64) -> ResultSeries {
    let mut series = ResultSeries::new(name, "join", EngineConfig::threaded(3))
        .with_provenance("ab".repeat(32), "2026-10-14T09:30:00Z");
    series.set_setup_us(1_250);
    series.record(ParamPoint::Int(100), 900 + offset).expect("record");
    series.record(ParamPoint::Int(200), 1_800 + offset).expect("record");
    series
        .record_failure(
            ParamPoint::Int(300),
            BenchError::Timeout(ErrorInfo::new("trial-timeout", "hung").with_context("timeout_ms", "30000")),
        )
        .expect("record failure");
    series
}

fn backends(root: &std::path::Path) -> Vec<ResultStore> {
    vec![
        ResultStore::from_path(root.join("results")),
        ResultStore::from_path(root.join("results.csv")),
        ResultStore::from_path(root.join("nested/results.sqlite")),
    ]
}

#[test]
fn series_round_trips_through_every_backend() {
    let dir = tempdir().expect("tempdir");
    for store in backends(dir.path()) {
        let series = sample("join/hash/mt3", 0);
        store.save(&series).expect("save");
        let loaded = store.load("join/hash/mt3").expect("load");
        assert_eq!(loaded.latency_map(), series.latency_map(), "{store:?}");
        assert_eq!(loaded.outcome_map(), series.outcome_map(), "{store:?}");
        assert_eq!(loaded, series, "{store:?}");
    }
}

#[test]
fn saving_again_replaces_and_list_is_sorted() {
    let dir = tempdir().expect("tempdir");
    for store in backends(dir.path()) {
        store.save(&sample("b/hash/st", 0)).expect("save b");
        store.save(&sample("a/nested-loop/st", 0)).expect("save a");
        store.save(&sample("b/hash/st", 5)).expect("replace b");
        assert_eq!(
            store.list().expect("list"),
            ["a/nested-loop/st", "b/hash/st"],
            "{store:?}"
        );
        let reloaded = store.load("b/hash/st").expect("load");
        assert_eq!(reloaded.latency_map().get("100"), Some(&905), "{store:?}");
        assert_eq!(reloaded.len(), 3);
    }
}

#[test]
fn missing_series_is_not_found() {
    let dir = tempdir().expect("tempdir");
    for store in backends(dir.path()) {
        assert!(store.list().expect("list").is_empty());
        let err = store.load("nope").unwrap_err();
        assert!(matches!(err, BenchError::NotFound(_)), "{store:?}");
        store.save(&sample("other", 0)).expect("save");
        assert!(matches!(store.load("nope"), Err(BenchError::NotFound(_))));
    }
}

#[test]
fn empty_and_cancelled_series_keep_metadata() {
    let dir = tempdir().expect("tempdir");
    for store in backends(dir.path()) {
        let mut series = ResultSeries::new("sel/scan/st", "selectivity", EngineConfig::default());
        series.mark_cancelled();
        store.save(&series).expect("save");
        let loaded = store.load("sel/scan/st").expect("load");
        assert!(loaded.is_empty());
        assert!(loaded.is_cancelled());
        assert_eq!(loaded.setup_us(), None);
        assert_eq!(loaded, series, "{store:?}");
    }
}

#[test]
fn fractional_points_survive_storage() {
    let dir = tempdir().expect("tempdir");
    for store in backends(dir.path()) {
        let mut series = ResultSeries::new("sel/btree-clustered/st", "selectivity", EngineConfig::default());
        series.record(ParamPoint::Real(0.0), 11).expect("record");
        series.record(ParamPoint::Real(0.005), 12).expect("record");
        store.save(&series).expect("save");
        let loaded = store.load(series.name()).expect("load");
        let points: Vec<ParamPoint> = loaded.points().collect();
        assert_eq!(points, [ParamPoint::Real(0.0), ParamPoint::Real(0.005)], "{store:?}");
    }
}
