use qbench_gen::{
    JoinLayout, JoinStrategy, ScanBands, SchemaSpec, Statement, ValueDomain, WorkloadGenerator,
};

#[test]
fn independent_and_shared_scans_carry_identical_predicates() {
    let schema = SchemaSpec::batch_table("data3_batch.csv");
    let column = schema.column_ref("col1");
    let mut gen = WorkloadGenerator::seeded(165);
    let pair = gen.shared_scan(&column, 25, &ScanBands::default()).expect("scan pair");

    assert_eq!(pair.first.select_ranges(), pair.second.select_ranges());
    assert_eq!(pair.first.len(), 25);
    assert_eq!(pair.second.len(), 27);
    assert_eq!(pair.second.statements()[0], Statement::BatchQueries);
    assert_eq!(pair.second.statements()[26], Statement::BatchExecute);

    let stripped: Vec<&Statement> = pair.second.without_batch_markers();
    let independent: Vec<&Statement> = pair.first.statements().iter().collect();
    assert_eq!(stripped, independent);

    for (low, high) in pair.first.select_ranges() {
        assert!((0..=200).contains(&low));
        assert!((40_000..=50_000).contains(&high));
    }
}

#[test]
fn join_variants_differ_only_in_operator() {
    for layout in [JoinLayout::SharedSetup, JoinLayout::PerQuery] {
        let mut gen = WorkloadGenerator::seeded(7);
        let pair = gen
            .join_pair(
                "db1.tbl1.col1",
                "db1.tbl1.col2",
                2_500,
                20,
                &ValueDomain::SELECTIVITY,
                layout,
            )
            .expect("join pair");
        assert_eq!(pair.first.len(), pair.second.len());
        for (nested, hash) in pair.first.statements().iter().zip(pair.second.statements()) {
            match (nested, hash) {
                (
                    Statement::Join { strategy: a, .. },
                    Statement::Join { strategy: b, .. },
                ) => {
                    assert_eq!(*a, JoinStrategy::NestedLoop);
                    assert_eq!(*b, JoinStrategy::Hash);
                    let renamed = nested.to_string().replace("nested-loop", "hash");
                    assert_eq!(renamed, hash.to_string());
                }
                _ => assert_eq!(nested, hash),
            }
        }
        assert_eq!(pair.first.join_strategies().len(), 20);
        for (low, high) in pair.first.select_ranges() {
            assert_eq!(high - low, 2_500);
        }
    }
}

#[test]
fn insert_workload_is_pure_inserts() {
    let mut gen = WorkloadGenerator::seeded(11);
    let script = gen
        .inserts("db1.tbl1", 40, 2, &ValueDomain::SELECTIVITY)
        .expect("inserts");
    assert_eq!(script.len(), 40);
    for statement in script.statements() {
        match statement {
            Statement::RelationalInsert { table, values } => {
                assert_eq!(table, "db1.tbl1");
                assert_eq!(values.len(), 2);
                assert!(values.iter().all(|v| (0..100_000).contains(v)));
            }
            other => panic!("unexpected statement {other}"),
        }
    }
}

#[test]
fn seeded_generators_repeat_and_unseeded_draws_advance() {
    let mut a = WorkloadGenerator::seeded(42);
    let mut b = WorkloadGenerator::seeded(42);
    let first_a = a.inserts("db1.tbl1", 10, 2, &ValueDomain::SELECTIVITY).unwrap();
    let first_b = b.inserts("db1.tbl1", 10, 2, &ValueDomain::SELECTIVITY).unwrap();
    assert_eq!(first_a, first_b);
    // The generator is not reseeded between calls.
    let second_a = a.inserts("db1.tbl1", 10, 2, &ValueDomain::SELECTIVITY).unwrap();
    assert_ne!(first_a, second_a);
}
