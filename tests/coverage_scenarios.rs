use classcov::coverage::{CallPoint, CoverageRegistry};

/// Instrumentation of a file whose line 10 holds `if (flag) { line 11 } else
/// { line 12 }`: the branching point's source sits on line 10 and its target
/// on line 12
fn instrument_branchy_file(registry: &CoverageRegistry) -> (usize, usize) {
    let file = registry.register_source_file("com/acme/Branchy.java", Some("class"));
    registry.add_line(file, 10);
    registry.add_line(file, 11);
    registry.add_line(file, 12);
    let branch = registry.add_branching_point(file, 10, 10, 12).unwrap();
    (file, branch)
}

fn run_true_path(registry: &CoverageRegistry, file: usize, branch: usize) {
    registry.register_line_execution(file, 10, None);
    registry.register_branch_execution(file, 10, branch, None);
    registry.register_line_execution(file, 11, None);
}

fn run_false_path(registry: &CoverageRegistry, file: usize, branch: usize) {
    registry.register_line_execution(file, 10, None);
    registry.register_branch_execution(file, 10, branch + 1, None);
    registry.register_line_execution(file, 12, None);
}

#[test]
fn one_branch_outcome_leaves_segments_uncovered() {
    let registry = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&registry);

    run_true_path(&registry, file, branch);

    // line 10 contributes two segments, only reaching 100% with both
    // outcomes; lines 11 and 12 contribute one each
    registry.with_data_mut(|data| {
        let file_data = data.file_data_at_mut(file).unwrap();
        assert_eq!(file_data.line_coverage.total_items(), 4);
        assert_eq!(file_data.line_coverage.covered_items(), 3);
        assert_eq!(file_data.coverage_percentage(), 75);
    });
}

#[test]
fn both_branch_outcomes_reach_full_coverage() {
    let registry = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&registry);

    run_true_path(&registry, file, branch);
    run_false_path(&registry, file, branch);

    registry.with_data_mut(|data| {
        let file_data = data.file_data_at_mut(file).unwrap();
        assert_eq!(file_data.line_coverage.execution_count(10), 2);
        assert_eq!(file_data.line_coverage.total_items(), 4);
        assert_eq!(file_data.line_coverage.covered_items(), 4);
        assert_eq!(file_data.coverage_percentage(), 100);
    });
    assert_eq!(registry.percentage(None), 100);
}

#[test]
fn call_points_fold_repeated_executions_from_one_test_line() {
    let registry = CoverageRegistry::new(true);
    let file = registry.register_source_file("com/acme/Hot.java", None);
    registry.add_line(file, 5);

    for _ in 0..3 {
        registry.register_line_execution(
            file,
            5,
            Some(CallPoint::new("com.acme.HotTest", "testLoop", 40)),
        );
    }
    registry.register_line_execution(
        file,
        5,
        Some(CallPoint::new("com.acme.HotTest", "testOnce", 55)),
    );

    registry.with_data(|data| {
        let file_data = data.file_data_at(file).unwrap();
        assert_eq!(file_data.line_coverage.execution_count(5), 4);

        let call_points = file_data
            .line_coverage
            .line_data(5)
            .unwrap()
            .segment()
            .call_points();
        assert_eq!(call_points.len(), 2);
        assert_eq!(call_points[0].repetition_count(), 2);
        assert_eq!(call_points[1].repetition_count(), 0);
    });
}

#[test]
fn instance_field_needs_every_written_instance_read_by_one_test() {
    let registry = CoverageRegistry::new(false);
    let file = registry.register_source_file("com/acme/Widget.java", None);
    registry.register_field(file, "Widget", "name", false);

    registry.set_current_test_id(1);
    registry.register_instance_field_assignment(file, "Widget.name", 100);
    registry.register_instance_field_assignment(file, "Widget.name", 200);
    registry.register_instance_field_read(file, "Widget.name", 100);

    let covered = |registry: &CoverageRegistry| {
        registry.with_data_mut(|data| {
            data.file_data_at_mut(file)
                .unwrap()
                .data_coverage
                .is_covered("Widget.name")
        })
    };
    assert!(!covered(&registry));

    registry.register_instance_field_read(file, "Widget.name", 200);
    assert!(covered(&registry));
}

#[test]
fn static_field_written_by_one_test_and_read_by_another_stays_uncovered() {
    let registry = CoverageRegistry::new(false);
    let file = registry.register_source_file("com/acme/Widget.java", None);
    registry.register_field(file, "Widget", "count", true);

    registry.set_current_test_id(1);
    registry.register_static_field_assignment(file, "Widget.count");

    registry.set_current_test_id(2);
    registry.register_static_field_assignment(file, "Widget.count");

    registry.with_data_mut(|data| {
        let file_data = data.file_data_at_mut(file).unwrap();
        assert!(!file_data.data_coverage.is_covered("Widget.count"));
        assert_eq!(file_data.data_coverage.coverage_percentage(), 0);
    });

    // the second test finally reads what it wrote
    registry.register_static_field_read(file, "Widget.count");
    registry.with_data_mut(|data| {
        let file_data = data.file_data_at_mut(file).unwrap();
        assert!(file_data.data_coverage.is_covered("Widget.count"));
        assert_eq!(file_data.data_coverage.coverage_percentage(), 100);
    });
}

#[test]
fn snapshot_survives_a_round_trip_and_merges_into_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("coverage.bin");

    let first_run = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&first_run);
    first_run.set_last_modified("com/acme/Branchy.java", 1234);
    run_true_path(&first_run, file, branch);
    run_true_path(&first_run, file, branch);
    first_run.write_snapshot(&snapshot).unwrap();

    // same class files in the next run: counts add up
    let second_run = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&second_run);
    second_run.set_last_modified("com/acme/Branchy.java", 1234);
    run_false_path(&second_run, file, branch);
    second_run.merge_snapshot(&snapshot).unwrap();

    second_run.with_data_mut(|data| {
        let file_data = data.file_data_at_mut(file).unwrap();
        assert_eq!(file_data.line_coverage.execution_count(10), 3);
        assert_eq!(file_data.line_coverage.execution_count(11), 2);
        assert_eq!(file_data.line_coverage.execution_count(12), 1);
        assert_eq!(file_data.coverage_percentage(), 100);
    });
}

#[test]
fn recompiled_classes_invalidate_their_old_snapshot_data() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("coverage.bin");

    let first_run = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&first_run);
    first_run.set_last_modified("com/acme/Branchy.java", 1234);
    run_true_path(&first_run, file, branch);
    first_run.write_snapshot(&snapshot).unwrap();

    // the class was recompiled before the second run
    let second_run = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&second_run);
    second_run.set_last_modified("com/acme/Branchy.java", 9999);
    run_true_path(&second_run, file, branch);
    second_run.merge_snapshot(&snapshot).unwrap();

    second_run.with_data(|data| {
        let file_data = data.file_data_at(file).unwrap();
        assert_eq!(file_data.line_coverage.execution_count(10), 1);
    });
}

#[test]
fn merging_the_same_snapshot_twice_doubles_its_contribution() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("coverage.bin");

    let first_run = CoverageRegistry::new(false);
    let (file, branch) = instrument_branchy_file(&first_run);
    first_run.set_last_modified("com/acme/Branchy.java", 1234);
    run_true_path(&first_run, file, branch);
    first_run.write_snapshot(&snapshot).unwrap();

    let second_run = CoverageRegistry::new(false);
    let (file, _) = instrument_branchy_file(&second_run);
    second_run.set_last_modified("com/acme/Branchy.java", 1234);
    second_run.merge_snapshot(&snapshot).unwrap();
    second_run.merge_snapshot(&snapshot).unwrap();

    second_run.with_data(|data| {
        let file_data = data.file_data_at(file).unwrap();
        assert_eq!(file_data.line_coverage.execution_count(10), 2);
    });
}
