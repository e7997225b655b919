use crate::coverage::{CallPoint, CoverageData, SnapshotError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared front door to the coverage data of a test run
///
/// Instrumented code running on any thread records executions through here.
/// The recording path takes the read lock and bumps an atomic counter, so
/// concurrent recorders never serialize against each other; only structural
/// changes (registering files, lines, and fields, gathering call points, and
/// field events) take the write lock.
pub struct CoverageRegistry {
    current_test_id: AtomicU32,
    terminated: AtomicBool,
    data: RwLock<CoverageData>,
}

impl CoverageRegistry {
    pub fn new(with_call_points: bool) -> CoverageRegistry {
        CoverageRegistry {
            current_test_id: AtomicU32::new(0),
            terminated: AtomicBool::new(false),
            data: RwLock::new(CoverageData::new(with_call_points)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CoverageData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CoverageData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tell the registry which test is now running; field coverage is
    /// accounted per test
    pub fn set_current_test_id(&self, test_id: u32) {
        self.current_test_id.store(test_id, Ordering::Relaxed);
    }

    pub fn current_test_id(&self) -> u32 {
        self.current_test_id.load(Ordering::Relaxed)
    }

    /// Mark the end of the test phase; classes loaded from now on are
    /// excluded from the minimum-coverage check
    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Relaxed);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Relaxed)
    }

    // --- registration (instrumentation time) ---

    /// Register a source file, returning the index instrumented code will
    /// record against
    pub fn register_source_file(&self, path: &str, kind_of_top_level_type: Option<&str>) -> usize {
        let loaded_after = self.is_terminated();
        self.write()
            .get_or_add_file(path, kind_of_top_level_type, loaded_after)
    }

    pub fn set_last_modified(&self, path: &str, last_modified: u64) {
        self.write().set_last_modified(path, last_modified);
    }

    pub fn add_line(&self, file_index: usize, line: u32) {
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data.line_coverage.add_line(line);
        }
    }

    pub fn add_branching_point(
        &self,
        file_index: usize,
        line: u32,
        source_line: u32,
        target_line: u32,
    ) -> Option<usize> {
        let mut data = self.write();
        let file_data = data.file_data_at_mut(file_index)?;
        let line_data = file_data.line_coverage.get_or_create_line_data(line);
        Some(line_data.add_branching_point(source_line, target_line))
    }

    pub fn mark_last_line_segment_as_empty(&self, file_index: usize, line: u32) {
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data.line_coverage.mark_last_line_segment_as_empty(line);
        }
    }

    pub fn mark_line_as_reachable(&self, file_index: usize, line: u32) {
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data.line_coverage.mark_line_as_reachable(line);
        }
    }

    pub fn register_field(
        &self,
        file_index: usize,
        class_name: &str,
        field_name: &str,
        is_static: bool,
    ) {
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data
                .data_coverage
                .add_field(class_name, field_name, is_static);
        }
    }

    // --- recording (test execution time) ---

    /// Count one execution of a line; unknown files and lines are ignored
    ///
    /// Passing a call point takes the slower exclusive path.
    pub fn register_line_execution(
        &self,
        file_index: usize,
        line: u32,
        call_point: Option<CallPoint>,
    ) {
        match call_point {
            None => {
                let data = self.read();
                if let Some(file_data) = data.file_data_at(file_index) {
                    file_data.line_coverage.register_execution(line);
                }
            }
            Some(call_point) => {
                let mut data = self.write();
                if let Some(file_data) = data.file_data_at_mut(file_index) {
                    file_data.line_coverage.register_execution(line);
                    file_data
                        .line_coverage
                        .get_or_create_line_data(line)
                        .segment_mut()
                        .add_call_point(call_point);
                }
            }
        }
    }

    /// Count one execution of a branch side; unknown indices are ignored
    pub fn register_branch_execution(
        &self,
        file_index: usize,
        line: u32,
        branch_index: usize,
        call_point: Option<CallPoint>,
    ) {
        match call_point {
            None => {
                let data = self.read();
                if let Some(file_data) = data.file_data_at(file_index) {
                    file_data
                        .line_coverage
                        .register_branch_execution(line, branch_index);
                }
            }
            Some(call_point) => {
                let mut data = self.write();
                if let Some(file_data) = data.file_data_at_mut(file_index) {
                    file_data
                        .line_coverage
                        .register_branch_execution(line, branch_index);
                    let line_data = file_data.line_coverage.get_or_create_line_data(line);
                    if let Some(branch) = line_data.branch_mut(branch_index) {
                        branch.segment_mut().add_call_point(call_point);
                    }
                }
            }
        }
    }

    pub fn register_static_field_assignment(&self, file_index: usize, class_and_field: &str) {
        let test_id = self.current_test_id();
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data
                .data_coverage
                .register_assignment_to_static_field(class_and_field, test_id);
        }
    }

    pub fn register_static_field_read(&self, file_index: usize, class_and_field: &str) {
        let test_id = self.current_test_id();
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data
                .data_coverage
                .register_read_of_static_field(class_and_field, test_id);
        }
    }

    pub fn register_instance_field_assignment(
        &self,
        file_index: usize,
        class_and_field: &str,
        instance_id: u64,
    ) {
        let test_id = self.current_test_id();
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data
                .data_coverage
                .register_assignment_to_instance_field(class_and_field, test_id, instance_id);
        }
    }

    pub fn register_instance_field_read(
        &self,
        file_index: usize,
        class_and_field: &str,
        instance_id: u64,
    ) {
        let test_id = self.current_test_id();
        if let Some(file_data) = self.write().file_data_at_mut(file_index) {
            file_data
                .data_coverage
                .register_read_of_instance_field(class_and_field, test_id, instance_id);
        }
    }

    // --- reporting and persistence ---

    pub fn percentage(&self, file_path_prefix: Option<&str>) -> i32 {
        self.write().percentage(file_path_prefix)
    }

    pub fn smallest_per_file_percentage(&self) -> i32 {
        self.write().smallest_per_file_percentage()
    }

    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        self.write().write_to_file(path)
    }

    /// Fold in the snapshot of a previous test run, if one exists at the
    /// given path
    pub fn merge_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let previous = CoverageData::read_from_file(path)?;
        self.write().merge(previous);
        Ok(())
    }

    /// Run a closure against the data, for inspection
    pub fn with_data<R>(&self, inspect: impl FnOnce(&CoverageData) -> R) -> R {
        inspect(&self.read())
    }

    /// Run a closure against the data with exclusive access
    pub fn with_data_mut<R>(&self, inspect: impl FnOnce(&mut CoverageData) -> R) -> R {
        inspect(&mut self.write())
    }

    /// Take the gathered data out, leaving an empty registry
    pub fn into_data(self) -> CoverageData {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_recorders_never_lose_counts() {
        let registry = Arc::new(CoverageRegistry::new(false));
        let file_index = registry.register_source_file("com/acme/Hot.java", None);
        registry.add_line(file_index, 7);

        let mut handles = vec![];
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    registry.register_line_execution(file_index, 7, None);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let count = registry.with_data(|data| {
            data.file_data_at(file_index)
                .unwrap()
                .line_coverage
                .execution_count(7)
        });
        assert_eq!(count, 8000);
    }

    #[test]
    fn field_coverage_is_accounted_per_test() {
        let registry = CoverageRegistry::new(false);
        let file_index = registry.register_source_file("com/acme/Widget.java", None);
        registry.register_field(file_index, "Widget", "count", true);

        registry.set_current_test_id(1);
        registry.register_static_field_assignment(file_index, "Widget.count");

        // a different test reads its own assignment
        registry.set_current_test_id(2);
        registry.register_static_field_assignment(file_index, "Widget.count");
        registry.register_static_field_read(file_index, "Widget.count");

        let covered = registry.with_data_mut(|data| {
            data.file_data_at_mut(file_index)
                .unwrap()
                .data_coverage
                .is_covered("Widget.count")
        });
        assert!(covered);
    }

    #[test]
    fn files_loaded_after_termination_are_flagged() {
        let registry = CoverageRegistry::new(false);
        let before = registry.register_source_file("Before.java", None);
        registry.mark_terminated();
        let after = registry.register_source_file("After.java", None);

        registry.with_data(|data| {
            assert!(!data
                .file_data_at(before)
                .unwrap()
                .was_loaded_after_test_completion());
            assert!(data
                .file_data_at(after)
                .unwrap()
                .was_loaded_after_test_completion());
        });
    }

    #[test]
    fn unknown_files_and_lines_are_silently_ignored() {
        let registry = CoverageRegistry::new(false);
        registry.register_line_execution(99, 1, None);
        registry.register_branch_execution(99, 1, 0, None);
        registry.register_static_field_read(99, "Nope.field");

        registry.with_data(|data| assert!(data.is_empty()));
    }
}
