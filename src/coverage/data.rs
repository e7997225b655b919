use crate::coverage::{calculate, FileCoverageData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Failure to persist or restore a coverage snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not access coverage snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode or decode coverage snapshot: {0}")]
    Codec(#[from] bincode::Error),
}

/// All coverage data gathered during one test run, keyed by source file path
///
/// Files keep their registration order, and each gets a stable index that
/// instrumented code uses for direct access on the recording path. Data can
/// be persisted at the end of a run and merged into the next one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CoverageData {
    with_call_points: bool,
    file_indices: HashMap<String, usize>,
    file_paths: Vec<String>,
    indexed_file_data: Vec<FileCoverageData>,
}

impl CoverageData {
    pub fn new(with_call_points: bool) -> CoverageData {
        CoverageData {
            with_call_points,
            ..CoverageData::default()
        }
    }

    /// Whether call points are being gathered this run
    pub fn with_call_points(&self) -> bool {
        self.with_call_points
    }

    pub fn is_empty(&self) -> bool {
        self.indexed_file_data.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.indexed_file_data.len()
    }

    /// Register a source file, or find the one already registered under the
    /// same path
    ///
    /// A later registration can fill in the kind of top-level type if the
    /// first one did not know it yet (one source file can hold several
    /// types, loaded at different times).
    pub fn get_or_add_file(
        &mut self,
        path: &str,
        kind_of_top_level_type: Option<&str>,
        loaded_after_test_completion: bool,
    ) -> usize {
        if let Some(&index) = self.file_indices.get(path) {
            let file_data = &mut self.indexed_file_data[index];
            if file_data.kind_of_top_level_type.is_none() {
                file_data.kind_of_top_level_type = kind_of_top_level_type.map(str::to_owned);
            }
            return index;
        }

        let index = self.indexed_file_data.len();
        self.file_indices.insert(path.to_owned(), index);
        self.file_paths.push(path.to_owned());
        self.indexed_file_data.push(FileCoverageData::new(
            index,
            kind_of_top_level_type.map(str::to_owned),
            loaded_after_test_completion,
        ));

        log::debug!("registered source file {path} at index {index}");
        index
    }

    pub fn file_data(&self, path: &str) -> Option<&FileCoverageData> {
        let &index = self.file_indices.get(path)?;
        self.indexed_file_data.get(index)
    }

    pub fn file_data_mut(&mut self, path: &str) -> Option<&mut FileCoverageData> {
        let &index = self.file_indices.get(path)?;
        self.indexed_file_data.get_mut(index)
    }

    pub fn file_data_at(&self, index: usize) -> Option<&FileCoverageData> {
        self.indexed_file_data.get(index)
    }

    pub fn file_data_at_mut(&mut self, index: usize) -> Option<&mut FileCoverageData> {
        self.indexed_file_data.get_mut(index)
    }

    /// Source file paths in registration order
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.file_paths.iter().map(String::as_str)
    }

    /// Record the class file modification time that gates merging
    pub fn set_last_modified(&mut self, path: &str, last_modified: u64) {
        if let Some(file_data) = self.file_data_mut(path) {
            file_data.last_modified = last_modified;
        }
    }

    /// Coverage percentage over the files whose path starts with the prefix
    /// (all files when `None`); `-1` when nothing matched or nothing was
    /// measurable
    pub fn percentage(&mut self, file_path_prefix: Option<&str>) -> i32 {
        let mut covered = 0;
        let mut total = 0;

        for index in 0..self.indexed_file_data.len() {
            let matches = match file_path_prefix {
                Some(prefix) => self.file_paths[index].starts_with(prefix),
                None => true,
            };

            if matches {
                let file_data = &mut self.indexed_file_data[index];
                covered += file_data.covered_items();
                total += file_data.total_items();
            }
        }

        calculate(covered, total)
    }

    /// Smallest per-file percentage, for enforcing a minimum; files loaded
    /// after testing finished are skipped, and `i32::MAX` means no file had
    /// a meaningful percentage
    pub fn smallest_per_file_percentage(&mut self) -> i32 {
        let mut min_percentage = i32::MAX;

        for file_data in &mut self.indexed_file_data {
            if !file_data.was_loaded_after_test_completion() {
                let percentage = file_data.coverage_percentage();

                if percentage >= 0 && percentage < min_percentage {
                    min_percentage = percentage;
                }
            }
        }

        min_percentage
    }

    /// Fold the data of a previous test run into this one
    ///
    /// Files both runs know are merged only when their class files carry the
    /// same nonzero modification time; a recompiled class invalidates its
    /// old data. Files only the previous run knew are carried over whole.
    pub fn merge(&mut self, previous: CoverageData) {
        self.with_call_points |= previous.with_call_points;

        for (path, previous_file_data) in previous
            .file_paths
            .into_iter()
            .zip(previous.indexed_file_data)
        {
            match self.file_data_mut(&path) {
                Some(file_data) => {
                    if file_data.last_modified > 0
                        && file_data.last_modified == previous_file_data.last_modified
                    {
                        file_data.merge_with_data_from_previous_test_run(&previous_file_data);
                    } else {
                        log::debug!("discarding stale coverage data for {path}");
                    }
                }
                None => {
                    let index = self.indexed_file_data.len();
                    let mut carried = previous_file_data;
                    carried.index = index;
                    self.file_indices.insert(path.clone(), index);
                    self.file_paths.push(path);
                    self.indexed_file_data.push(carried);
                }
            }
        }
    }

    /// Write a snapshot of this data, normally at the end of a test run
    ///
    /// The per-test field assignment maps are not part of the snapshot, so
    /// every field's covered memo is forced first and persisted in their
    /// place.
    pub fn write_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SnapshotError> {
        for file_data in &mut self.indexed_file_data {
            file_data.data_coverage.covered_items();
        }

        let file = File::create(path.as_ref())?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        log::info!("coverage data written to {}", path.as_ref().display());
        Ok(())
    }

    /// Read back a snapshot from a previous test run
    ///
    /// Memoized totals are not part of the snapshot and recompute on first
    /// use.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<CoverageData, SnapshotError> {
        let file = File::open(path.as_ref())?;
        let data = bincode::deserialize_from(BufReader::new(file))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_keep_registration_order_and_indices() {
        let mut data = CoverageData::new(false);

        let first = data.get_or_add_file("com/acme/Widget.java", Some("class"), false);
        let second = data.get_or_add_file("com/acme/Gadget.java", Some("enum"), false);
        let again = data.get_or_add_file("com/acme/Widget.java", None, false);

        assert_eq!((first, second, again), (0, 1, 0));
        assert_eq!(
            data.file_paths().collect::<Vec<_>>(),
            vec!["com/acme/Widget.java", "com/acme/Gadget.java"]
        );
        assert_eq!(data.file_data_at(1).unwrap().index, 1);
    }

    #[test]
    fn later_registration_fills_in_the_type_kind() {
        let mut data = CoverageData::new(false);
        data.get_or_add_file("com/acme/Widget.java", None, false);
        data.get_or_add_file("com/acme/Widget.java", Some("interface"), false);

        let kind = &data.file_data("com/acme/Widget.java").unwrap().kind_of_top_level_type;
        assert_eq!(kind.as_deref(), Some("interface"));
    }

    #[test]
    fn merging_is_gated_on_matching_modification_times() {
        let mut current = CoverageData::new(false);
        current.get_or_add_file("A.java", None, false);
        current.file_data_mut("A.java").unwrap().line_coverage.add_line(1);
        current.file_data_mut("A.java").unwrap().line_coverage.register_execution(1);
        current.set_last_modified("A.java", 111);

        let mut previous = CoverageData::new(false);
        previous.get_or_add_file("A.java", None, false);
        previous.file_data_mut("A.java").unwrap().line_coverage.add_line(1);
        previous.file_data_mut("A.java").unwrap().line_coverage.register_execution(1);

        // modification times differ: the old data must be discarded
        previous.set_last_modified("A.java", 222);
        current.merge(previous);
        assert_eq!(
            current.file_data("A.java").unwrap().line_coverage.execution_count(1),
            1
        );

        // matching nonzero times: counts add up
        let mut matching = CoverageData::new(false);
        matching.get_or_add_file("A.java", None, false);
        matching.file_data_mut("A.java").unwrap().line_coverage.add_line(1);
        matching.file_data_mut("A.java").unwrap().line_coverage.register_execution(1);
        matching.set_last_modified("A.java", 111);
        current.merge(matching);
        assert_eq!(
            current.file_data("A.java").unwrap().line_coverage.execution_count(1),
            2
        );
    }

    #[test]
    fn files_only_the_previous_run_knew_are_carried_over() {
        let mut current = CoverageData::new(false);
        current.get_or_add_file("A.java", None, false);

        let mut previous = CoverageData::new(true);
        previous.get_or_add_file("B.java", None, false);
        previous.file_data_mut("B.java").unwrap().line_coverage.add_line(2);

        current.merge(previous);

        assert!(current.with_call_points());
        assert_eq!(current.file_count(), 2);
        assert_eq!(current.file_data("B.java").unwrap().index, 1);
    }

    #[test]
    fn prefix_percentage_only_counts_matching_files() {
        let mut data = CoverageData::new(false);
        data.get_or_add_file("com/acme/A.java", None, false);
        data.get_or_add_file("org/other/B.java", None, false);

        {
            let a = data.file_data_mut("com/acme/A.java").unwrap();
            a.line_coverage.add_line(1);
            a.line_coverage.register_execution(1);
        }
        {
            let b = data.file_data_mut("org/other/B.java").unwrap();
            b.line_coverage.add_line(1);
        }

        assert_eq!(data.percentage(Some("com/acme/")), 100);
        assert_eq!(data.percentage(None), 50);
        assert_eq!(data.percentage(Some("net/none/")), -1);
    }

    #[test]
    fn smallest_percentage_skips_files_loaded_after_completion() {
        let mut data = CoverageData::new(false);
        data.get_or_add_file("A.java", None, false);
        data.get_or_add_file("B.java", None, true);

        {
            let a = data.file_data_mut("A.java").unwrap();
            a.line_coverage.add_line(1);
            a.line_coverage.add_line(2);
            a.line_coverage.register_execution(1);
        }
        {
            let b = data.file_data_mut("B.java").unwrap();
            b.line_coverage.add_line(1);
        }

        assert_eq!(data.smallest_per_file_percentage(), 50);

        let mut empty = CoverageData::new(false);
        assert_eq!(empty.smallest_per_file_percentage(), i32::MAX);
    }
}
