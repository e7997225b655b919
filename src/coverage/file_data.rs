use crate::coverage::{calculate, PerFileDataCoverage, PerFileLineCoverage};
use serde::{Deserialize, Serialize};

/// Coverage data gathered for the lines, branching points, and fields of a
/// single source file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileCoverageData {
    pub line_coverage: PerFileLineCoverage,
    pub data_coverage: PerFileDataCoverage,

    /// Position of this file in registration order, for indexed access from
    /// instrumented code
    pub index: usize,

    /// `class`, `interface`, `enum`, and so on, for report styling
    pub kind_of_top_level_type: Option<String>,

    /// Modification time of the class file, the gate for merging with data
    /// from a previous test run (0 when unknown)
    pub last_modified: u64,

    loaded_after_test_completion: bool,
}

impl FileCoverageData {
    pub fn new(
        index: usize,
        kind_of_top_level_type: Option<String>,
        loaded_after_test_completion: bool,
    ) -> FileCoverageData {
        FileCoverageData {
            line_coverage: PerFileLineCoverage::default(),
            data_coverage: PerFileDataCoverage::default(),
            index,
            kind_of_top_level_type,
            last_modified: 0,
            loaded_after_test_completion,
        }
    }

    /// Whether the class was only loaded once testing had already finished
    /// (such files are skipped by the minimum-coverage check)
    pub fn was_loaded_after_test_completion(&self) -> bool {
        self.loaded_after_test_completion
    }

    pub fn total_items(&mut self) -> u32 {
        self.line_coverage.total_items() + self.data_coverage.total_items()
    }

    pub fn covered_items(&mut self) -> u32 {
        self.line_coverage.covered_items() + self.data_coverage.covered_items()
    }

    pub fn coverage_percentage(&mut self) -> i32 {
        let total = self.total_items();
        let covered = self.covered_items();
        calculate(covered, total)
    }

    pub(crate) fn merge_with_data_from_previous_test_run(&mut self, previous: &FileCoverageData) {
        self.line_coverage.merge_information(&previous.line_coverage);
        self.data_coverage.merge_information(&previous.data_coverage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_combine_line_and_field_items() {
        let mut file_data = FileCoverageData::new(0, Some("class".to_owned()), false);
        file_data.line_coverage.add_line(1);
        file_data.line_coverage.add_line(2);
        file_data.data_coverage.add_field("Widget", "count", true);

        file_data.line_coverage.register_execution(1);
        file_data
            .data_coverage
            .register_assignment_to_static_field("Widget.count", 1);
        file_data
            .data_coverage
            .register_read_of_static_field("Widget.count", 1);

        assert_eq!(file_data.total_items(), 3);
        assert_eq!(file_data.covered_items(), 2);
        assert_eq!(file_data.coverage_percentage(), 67);
    }
}
