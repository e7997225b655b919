use crate::coverage::{calculate, CallPoint, MAX_CALL_POINTS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Execution data for one segment of a line: the line itself, or one side of
/// a branching point on it
///
/// The execution counter is atomic so the recording path can run under a
/// shared lock; everything else on the struct only changes during
/// registration or merging, which hold exclusive access.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LineSegmentData {
    unreachable: bool,
    empty: bool,
    execution_count: AtomicU32,
    call_points: Vec<CallPoint>,
}

impl Clone for LineSegmentData {
    fn clone(&self) -> LineSegmentData {
        LineSegmentData {
            unreachable: self.unreachable,
            empty: self.empty,
            execution_count: AtomicU32::new(self.execution_count()),
            call_points: self.call_points.clone(),
        }
    }
}

impl LineSegmentData {
    pub fn mark_as_unreachable(&mut self) {
        self.unreachable = true;
    }

    pub(crate) fn mark_as_reachable(&mut self) {
        self.unreachable = false;
    }

    pub(crate) fn mark_as_empty(&mut self) {
        self.empty = true;
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn execution_count(&self) -> u32 {
        self.execution_count.load(Ordering::Relaxed)
    }

    /// Count one execution, returning the previous count
    pub fn register_execution(&self) -> u32 {
        self.execution_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn accepts_additional_call_points(&self) -> bool {
        self.call_points.len() < MAX_CALL_POINTS
    }

    /// Record the test-code line that drove an execution, folding repeats
    /// from the same line into a repetition count
    pub fn add_call_point(&mut self, call_point: CallPoint) {
        for previous in self.call_points.iter_mut().rev() {
            if call_point.is_same_line_in_test_code(previous) {
                previous.increment_repetition_count();
                return;
            }
        }

        if self.accepts_additional_call_points() {
            self.call_points.push(call_point);
        }
    }

    pub fn call_points(&self) -> &[CallPoint] {
        &self.call_points
    }

    pub fn is_covered(&self) -> bool {
        self.is_covered_with_count(self.execution_count())
    }

    /// Covered check for segments whose count is tracked externally
    pub(crate) fn is_covered_with_count(&self, execution_count: u32) -> bool {
        self.unreachable || !self.empty && execution_count > 0
    }

    /// Fold the counts and call points of a previous test run into this one
    pub(crate) fn add_counts_from_previous_test_run(&mut self, previous: &LineSegmentData) {
        self.execution_count
            .fetch_add(previous.execution_count(), Ordering::Relaxed);
        self.call_points
            .splice(0..0, previous.call_points.iter().cloned());
    }
}

/// One side of a branching point: the jump source (even indices) or the jump
/// target (odd indices)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchData {
    /// Source line of the block this side lands on, 0 when unknown
    line: u32,
    segment: LineSegmentData,
}

impl BranchData {
    fn new(line: u32) -> BranchData {
        BranchData {
            line,
            segment: LineSegmentData::default(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Empty if explicitly marked so, or if no line was ever resolved
    pub fn is_empty(&self) -> bool {
        self.segment.empty || self.line == 0
    }

    pub fn is_covered(&self) -> bool {
        self.segment.is_covered()
    }

    pub fn segment(&self) -> &LineSegmentData {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut LineSegmentData {
        &mut self.segment
    }
}

/// Coverage data gathered for a single executable line of a source file
///
/// Branching points are stored as source/target pairs, in the order they were
/// discovered during instrumentation; the index handed back by
/// [`LineCoverageData::add_branching_point`] is what instrumented code passes
/// to the branch execution recording calls.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LineCoverageData {
    segment: LineSegmentData,
    branches: Vec<BranchData>,
}

impl LineCoverageData {
    /// Record a source/target pair, returning the index of the source
    pub fn add_branching_point(&mut self, source_line: u32, target_line: u32) -> usize {
        let initial_index = self.branches.len();
        self.branches.push(BranchData::new(source_line));
        self.branches.push(BranchData::new(target_line));
        initial_index
    }

    /// Mark the most recently added branch side as holding no executable code
    pub fn mark_last_segment_as_empty(&mut self) {
        if let Some(last) = self.branches.last_mut() {
            last.segment.mark_as_empty();
        }
    }

    pub fn contains_branches(&self) -> bool {
        !self.branches.is_empty()
    }

    pub fn branches(&self) -> &[BranchData] {
        &self.branches
    }

    pub fn branch(&self, index: usize) -> Option<&BranchData> {
        self.branches.get(index)
    }

    pub fn branch_mut(&mut self, index: usize) -> Option<&mut BranchData> {
        self.branches.get_mut(index)
    }

    /// The segment of the line itself, holding its call points
    pub fn segment(&self) -> &LineSegmentData {
        &self.segment
    }

    pub(crate) fn segment_mut(&mut self) -> &mut LineSegmentData {
        &mut self.segment
    }

    /// Count one execution of a branch side, returning the previous count;
    /// unknown indices are ignored
    pub fn register_branch_execution(&self, index: usize) -> u32 {
        match self.branches.get(index) {
            Some(branch) => branch.segment.register_execution(),
            None => 0,
        }
    }

    /// Number of segments this line contributes to the per-file totals
    ///
    /// The line itself is one segment. Each branching pair whose target
    /// resolved to a line adds one segment when the target jumps back into
    /// the same line and one more when the target holds executable code.
    pub fn segments(&self) -> u32 {
        let mut count = 1;

        for pair in self.branches.chunks_exact(2) {
            let (source, target) = (&pair[0], &pair[1]);

            if target.line > 0 {
                if target.line == source.line {
                    count += 1;
                }

                if !target.is_empty() {
                    count += 1;
                }
            }
        }

        count
    }

    /// Covered counterpart of [`LineCoverageData::segments`]
    ///
    /// The line's own execution count lives in the per-file array, so it is
    /// passed in rather than read from the segment.
    pub fn covered_segments(&self, line_execution_count: u32) -> u32 {
        let mut covered = u32::from(self.segment.is_covered_with_count(line_execution_count));

        for pair in self.branches.chunks_exact(2) {
            let (source, target) = (&pair[0], &pair[1]);

            if source.is_covered() && !target.is_empty() {
                covered += 1;
            }

            if target.is_covered() && target.line == source.line {
                covered += 1;
            }
        }

        covered
    }

    /// Number of branching sources and targets on this line
    pub fn branching_points(&self) -> u32 {
        let mut count = 0;

        for pair in self.branches.chunks_exact(2) {
            if !pair[0].is_empty() {
                count += 1;
            }

            count += 1;
        }

        count
    }

    /// Covered counterpart of [`LineCoverageData::branching_points`]
    pub fn covered_branching_points(&self) -> u32 {
        let mut covered = 0;

        for pair in self.branches.chunks_exact(2) {
            let (source, target) = (&pair[0], &pair[1]);

            if source.is_covered() {
                covered += 1;
            }

            if target.is_covered() && target.line == source.line {
                covered += 1;
            }
        }

        covered
    }

    pub(crate) fn add_counts_from_previous_test_run(&mut self, previous: &LineCoverageData) {
        self.segment
            .add_counts_from_previous_test_run(&previous.segment);

        for (branch, previous_branch) in self.branches.iter_mut().zip(&previous.branches) {
            branch
                .segment
                .add_counts_from_previous_test_run(&previous_branch.segment);
        }
    }
}

/// Line coverage for one source file
///
/// Executable lines register up front during instrumentation; only lines with
/// branching points or call points grow a [`LineCoverageData`], the rest stay
/// as a bare execution counter. The counter array is sized at registration
/// time so the recording path never allocates.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PerFileLineCoverage {
    line_to_line_data: HashMap<u32, Option<LineCoverageData>>,
    execution_counts: Vec<AtomicU32>,
    last_line: u32,

    /// Total and covered segments, computed on demand
    #[serde(skip)]
    computed_segments: Option<(u32, u32)>,
}

impl PerFileLineCoverage {
    /// Register an executable line
    pub fn add_line(&mut self, line: u32) {
        self.line_to_line_data.entry(line).or_insert(None);

        if line > self.last_line {
            if line as usize >= self.execution_counts.len() {
                // slack for trailing lines of types loaded later from the
                // same source file
                let new_len = line as usize + 30;
                self.execution_counts
                    .resize_with(new_len, AtomicU32::default);
            }

            self.last_line = line;
        }

        self.computed_segments = None;
    }

    /// Line data for branching points and call points, created on first use
    pub fn get_or_create_line_data(&mut self, line: u32) -> &mut LineCoverageData {
        self.computed_segments = None;
        self.line_to_line_data
            .entry(line)
            .or_insert(None)
            .get_or_insert_with(LineCoverageData::default)
    }

    pub fn line_data(&self, line: u32) -> Option<&LineCoverageData> {
        self.line_to_line_data.get(&line)?.as_ref()
    }

    pub fn has_line_data(&self, line: u32) -> bool {
        self.line_to_line_data.contains_key(&line)
    }

    pub fn mark_last_line_segment_as_empty(&mut self, line: u32) {
        if let Some(Some(line_data)) = self.line_to_line_data.get_mut(&line) {
            line_data.mark_last_segment_as_empty();
        }
    }

    pub fn mark_line_as_reachable(&mut self, line: u32) {
        if let Some(Some(line_data)) = self.line_to_line_data.get_mut(&line) {
            line_data.segment_mut().mark_as_reachable();
        }
    }

    /// Count one execution of a line, returning the previous count; lines
    /// that were never registered are ignored
    pub fn register_execution(&self, line: u32) -> u32 {
        match self.execution_counts.get(line as usize) {
            Some(count) => count.fetch_add(1, Ordering::Relaxed),
            None => 0,
        }
    }

    /// Count one execution of a branch side, returning the previous count
    pub fn register_branch_execution(&self, line: u32, branch_index: usize) -> u32 {
        match self.line_to_line_data.get(&line) {
            Some(Some(line_data)) => line_data.register_branch_execution(branch_index),
            _ => 0,
        }
    }

    pub fn execution_count(&self, line: u32) -> u32 {
        self.execution_counts
            .get(line as usize)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Highest registered line
    pub fn line_count(&self) -> u32 {
        self.last_line
    }

    pub fn executable_line_count(&self) -> usize {
        self.line_to_line_data.len()
    }

    /// Segments a line contributes to the totals: 0 for a line never
    /// registered, 1 for a plain line, more when it has branching points
    pub fn segments_for_line(&self, line: u32) -> u32 {
        match self.line_to_line_data.get(&line) {
            None => 0,
            Some(None) => 1,
            Some(Some(line_data)) => line_data.segments(),
        }
    }

    pub fn total_items(&mut self) -> u32 {
        self.compute_segments_if_needed().0
    }

    pub fn covered_items(&mut self) -> u32 {
        self.compute_segments_if_needed().1
    }

    pub fn coverage_percentage(&mut self) -> i32 {
        let (total, covered) = self.compute_segments_if_needed();
        calculate(covered, total)
    }

    fn compute_segments_if_needed(&mut self) -> (u32, u32) {
        if let Some(computed) = self.computed_segments {
            return computed;
        }

        let mut total = 0;
        let mut covered = 0;

        for line in 1..=self.last_line {
            match self.line_to_line_data.get(&line) {
                None => {}
                Some(None) => {
                    total += 1;
                    if self.execution_count(line) > 0 {
                        covered += 1;
                    }
                }
                Some(Some(line_data)) => {
                    total += line_data.segments();
                    covered += line_data.covered_segments(self.execution_count(line));
                }
            }
        }

        self.computed_segments = Some((total, covered));
        (total, covered)
    }

    /// Fold a previous test run's data into this one
    ///
    /// Lines both runs know add their counts together; lines only the
    /// previous run knew are carried over as-is.
    pub fn merge_information(&mut self, previous: &PerFileLineCoverage) {
        let previous_run_had_executions = !previous.execution_counts.is_empty();

        for (&line, line_data) in &mut self.line_to_line_data {
            match previous.line_to_line_data.get(&line) {
                None => continue,
                Some(Some(previous_line_data)) => {
                    line_data
                        .get_or_insert_with(LineCoverageData::default)
                        .add_counts_from_previous_test_run(previous_line_data);
                }
                Some(None) => {}
            }

            if previous_run_had_executions {
                if let Some(count) = self.execution_counts.get(line as usize) {
                    count.fetch_add(previous.execution_count(line), Ordering::Relaxed);
                }
            }
        }

        for (&line, previous_line_data) in &previous.line_to_line_data {
            if !self.line_to_line_data.contains_key(&line) {
                self.line_to_line_data
                    .insert(line, previous_line_data.clone());

                if line > self.last_line {
                    self.last_line = line;
                }

                if previous_run_had_executions {
                    if self.execution_counts.len() < previous.execution_counts.len() {
                        self.execution_counts
                            .resize_with(previous.execution_counts.len(), AtomicU32::default);
                    }

                    self.execution_counts[line as usize]
                        .store(previous.execution_count(line), Ordering::Relaxed);
                }
            }
        }

        self.computed_segments = None;
    }
}
