use crate::coverage::calculate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counts shared by both kinds of field data
///
/// `covered` is a memo of the kind-specific check, invalidated whenever new
/// events arrive. The per-test maps do not survive a snapshot, so the memo is
/// forced and persisted with the counts; see
/// [`CoverageData::write_to_file`](crate::coverage::CoverageData::write_to_file).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FieldData {
    read_count: u32,
    write_count: u32,
    covered: Option<bool>,
}

impl FieldData {
    pub fn read_count(&self) -> u32 {
        self.read_count
    }

    pub fn write_count(&self) -> u32 {
        self.write_count
    }

    fn add_counts(&mut self, previous: &FieldData) {
        self.read_count += previous.read_count;
        self.write_count += previous.write_count;
    }
}

/// Per-test assignment state of one static field
///
/// A field is covered once some test read a value it assigned: each
/// assignment marks the running test as holding an unread value, each read
/// clears the mark, and any cleared mark means coverage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StaticFieldData {
    data: FieldData,

    /// Per test id: `true` while the last assigned value is still unread
    #[serde(skip)]
    test_assignments: HashMap<u32, bool>,
}

impl StaticFieldData {
    pub fn register_assignment(&mut self, test_id: u32) {
        self.test_assignments.insert(test_id, true);
        self.data.write_count += 1;
        self.data.covered = None;
    }

    pub fn register_read(&mut self, test_id: u32) {
        self.test_assignments.insert(test_id, false);
        self.data.read_count += 1;
        self.data.covered = None;
    }

    pub fn is_covered(&mut self) -> bool {
        if self.data.covered.is_none() {
            let covered = self.test_assignments.values().any(|unread| !unread);
            self.data.covered = Some(covered);
        }
        self.data.covered == Some(true)
    }

    fn peek_covered(&self) -> bool {
        self.data
            .covered
            .unwrap_or_else(|| self.test_assignments.values().any(|unread| !unread))
    }

    pub fn field_data(&self) -> &FieldData {
        &self.data
    }

    pub(crate) fn add_counts_from_previous_test_run(&mut self, previous: &StaticFieldData) {
        self.data.add_counts(&previous.data);
        let covered = self.is_covered() || previous.peek_covered();
        self.data.covered = Some(covered);

        for (&test_id, &unread) in &previous.test_assignments {
            // a read in either run keeps the mark cleared
            self.test_assignments
                .entry(test_id)
                .and_modify(|pending| *pending &= unread)
                .or_insert(unread);
        }
    }
}

/// Per-test assignment state of one instance field
///
/// Assignments track which owner instances still hold an unread value, per
/// test. A test whose list drains to empty read everything it assigned, which
/// counts as coverage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InstanceFieldData {
    data: FieldData,

    /// Per test id: owner instances with an assigned but unread value
    #[serde(skip)]
    test_assignments: HashMap<u32, Vec<u64>>,
}

impl InstanceFieldData {
    pub fn register_assignment(&mut self, test_id: u32, instance_id: u64) {
        let unread = self.test_assignments.entry(test_id).or_default();
        if !unread.contains(&instance_id) {
            unread.push(instance_id);
        }
        self.data.write_count += 1;
        self.data.covered = None;
    }

    pub fn register_read(&mut self, test_id: u32, instance_id: u64) {
        let unread = self.test_assignments.entry(test_id).or_default();
        if let Some(position) = unread.iter().position(|&id| id == instance_id) {
            unread.remove(position);
        }
        self.data.read_count += 1;
        self.data.covered = None;
    }

    pub fn is_covered(&mut self) -> bool {
        if self.data.covered.is_none() {
            let covered = self.test_assignments.values().any(|unread| unread.is_empty());
            self.data.covered = Some(covered);
        }
        self.data.covered == Some(true)
    }

    fn peek_covered(&self) -> bool {
        self.data
            .covered
            .unwrap_or_else(|| self.test_assignments.values().any(|unread| unread.is_empty()))
    }

    pub fn field_data(&self) -> &FieldData {
        &self.data
    }

    /// Owner instances that still hold an unread value, for an uncovered
    /// field
    pub fn owner_instances_with_unread_assignments(&self) -> Vec<u64> {
        if self.peek_covered() {
            return vec![];
        }

        self.test_assignments
            .values()
            .next()
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn add_counts_from_previous_test_run(&mut self, previous: &InstanceFieldData) {
        self.data.add_counts(&previous.data);
        let covered = self.is_covered() || previous.peek_covered();
        self.data.covered = Some(covered);

        for (&test_id, previous_unread) in &previous.test_assignments {
            let unread = self.test_assignments.entry(test_id).or_default();
            for &instance_id in previous_unread {
                if !unread.contains(&instance_id) {
                    unread.push(instance_id);
                }
            }
        }
    }
}

/// Field coverage for one source file
///
/// Fields are keyed by `Class.field`; `all_fields` keeps them in the order
/// instrumentation registered them. Events for fields that never registered
/// are silently dropped.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PerFileDataCoverage {
    all_fields: Vec<String>,
    static_fields: HashMap<String, StaticFieldData>,
    instance_fields: HashMap<String, InstanceFieldData>,

    #[serde(skip)]
    covered_data_items: Option<u32>,
}

impl PerFileDataCoverage {
    pub fn add_field(&mut self, class_name: &str, field_name: &str, is_static: bool) {
        let class_and_field = format!("{class_name}.{field_name}");

        if !self.all_fields.contains(&class_and_field) {
            self.all_fields.push(class_and_field.clone());
        }

        if is_static {
            self.static_fields
                .insert(class_and_field, StaticFieldData::default());
        } else {
            self.instance_fields
                .insert(class_and_field, InstanceFieldData::default());
        }

        self.covered_data_items = None;
    }

    pub fn is_field_with_coverage_data(&self, class_and_field: &str) -> bool {
        self.static_fields.contains_key(class_and_field)
            || self.instance_fields.contains_key(class_and_field)
    }

    /// Registered fields, in registration order
    pub fn all_fields(&self) -> &[String] {
        &self.all_fields
    }

    pub fn has_fields(&self) -> bool {
        !self.all_fields.is_empty()
    }

    pub fn static_field_data(&self, class_and_field: &str) -> Option<&StaticFieldData> {
        self.static_fields.get(class_and_field)
    }

    pub fn instance_field_data(&self, class_and_field: &str) -> Option<&InstanceFieldData> {
        self.instance_fields.get(class_and_field)
    }

    pub fn register_assignment_to_static_field(&mut self, class_and_field: &str, test_id: u32) {
        if let Some(field) = self.static_fields.get_mut(class_and_field) {
            field.register_assignment(test_id);
            self.covered_data_items = None;
        }
    }

    pub fn register_read_of_static_field(&mut self, class_and_field: &str, test_id: u32) {
        if let Some(field) = self.static_fields.get_mut(class_and_field) {
            field.register_read(test_id);
            self.covered_data_items = None;
        }
    }

    pub fn register_assignment_to_instance_field(
        &mut self,
        class_and_field: &str,
        test_id: u32,
        instance_id: u64,
    ) {
        if let Some(field) = self.instance_fields.get_mut(class_and_field) {
            field.register_assignment(test_id, instance_id);
            self.covered_data_items = None;
        }
    }

    pub fn register_read_of_instance_field(
        &mut self,
        class_and_field: &str,
        test_id: u32,
        instance_id: u64,
    ) {
        if let Some(field) = self.instance_fields.get_mut(class_and_field) {
            field.register_read(test_id, instance_id);
            self.covered_data_items = None;
        }
    }

    pub fn is_covered(&mut self, class_and_field: &str) -> bool {
        if let Some(field) = self.instance_fields.get_mut(class_and_field) {
            if field.is_covered() {
                return true;
            }
        }

        match self.static_fields.get_mut(class_and_field) {
            Some(field) => field.is_covered(),
            None => false,
        }
    }

    pub fn total_items(&self) -> u32 {
        (self.static_fields.len() + self.instance_fields.len()) as u32
    }

    pub fn covered_items(&mut self) -> u32 {
        if let Some(covered) = self.covered_data_items {
            return covered;
        }

        let mut covered = 0;
        for field in self.static_fields.values_mut() {
            if field.is_covered() {
                covered += 1;
            }
        }
        for field in self.instance_fields.values_mut() {
            if field.is_covered() {
                covered += 1;
            }
        }

        self.covered_data_items = Some(covered);
        covered
    }

    pub fn coverage_percentage(&mut self) -> i32 {
        let total = self.total_items();

        if total == 0 {
            return -1;
        }

        let covered = self.covered_items();
        calculate(covered, total)
    }

    /// Fold a previous test run's data into this one: common fields add
    /// their counts, fields only the previous run knew are carried over
    pub fn merge_information(&mut self, previous: &PerFileDataCoverage) {
        for (name, field) in &mut self.static_fields {
            if let Some(previous_field) = previous.static_fields.get(name) {
                field.add_counts_from_previous_test_run(previous_field);
            }
        }
        for (name, previous_field) in &previous.static_fields {
            if !self.static_fields.contains_key(name) {
                self.static_fields.insert(name.clone(), previous_field.clone());
            }
        }

        for (name, field) in &mut self.instance_fields {
            if let Some(previous_field) = previous.instance_fields.get(name) {
                field.add_counts_from_previous_test_run(previous_field);
            }
        }
        for (name, previous_field) in &previous.instance_fields {
            if !self.instance_fields.contains_key(name) {
                self.instance_fields
                    .insert(name.clone(), previous_field.clone());
            }
        }

        for name in &previous.all_fields {
            if !self.all_fields.contains(name) {
                self.all_fields.push(name.clone());
            }
        }

        self.covered_data_items = None;
    }
}
