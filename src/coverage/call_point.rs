use serde::{Deserialize, Serialize};

/// Most call points kept per segment; later callers from new call sites are
/// dropped once a segment has this many
pub const MAX_CALL_POINTS: usize = 10;

/// Place in test code that drove one execution of a line or branch segment
///
/// Repeated executions from the same test line fold into the existing entry
/// by bumping its repetition count instead of growing the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPoint {
    pub class_name: String,
    pub method_name: String,
    pub line: u32,
    repetition_count: u32,
}

impl CallPoint {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>, line: u32) -> CallPoint {
        CallPoint {
            class_name: class_name.into(),
            method_name: method_name.into(),
            line,
            repetition_count: 0,
        }
    }

    pub fn repetition_count(&self) -> u32 {
        self.repetition_count
    }

    pub fn increment_repetition_count(&mut self) {
        self.repetition_count += 1;
    }

    pub fn is_same_test_method(&self, other: &CallPoint) -> bool {
        self.class_name == other.class_name && self.method_name == other.method_name
    }

    pub fn is_same_line_in_test_code(&self, other: &CallPoint) -> bool {
        self.is_same_test_method(other) && self.line == other.line
    }
}
