use crate::jvm::Error;
use std::fmt;

/// Opaque label marking the start of a basic block
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(usize);

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// Verification frame type for an object reference, to be combined with a
/// class constant index
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.10.1.2
pub const OBJECT_FRAME_TYPE: u32 = 0x0070_0000;

/// Control flow edge out of a basic block
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Edge {
    pub kind: EdgeKind,
    pub target: Label,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EdgeKind {
    /// Control may leave for the target from anywhere in the block
    Exception,

    /// Like `Exception`, but carrying the verification frame type of the
    /// caught class (`OBJECT_FRAME_TYPE | class constant index`)
    TypedException(u32),
}

#[derive(Debug, Default)]
struct LabelInfo {
    /// Bytecode offset, once the block has been placed
    offset: Option<u16>,

    /// Set when this label has been merged into another one; all queries
    /// resolve through the redirect
    redirect: Option<Label>,

    /// Next basic block in layout order
    next: Option<Label>,

    successors: Vec<Edge>,

    /// Whether some instruction or handler jumps here
    target: bool,

    /// Source line the block starts on, when known
    line: Option<u32>,
}

/// Arena owning every label of one method body
///
/// Labels are cheap indices into the arena. When two labels turn out to mark
/// the same bytecode offset, one is merged into the other with a redirect and
/// every query resolves through [`LabelArena::canonical`]; nothing ever holds
/// a direct reference to another label's state.
#[derive(Debug, Default)]
pub struct LabelArena {
    labels: Vec<LabelInfo>,
}

impl LabelArena {
    pub fn new() -> LabelArena {
        LabelArena { labels: vec![] }
    }

    /// Allocate a fresh, unplaced label
    pub fn fresh_label(&mut self) -> Label {
        let label = Label(self.labels.len());
        self.labels.push(LabelInfo::default());
        label
    }

    /// Resolve a label through any redirects to the one holding its state
    pub fn canonical(&self, mut label: Label) -> Label {
        while let Some(redirect) = self.labels[label.0].redirect {
            label = redirect;
        }
        label
    }

    /// Merge `from` into `into`: afterwards the two labels are
    /// interchangeable and `into` holds the combined state
    pub fn merge(&mut self, from: Label, into: Label) {
        let from = self.canonical(from);
        let into = self.canonical(into);
        if from == into {
            return;
        }

        let absorbed = std::mem::take(&mut self.labels[from.0]);
        self.labels[from.0].redirect = Some(into);

        let kept = &mut self.labels[into.0];
        kept.offset = kept.offset.or(absorbed.offset);
        kept.next = kept.next.or(absorbed.next);
        kept.target |= absorbed.target;
        kept.line = kept.line.or(absorbed.line);
        kept.successors.extend(absorbed.successors);
    }

    /// Record the bytecode offset a label was placed at
    pub fn place(&mut self, label: Label, offset: u16) {
        let label = self.canonical(label);
        self.labels[label.0].offset = Some(offset);
    }

    /// Bytecode offset of a placed label
    pub fn offset(&self, label: Label) -> Result<u16, Error> {
        let canonical = self.canonical(label);
        self.labels[canonical.0]
            .offset
            .ok_or(Error::UnplacedLabel(label))
    }

    /// Link `next` as the block following `label` in layout order
    pub fn link(&mut self, label: Label, next: Label) {
        let label = self.canonical(label);
        self.labels[label.0].next = Some(next);
    }

    /// Block following `label` in layout order
    pub fn next(&self, label: Label) -> Option<Label> {
        let label = self.canonical(label);
        self.labels[label.0].next
    }

    pub fn add_edge(&mut self, label: Label, edge: Edge) {
        let label = self.canonical(label);
        self.labels[label.0].successors.push(edge);
    }

    pub fn successors(&self, label: Label) -> &[Edge] {
        let label = self.canonical(label);
        &self.labels[label.0].successors
    }

    pub fn mark_target(&mut self, label: Label) {
        let label = self.canonical(label);
        self.labels[label.0].target = true;
    }

    pub fn is_target(&self, label: Label) -> bool {
        let label = self.canonical(label);
        self.labels[label.0].target
    }

    pub fn set_line(&mut self, label: Label, line: u32) {
        let label = self.canonical(label);
        self.labels[label.0].line = Some(line);
    }

    pub fn line(&self, label: Label) -> Option<u32> {
        let label = self.canonical(label);
        self.labels[label.0].line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_labels_share_state() {
        let mut arena = LabelArena::new();
        let a = arena.fresh_label();
        let b = arena.fresh_label();
        let c = arena.fresh_label();

        arena.place(a, 8);
        arena.add_edge(a, Edge {
            kind: EdgeKind::Exception,
            target: c,
        });
        arena.merge(b, a);

        assert_eq!(arena.canonical(b), a);
        assert_eq!(arena.offset(b).unwrap(), 8);
        assert_eq!(arena.successors(b).len(), 1);

        // edges added through the alias land on the canonical label
        arena.add_edge(b, Edge {
            kind: EdgeKind::Exception,
            target: c,
        });
        assert_eq!(arena.successors(a).len(), 2);
    }

    #[test]
    fn redirect_chains_resolve_to_one_label() {
        let mut arena = LabelArena::new();
        let a = arena.fresh_label();
        let b = arena.fresh_label();
        let c = arena.fresh_label();

        arena.merge(c, b);
        arena.merge(b, a);

        assert_eq!(arena.canonical(c), a);
        assert_eq!(arena.canonical(b), a);
        assert_eq!(arena.canonical(a), a);
    }

    #[test]
    fn unplaced_labels_cannot_be_resolved_to_offsets() {
        let mut arena = LabelArena::new();
        let a = arena.fresh_label();

        match arena.offset(a) {
            Err(Error::UnplacedLabel(label)) => assert_eq!(label, a),
            other => panic!("expected unplaced label, got {:?}", other.ok()),
        }
    }
}
