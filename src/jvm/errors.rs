use crate::jvm::class_file::Constant;
use crate::jvm::code::Label;
use thiserror::Error;

/// Errors produced while decoding, rewriting, or re-encoding one class file
///
/// Any of these aborts the transform of the class that produced it; the
/// class-loading pipeline must fail that load rather than emit a partially
/// instrumented class.
#[derive(Debug, Error)]
pub enum Error {
    #[error("class file ends early: needed {needed} byte(s) at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("bad magic bytes {found:02x?} (expected cafebabe)")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unknown constant pool tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    #[error("constant pool index {index} is out of range or unusable")]
    BadConstantIndex { index: u16 },

    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstantType {
        index: u16,
        expected: &'static str,
    },

    #[error("constant pool overflow inserting {constant:?} at offset {offset}")]
    ConstantPoolOverflow { constant: Constant, offset: usize },

    #[error("utf8 constant at offset {offset} is not valid modified utf8")]
    InvalidModifiedUtf8 { offset: usize },

    #[error("malformed {name} attribute: {reason}")]
    MalformedAttribute { name: String, reason: String },

    #[error("unknown element value tag {tag:?} in annotation")]
    UnknownElementValueTag { tag: char },

    #[error("label {0:?} used before being placed")]
    UnplacedLabel(Label),

    #[error("exception handler range is not a linked chain of blocks after {reached:?}")]
    BrokenHandlerRange { reached: Label },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
