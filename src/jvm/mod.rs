//! Model of the JVM class file format
//!
//! Reading starts from [`class_file::ClassReader::new`], which checks the
//! header and decodes the constant pool; [`class_file::ClassReader::parse_class`]
//! turns the rest of the bytes into a [`class_file::ClassFile`]. Writing goes
//! the other way:
//! the structural model serializes through [`class_file::Serialize`], with
//! new constants interned through [`class_file::ConstantsPool`]. One
//! reader/writer pair owns one class transform end to end; nothing here is
//! shared between threads.

mod access_flags;
mod binary_format;
pub mod class_file;
pub mod code;
mod errors;

pub use access_flags::*;
pub use binary_format::*;
pub use errors::*;
