use crate::util::{OffsetVec, Width};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an
/// extra trait (instead of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///   - everything multi-byte is big-endian
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

macro_rules! serialize_primitive {
    ($ty:ty, $write:ident) => {
        impl Serialize for $ty {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                writer.$write::<BigEndian>(*self)
            }
        }
    };
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

serialize_primitive!(u16, write_u16);
serialize_primitive!(u32, write_u32);
serialize_primitive!(u64, write_u64);
serialize_primitive!(i16, write_i16);
serialize_primitive!(i32, write_i32);
serialize_primitive!(i64, write_i64);
serialize_primitive!(f32, write_f32);
serialize_primitive!(f64, write_f64);

/// The count written first is the offset one past the final entry, so wide
/// entries consume two counts (this is how the constant pool is counted)
impl<A: Serialize + Width> Serialize for OffsetVec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, elem) in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// Size in `u16` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}
