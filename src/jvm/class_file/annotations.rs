use crate::jvm::class_file::{Attribute, ConstantsPool};
use crate::jvm::Error;
use byteorder::{BigEndian, WriteBytesExt};

/// One annotation, in resolved (string) form
///
/// The reader resolves constant pool indices into strings while decoding so
/// annotations can be inspected and compared without a pool in hand; encoding
/// re-interns everything through a [`ConstantsPool`].
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation type (eg. `Lcom/acme/Marker;`)
    pub type_descriptor: String,

    /// Element name and value pairs, in declaration order
    pub values: Vec<(String, ElementValue)>,
}

/// Value of one annotation element
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16.1
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl Annotation {
    /// Encode into the raw `annotation` structure, interning constants
    pub fn encode(&self, pool: &mut ConstantsPool, buf: &mut Vec<u8>) -> Result<(), Error> {
        let type_index = pool.get_utf8(self.type_descriptor.as_str())?;
        buf.write_u16::<BigEndian>(type_index.0 .0)?;
        buf.write_u16::<BigEndian>(self.values.len() as u16)?;
        for (name, value) in &self.values {
            let name_index = pool.get_utf8(name.as_str())?;
            buf.write_u16::<BigEndian>(name_index.0 .0)?;
            value.encode(pool, buf)?;
        }
        Ok(())
    }
}

impl ElementValue {
    /// Single character tag identifying the value variant on the wire
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Byte(_) => b'B',
            ElementValue::Char(_) => b'C',
            ElementValue::Double(_) => b'D',
            ElementValue::Float(_) => b'F',
            ElementValue::Int(_) => b'I',
            ElementValue::Long(_) => b'J',
            ElementValue::Short(_) => b'S',
            ElementValue::Boolean(_) => b'Z',
            ElementValue::String(_) => b's',
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class(_) => b'c',
            ElementValue::Annotation(_) => b'@',
            ElementValue::Array(_) => b'[',
        }
    }

    pub fn encode(&self, pool: &mut ConstantsPool, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.write_u8(self.tag())?;
        match self {
            ElementValue::Byte(b) => {
                let index = pool.get_integer(*b as i32)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Char(c) => {
                let index = pool.get_integer(*c as i32)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Short(s) => {
                let index = pool.get_integer(*s as i32)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Int(i) => {
                let index = pool.get_integer(*i)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Boolean(z) => {
                let index = pool.get_integer(*z as i32)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Long(l) => {
                let index = pool.get_long(*l)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Float(f) => {
                let index = pool.get_float(*f)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::Double(d) => {
                let index = pool.get_double(*d)?;
                buf.write_u16::<BigEndian>(index.0)?;
            }
            ElementValue::String(s) => {
                let index = pool.get_utf8(s.as_str())?;
                buf.write_u16::<BigEndian>(index.0 .0)?;
            }
            ElementValue::Enum {
                type_descriptor,
                const_name,
            } => {
                let type_index = pool.get_utf8(type_descriptor.as_str())?;
                let name_index = pool.get_utf8(const_name.as_str())?;
                buf.write_u16::<BigEndian>(type_index.0 .0)?;
                buf.write_u16::<BigEndian>(name_index.0 .0)?;
            }
            ElementValue::Class(descriptor) => {
                let index = pool.get_utf8(descriptor.as_str())?;
                buf.write_u16::<BigEndian>(index.0 .0)?;
            }
            ElementValue::Annotation(nested) => {
                nested.encode(pool, buf)?;
            }
            ElementValue::Array(values) => {
                buf.write_u16::<BigEndian>(values.len() as u16)?;
                for value in values {
                    value.encode(pool, buf)?;
                }
            }
        }
        Ok(())
    }
}

/// Build a `RuntimeVisibleAnnotations` attribute from resolved annotations
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
pub fn runtime_visible_annotations(
    pool: &mut ConstantsPool,
    annotations: &[Annotation],
) -> Result<Attribute, Error> {
    let name_index = pool.get_utf8("RuntimeVisibleAnnotations")?;
    let mut info = vec![];
    info.write_u16::<BigEndian>(annotations.len() as u16)?;
    for annotation in annotations {
        annotation.encode(pool, &mut info)?;
    }
    Ok(Attribute { name_index, info })
}
