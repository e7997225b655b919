use crate::jvm::class_file::Serialize;
use crate::util::Width;
use byteorder::WriteBytesExt;

/// Tags identifying each kind of constant pool entry
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4-210
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// Entries of the constant pool
///
/// `Methodref` and `InterfaceMethodref` share one variant distinguished by
/// `is_interface`; everything else maps one-to-one onto a tag.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8: the null character
    /// is 2 bytes and supplementary characters are encoded as surrogate
    /// pairs. See [`encode_modified_utf8`].
    Utf8(String),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long` (occupies two pool slots)
    Long(i64),

    /// Constant primitive of type `double` (occupies two pool slots)
    Double(f64),

    /// Class or interface, pointing at its internal name
    Class(Utf8ConstantIndex),

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Field reference
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method reference (combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// `FieldRef` for the field kinds, `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Module, pointing at its name (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package, pointing at its internal name (only in `module-info` classes)
    Package(Utf8ConstantIndex),
}

impl Constant {
    /// Human-readable name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class(_) => "Class",
            Constant::String(_) => "String",
            Constant::FieldRef(_, _) => "Fieldref",
            Constant::MethodRef { .. } => "Methodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                tag::UTF8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                tag::INTEGER.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                tag::FLOAT.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                tag::LONG.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                tag::DOUBLE.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                tag::CLASS.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(utf8) => {
                tag::STRING.serialize(writer)?;
                utf8.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                tag::FIELD_REF.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let t = if *is_interface {
                    tag::INTERFACE_METHOD_REF
                } else {
                    tag::METHOD_REF
                };
                t.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                tag::NAME_AND_TYPE.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                tag::METHOD_HANDLE.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                tag::METHOD_TYPE.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                tag::DYNAMIC.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                tag::INVOKE_DYNAMIC.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::Module(name) => {
                tag::MODULE.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                tag::PACKAGE.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Almost all constants have width 1, except for `Long` and `Double`: an
/// 8-byte constant at index `n` makes index `n + 1` valid but unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    pub fn from_byte(byte: u8) -> Option<HandleKind> {
        let kind = match byte {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_byte(self) -> u8 {
        match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        }
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.as_byte().serialize(writer)
    }
}

/// Raw index into the constant pool (1-based)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

macro_rules! typed_constant_index {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
        pub struct $name(pub ConstantIndex);

        impl From<$name> for ConstantIndex {
            fn from(idx: $name) -> ConstantIndex {
                idx.0
            }
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }
    };
}

typed_constant_index!(
    /// Index of a `Utf8` constant
    Utf8ConstantIndex
);
typed_constant_index!(
    /// Index of a `String` constant
    StringConstantIndex
);
typed_constant_index!(
    /// Index of a `Class` constant
    ClassConstantIndex
);
typed_constant_index!(
    /// Index of a `NameAndType` constant
    NameAndTypeConstantIndex
);
typed_constant_index!(
    /// Index of a `Fieldref` constant
    FieldRefConstantIndex
);
typed_constant_index!(
    /// Index of a `Methodref` or `InterfaceMethodref` constant
    MethodRefConstantIndex
);

impl ClassConstantIndex {
    /// The zero index, used in exception tables to mean "catch everything"
    pub const CATCH_ALL: ClassConstantIndex = ClassConstantIndex(ConstantIndex(0));
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Modified UTF-8 format used in class files.
///
/// Quoting [the `DataInput` documentation][0]:
///
/// > The differences between this format and the standard UTF-8 format are
/// > the following:
/// >
/// >  * The null byte `\u{0000}` is encoded in 2-byte format rather than
/// >    1-byte, so that the encoded strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate
/// >    pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                let code = code - 0x10000;
                let high = 0xD800 + (code >> 10);
                let low = 0xDC00 + (code & 0x3FF);
                for surrogate in [high, low] {
                    buffer.push((surrogate >> 12 & 0x0F) as u8 | 0b1110_0000);
                    buffer.push((surrogate >> 6 & 0x3F) as u8 | 0b1000_0000);
                    buffer.push((surrogate & 0x3F) as u8 | 0b1000_0000);
                }
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Decodes into UTF-16 code units first (the JVM's native view of strings),
/// so that surrogate pairs re-combine into supplementary characters. Returns
/// `None` for byte sequences that are not valid modified UTF-8.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b0 = bytes[i];

        if b0 & 0b1000_0000 == 0 {
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0b1110_0000 == 0b1100_0000 {
            let b1 = *bytes.get(i + 1)?;
            units.push(((b0 as u16 & 0x1F) << 6) | (b1 as u16 & 0x3F));
            i += 2;
        } else if b0 & 0b1111_0000 == 0b1110_0000 {
            let b1 = *bytes.get(i + 1)?;
            let b2 = *bytes.get(i + 2)?;
            units.push(((b0 as u16 & 0x0F) << 12) | ((b1 as u16 & 0x3F) << 6) | (b2 as u16 & 0x3F));
            i += 3;
        } else {
            return None;
        }
    }

    String::from_utf16(&units).ok()
}
