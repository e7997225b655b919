use crate::jvm::class_file::{
    decode_modified_utf8, tag, Annotation, Attribute, BytecodeIndex, ClassConstantIndex, ClassFile,
    Constant, ConstantIndex, ElementValue, ExceptionTableEntry, Field, HandleKind, LineNumber,
    Method, NameAndTypeConstantIndex, Utf8ConstantIndex, Version,
};
use crate::jvm::{ClassAccessFlags, Error, FieldAccessFlags, MethodAccessFlags};
use crate::util::{Offset, OffsetVec};

/// Cursor over the bytes of one class file
///
/// Construction parses the header and the whole constant pool up front, so
/// every later read can resolve pool indices without seeking. The rest of the
/// class is pulled through [`ClassReader::parse_class`] or through the lower
/// level `read_*` methods.
pub struct ClassReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    version: Version,
    constants: OffsetVec<Constant>,
}

/// Attributes every context can carry, resolved while reading
///
/// Contexts that recognize more than these implement [`AttributeHandler`] on
/// top; anything neither side recognizes is skipped by its length and kept
/// only in raw form.
#[derive(Debug, Default)]
pub struct CommonAttributes {
    pub signature: Option<String>,
    pub deprecated: bool,
    pub synthetic: bool,
    pub annotations: Vec<Annotation>,
}

/// Hook for attributes specific to one context (class, field, method, code)
///
/// `read_attribute` returns `Ok(true)` once it has consumed exactly `length`
/// bytes of payload, or `Ok(false)` without consuming anything to leave the
/// attribute to the generic skip path.
pub trait AttributeHandler {
    fn common_mut(&mut self) -> &mut CommonAttributes;

    fn read_attribute(
        &mut self,
        reader: &mut ClassReader,
        name: &str,
        length: u32,
    ) -> Result<bool, Error> {
        let _ = (reader, name, length);
        Ok(false)
    }
}

/// Class-level attributes recognized beyond [`CommonAttributes`]
#[derive(Debug, Default)]
pub struct ClassAttributes {
    pub common: CommonAttributes,
    pub source_file: Option<String>,
}

impl AttributeHandler for ClassAttributes {
    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }

    fn read_attribute(
        &mut self,
        reader: &mut ClassReader,
        name: &str,
        _length: u32,
    ) -> Result<bool, Error> {
        if name == "SourceFile" {
            let index = reader.read_u16()?;
            self.source_file = Some(reader.utf8_at(index)?.to_owned());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Field-level attributes recognized beyond [`CommonAttributes`]
#[derive(Debug, Default)]
pub struct FieldAttributes {
    pub common: CommonAttributes,
    pub constant_value: Option<ConstantIndex>,
}

impl AttributeHandler for FieldAttributes {
    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }

    fn read_attribute(
        &mut self,
        reader: &mut ClassReader,
        name: &str,
        _length: u32,
    ) -> Result<bool, Error> {
        if name == "ConstantValue" {
            self.constant_value = Some(ConstantIndex(reader.read_u16()?));
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Method-level attributes recognized beyond [`CommonAttributes`]
#[derive(Debug, Default)]
pub struct MethodAttributes {
    pub common: CommonAttributes,
    pub code: Option<CodeView>,

    /// Internal names of the declared checked exceptions
    pub exceptions: Vec<String>,
}

impl AttributeHandler for MethodAttributes {
    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }

    fn read_attribute(
        &mut self,
        reader: &mut ClassReader,
        name: &str,
        _length: u32,
    ) -> Result<bool, Error> {
        match name {
            "Code" => {
                self.code = Some(reader.read_code()?);
                Ok(true)
            }
            "Exceptions" => {
                let count = reader.read_u16()?;
                for _ in 0..count {
                    let index = reader.read_u16()?;
                    self.exceptions.push(reader.class_name_at(index)?.to_owned());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Decoded `Code` attribute of one method
///
/// The nested attributes that matter for line-level instrumentation are
/// resolved; everything else stays raw so it can be re-emitted untouched.
#[derive(Debug)]
pub struct CodeView {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_numbers: Vec<LineNumber>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Default)]
struct CodeAttributes {
    common: CommonAttributes,
    line_numbers: Vec<LineNumber>,
}

impl AttributeHandler for CodeAttributes {
    fn common_mut(&mut self) -> &mut CommonAttributes {
        &mut self.common
    }

    fn read_attribute(
        &mut self,
        reader: &mut ClassReader,
        name: &str,
        _length: u32,
    ) -> Result<bool, Error> {
        if name == "LineNumberTable" {
            let count = reader.read_u16()?;
            for _ in 0..count {
                let start_pc = BytecodeIndex(reader.read_u16()?);
                let line_number = reader.read_u16()?;
                self.line_numbers.push(LineNumber {
                    start_pc,
                    line_number,
                });
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Fully parsed class: the re-serializable [`ClassFile`] plus the resolved
/// attribute views of the class and each of its members
#[derive(Debug)]
pub struct ParsedClass {
    pub class_file: ClassFile,
    pub attributes: ClassAttributes,

    /// Parallel to `class_file.fields`
    pub fields: Vec<FieldAttributes>,

    /// Parallel to `class_file.methods`
    pub methods: Vec<MethodAttributes>,
}

impl<'a> ClassReader<'a> {
    /// Check the header and parse the constant pool
    pub fn new(bytes: &'a [u8]) -> Result<ClassReader<'a>, Error> {
        let mut reader = ClassReader {
            bytes,
            pos: 0,
            version: Version::JAVA8,
            constants: OffsetVec::new_starting_at(Offset(1)),
        };

        let magic = reader.read_bytes(4)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::BadMagic {
                found: [magic[0], magic[1], magic[2], magic[3]],
            });
        }

        let minor = reader.read_u16()?;
        let major = reader.read_u16()?;
        reader.version = Version::checked(major, minor)?;

        let count = reader.read_u16()? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            let constant = reader.read_constant()?;
            constants.push(constant);
        }
        reader.constants = constants;

        Ok(reader)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn constants(&self) -> &OffsetVec<Constant> {
        &self.constants
    }

    /// Parse everything after the constant pool
    pub fn parse_class(mut self) -> Result<ParsedClass, Error> {
        let access_flags = ClassAccessFlags::from_bits_truncate(self.read_u16()?);
        let this_class = ClassConstantIndex(ConstantIndex(self.read_u16()?));
        let super_class = ClassConstantIndex(ConstantIndex(self.read_u16()?));

        let interface_count = self.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(ClassConstantIndex(ConstantIndex(self.read_u16()?)));
        }

        let field_count = self.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        let mut field_views = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let access_flags = FieldAccessFlags::from_bits_truncate(self.read_u16()?);
            let name_index = Utf8ConstantIndex(ConstantIndex(self.read_u16()?));
            let descriptor_index = Utf8ConstantIndex(ConstantIndex(self.read_u16()?));
            let mut view = FieldAttributes::default();
            let attributes = self.read_attributes(&mut view)?;
            fields.push(Field {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
            field_views.push(view);
        }

        let method_count = self.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        let mut method_views = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access_flags = MethodAccessFlags::from_bits_truncate(self.read_u16()?);
            let name_index = Utf8ConstantIndex(ConstantIndex(self.read_u16()?));
            let descriptor_index = Utf8ConstantIndex(ConstantIndex(self.read_u16()?));
            let mut view = MethodAttributes::default();
            let attributes = self.read_attributes(&mut view)?;
            methods.push(Method {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
            method_views.push(view);
        }

        let mut class_view = ClassAttributes::default();
        let attributes = self.read_attributes(&mut class_view)?;

        Ok(ParsedClass {
            class_file: ClassFile {
                version: self.version,
                constants: self.constants,
                access_flags,
                this_class,
                super_class,
                interfaces,
                fields,
                methods,
                attributes,
            },
            attributes: class_view,
            fields: field_views,
            methods: method_views,
        })
    }

    /// Read an attribute list, resolving what the handler (or the common set)
    /// recognizes and keeping every attribute in raw form
    pub fn read_attributes<H: AttributeHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<Vec<Attribute>, Error> {
        let count = self.read_u16()?;
        let mut attributes = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let name_index = self.read_u16()?;
            let name = self.utf8_at(name_index)?.to_owned();
            let length = self.read_u32()?;
            let start = self.pos;

            let handled = match name.as_str() {
                "Signature" => {
                    let index = self.read_u16()?;
                    handler.common_mut().signature = Some(self.utf8_at(index)?.to_owned());
                    true
                }
                "Deprecated" => {
                    handler.common_mut().deprecated = true;
                    true
                }
                "Synthetic" => {
                    handler.common_mut().synthetic = true;
                    true
                }
                "RuntimeVisibleAnnotations" => {
                    handler.common_mut().annotations = self.read_annotations()?;
                    true
                }
                _ => handler.read_attribute(self, &name, length)?,
            };

            if handled {
                if self.pos != start + length as usize {
                    return Err(Error::MalformedAttribute {
                        name,
                        reason: format!(
                            "declared {} byte(s) but {} were consumed",
                            length,
                            self.pos - start
                        ),
                    });
                }
            } else {
                log::debug!("skipping unrecognized attribute {name} ({length} bytes)");
                self.skip(length as usize)?;
            }

            attributes.push(Attribute {
                name_index: Utf8ConstantIndex(ConstantIndex(name_index)),
                info: self.bytes[start..self.pos].to_vec(),
            });
        }

        Ok(attributes)
    }

    fn read_code(&mut self) -> Result<CodeView, Error> {
        let max_stack = self.read_u16()?;
        let max_locals = self.read_u16()?;
        let code_length = self.read_u32()? as usize;
        let bytecode = self.read_bytes(code_length)?.to_vec();

        let table_length = self.read_u16()?;
        let mut exception_table = Vec::with_capacity(table_length as usize);
        for _ in 0..table_length {
            exception_table.push(ExceptionTableEntry {
                start_pc: BytecodeIndex(self.read_u16()?),
                end_pc: BytecodeIndex(self.read_u16()?),
                handler_pc: BytecodeIndex(self.read_u16()?),
                catch_type: ClassConstantIndex(ConstantIndex(self.read_u16()?)),
            });
        }

        let mut nested = CodeAttributes::default();
        let attributes = self.read_attributes(&mut nested)?;

        Ok(CodeView {
            max_stack,
            max_locals,
            bytecode,
            exception_table,
            line_numbers: nested.line_numbers,
            attributes,
        })
    }

    fn read_constant(&mut self) -> Result<Constant, Error> {
        let offset = self.pos;
        let tag_byte = self.read_u8()?;

        let constant = match tag_byte {
            tag::UTF8 => {
                let length = self.read_u16()? as usize;
                let bytes = self.read_bytes(length)?;
                let string = decode_modified_utf8(bytes)
                    .ok_or(Error::InvalidModifiedUtf8 { offset })?;
                Constant::Utf8(string)
            }
            tag::INTEGER => Constant::Integer(self.read_i32()?),
            tag::FLOAT => Constant::Float(self.read_f32()?),
            tag::LONG => Constant::Long(self.read_i64()?),
            tag::DOUBLE => Constant::Double(self.read_f64()?),
            tag::CLASS => Constant::Class(self.read_utf8_index()?),
            tag::STRING => Constant::String(self.read_utf8_index()?),
            tag::FIELD_REF => Constant::FieldRef(
                ClassConstantIndex(ConstantIndex(self.read_u16()?)),
                self.read_name_and_type_index()?,
            ),
            tag::METHOD_REF | tag::INTERFACE_METHOD_REF => Constant::MethodRef {
                class: ClassConstantIndex(ConstantIndex(self.read_u16()?)),
                name_and_type: self.read_name_and_type_index()?,
                is_interface: tag_byte == tag::INTERFACE_METHOD_REF,
            },
            tag::NAME_AND_TYPE => Constant::NameAndType {
                name: self.read_utf8_index()?,
                descriptor: self.read_utf8_index()?,
            },
            tag::METHOD_HANDLE => {
                let kind_byte = self.read_u8()?;
                let handle_kind = HandleKind::from_byte(kind_byte).ok_or(
                    Error::UnknownConstantTag {
                        tag: kind_byte,
                        offset,
                    },
                )?;
                Constant::MethodHandle {
                    handle_kind,
                    member: ConstantIndex(self.read_u16()?),
                }
            }
            tag::METHOD_TYPE => Constant::MethodType {
                descriptor: self.read_utf8_index()?,
            },
            tag::DYNAMIC => Constant::Dynamic {
                bootstrap_method: self.read_u16()?,
                name_and_type: self.read_name_and_type_index()?,
            },
            tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method: self.read_u16()?,
                name_and_type: self.read_name_and_type_index()?,
            },
            tag::MODULE => Constant::Module(self.read_utf8_index()?),
            tag::PACKAGE => Constant::Package(self.read_utf8_index()?),
            other => {
                return Err(Error::UnknownConstantTag { tag: other, offset });
            }
        };

        Ok(constant)
    }

    fn read_annotations(&mut self) -> Result<Vec<Annotation>, Error> {
        let count = self.read_u16()?;
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            annotations.push(self.read_annotation()?);
        }
        Ok(annotations)
    }

    fn read_annotation(&mut self) -> Result<Annotation, Error> {
        let type_index = self.read_u16()?;
        let type_descriptor = self.utf8_at(type_index)?.to_owned();

        let pair_count = self.read_u16()?;
        let mut values = Vec::with_capacity(pair_count as usize);
        for _ in 0..pair_count {
            let name_index = self.read_u16()?;
            let name = self.utf8_at(name_index)?.to_owned();
            values.push((name, self.read_element_value()?));
        }

        Ok(Annotation {
            type_descriptor,
            values,
        })
    }

    fn read_element_value(&mut self) -> Result<ElementValue, Error> {
        let tag_byte = self.read_u8()?;
        let value = match tag_byte {
            b'B' => ElementValue::Byte(self.read_pool_integer()? as i8),
            b'C' => ElementValue::Char(self.read_pool_integer()? as u16),
            b'S' => ElementValue::Short(self.read_pool_integer()? as i16),
            b'Z' => ElementValue::Boolean(self.read_pool_integer()? != 0),
            b'I' => ElementValue::Int(self.read_pool_integer()?),
            b'J' => {
                let index = self.read_u16()?;
                ElementValue::Long(self.long_at(index)?)
            }
            b'F' => {
                let index = self.read_u16()?;
                ElementValue::Float(self.float_at(index)?)
            }
            b'D' => {
                let index = self.read_u16()?;
                ElementValue::Double(self.double_at(index)?)
            }
            b's' => {
                let index = self.read_u16()?;
                ElementValue::String(self.utf8_at(index)?.to_owned())
            }
            b'e' => {
                let type_index = self.read_u16()?;
                let name_index = self.read_u16()?;
                ElementValue::Enum {
                    type_descriptor: self.utf8_at(type_index)?.to_owned(),
                    const_name: self.utf8_at(name_index)?.to_owned(),
                }
            }
            b'c' => {
                let index = self.read_u16()?;
                ElementValue::Class(self.utf8_at(index)?.to_owned())
            }
            b'@' => ElementValue::Annotation(Box::new(self.read_annotation()?)),
            b'[' => {
                let count = self.read_u16()?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(self.read_element_value()?);
                }
                ElementValue::Array(values)
            }
            other => {
                return Err(Error::UnknownElementValueTag { tag: other as char });
            }
        };
        Ok(value)
    }

    fn read_pool_integer(&mut self) -> Result<i32, Error> {
        let index = self.read_u16()?;
        self.integer_at(index)
    }

    fn read_utf8_index(&mut self) -> Result<Utf8ConstantIndex, Error> {
        Ok(Utf8ConstantIndex(ConstantIndex(self.read_u16()?)))
    }

    fn read_name_and_type_index(&mut self) -> Result<NameAndTypeConstantIndex, Error> {
        Ok(NameAndTypeConstantIndex(ConstantIndex(self.read_u16()?)))
    }

    pub fn const_at(&self, index: u16) -> Result<&Constant, Error> {
        self.constants
            .get_offset(Offset(index as usize))
            .ok_or(Error::BadConstantIndex { index })
    }

    pub fn utf8_at(&self, index: u16) -> Result<&str, Error> {
        match self.const_at(index)? {
            Constant::Utf8(string) => Ok(string),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal name of the class constant at `index`
    pub fn class_name_at(&self, index: u16) -> Result<&str, Error> {
        match self.const_at(index)? {
            Constant::Class(utf8) => self.utf8_at(utf8.0 .0),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Class",
            }),
        }
    }

    fn integer_at(&self, index: u16) -> Result<i32, Error> {
        match self.const_at(index)? {
            Constant::Integer(value) => Ok(*value),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Integer",
            }),
        }
    }

    fn long_at(&self, index: u16) -> Result<i64, Error> {
        match self.const_at(index)? {
            Constant::Long(value) => Ok(*value),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Long",
            }),
        }
    }

    fn float_at(&self, index: u16) -> Result<f32, Error> {
        match self.const_at(index)? {
            Constant::Float(value) => Ok(*value),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Float",
            }),
        }
    }

    fn double_at(&self, index: u16) -> Result<f64, Error> {
        match self.const_at(index)? {
            Constant::Double(value) => Ok(*value),
            _ => Err(Error::UnexpectedConstantType {
                index,
                expected: "Double",
            }),
        }
    }

    fn read_bytes(&mut self, needed: usize) -> Result<&'a [u8], Error> {
        if self.pos + needed > self.bytes.len() {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed,
            });
        }
        let bytes = &self.bytes[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn skip(&mut self, count: usize) -> Result<(), Error> {
        self.read_bytes(count)?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }
}
