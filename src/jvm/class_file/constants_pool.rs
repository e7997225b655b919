use crate::jvm::class_file::{
    encode_modified_utf8, Attribute, AttributeLike, ClassConstantIndex, Constant, ConstantIndex,
    FieldRefConstantIndex, HandleKind, MethodRefConstantIndex, NameAndTypeConstantIndex,
    StringConstantIndex, Utf8ConstantIndex,
};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

/// Constant pool builder for the writer side of a class transform
///
/// The pool is append only: entries are interned on first use and every later
/// request for the same value returns the index assigned the first time. This
/// keeps the emitted pool free of duplicates and makes re-interning
/// idempotent, which the exception-table encoding relies on.
///
/// A pool can start empty (for a class generated from scratch) or be rebuilt
/// from the constants of a parsed class via [`ConstantsPool::from_constants`],
/// in which case existing values keep their original indices through a
/// read-rewrite-write cycle.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    /// Serialized byte size of the pool entries, tracked as entries are added
    serialized_size: usize,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<[u8; 4], ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<[u8; 8], ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    field_refs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), FieldRefConstantIndex>,
    method_refs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
    method_handles: HashMap<(HandleKind, ConstantIndex), ConstantIndex>,
    method_types: HashMap<Utf8ConstantIndex, ConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), ConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            serialized_size: 0,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            field_refs: HashMap::new(),
            method_refs: HashMap::new(),
            method_handles: HashMap::new(),
            method_types: HashMap::new(),
            invoke_dynamics: HashMap::new(),
        }
    }

    /// Rebuild a pool from the constants of a parsed class
    ///
    /// Every entry keeps the index it had in the input; the interning maps
    /// are repopulated so later `get_*` calls dedup against the parsed
    /// entries.
    pub fn from_constants(constants: OffsetVec<Constant>) -> ConstantsPool {
        let mut pool = ConstantsPool::new();

        for (offset, constant) in &constants {
            let index = ConstantIndex(offset.0 as u16);
            match constant {
                Constant::Utf8(string) => {
                    pool.utf8s
                        .entry(string.clone())
                        .or_insert(Utf8ConstantIndex(index));
                }
                Constant::Integer(integer) => {
                    pool.integers.entry(*integer).or_insert(index);
                }
                Constant::Float(float) => {
                    pool.floats.entry(float.to_be_bytes()).or_insert(index);
                }
                Constant::Long(long) => {
                    pool.longs.entry(*long).or_insert(index);
                }
                Constant::Double(double) => {
                    pool.doubles.entry(double.to_be_bytes()).or_insert(index);
                }
                Constant::Class(name) => {
                    pool.classes.entry(*name).or_insert(ClassConstantIndex(index));
                }
                Constant::String(utf8) => {
                    pool.strings.entry(*utf8).or_insert(StringConstantIndex(index));
                }
                Constant::FieldRef(class, name_and_type) => {
                    pool.field_refs
                        .entry((*class, *name_and_type))
                        .or_insert(FieldRefConstantIndex(index));
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface,
                } => {
                    pool.method_refs
                        .entry((*class, *name_and_type, *is_interface))
                        .or_insert(MethodRefConstantIndex(index));
                }
                Constant::NameAndType { name, descriptor } => {
                    pool.name_and_types
                        .entry((*name, *descriptor))
                        .or_insert(NameAndTypeConstantIndex(index));
                }
                Constant::MethodHandle {
                    handle_kind,
                    member,
                } => {
                    pool.method_handles
                        .entry((*handle_kind, *member))
                        .or_insert(index);
                }
                Constant::MethodType { descriptor } => {
                    pool.method_types.entry(*descriptor).or_insert(index);
                }
                Constant::InvokeDynamic {
                    bootstrap_method,
                    name_and_type,
                } => {
                    pool.invoke_dynamics
                        .entry((*bootstrap_method, *name_and_type))
                        .or_insert(index);
                }
                // Not deduplicated on the writer side; kept only so a parsed
                // class re-serializes unchanged.
                Constant::Dynamic { .. } | Constant::Module(_) | Constant::Package(_) => {}
            }
            pool.serialized_size += serialized_width(constant);
        }

        pool.constants = constants;
        pool
    }

    /// Serialized byte size of all pool entries (excluding the entry count)
    pub fn size(&self) -> usize {
        self.serialized_size
    }

    /// Index the next pushed constant would receive
    pub fn next_index(&self) -> u16 {
        self.constants.offset_len().0 as u16
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_constants(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Push a constant into the pool, provided there is space for it
    ///
    /// The largest valid index is 65535, indexing starts at 1, and 8-byte
    /// constants take two slots.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.constants.offset_len().0;

        if offset + constant.width() > u16::MAX as usize + 1 {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }

        self.serialized_size += serialized_width(&constant);
        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Get or insert a utf8 constant
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, Error> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from its internal name (eg.
    /// `java/lang/Throwable`)
    pub fn get_class(&mut self, internal_name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(internal_name)?;

        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(name))?);
            self.classes.insert(name, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant
    pub fn get_string(&mut self, utf8: Utf8ConstantIndex) -> Result<StringConstantIndex, Error> {
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = StringConstantIndex(self.push_constant(Constant::String(utf8))?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    pub fn get_integer(&mut self, value: i32) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.integers.get(&value) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Integer(value))?;
            self.integers.insert(value, idx);
            Ok(idx)
        }
    }

    /// Floats are keyed by bit pattern, so `NaN` payloads and signed zeros
    /// dedup correctly
    pub fn get_float(&mut self, value: f32) -> Result<ConstantIndex, Error> {
        let key = value.to_be_bytes();
        if let Some(idx) = self.floats.get(&key) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Float(value))?;
            self.floats.insert(key, idx);
            Ok(idx)
        }
    }

    pub fn get_long(&mut self, value: i64) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.longs.get(&value) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Long(value))?;
            self.longs.insert(value, idx);
            Ok(idx)
        }
    }

    pub fn get_double(&mut self, value: f64) -> Result<ConstantIndex, Error> {
        let key = value.to_be_bytes();
        if let Some(idx) = self.doubles.get(&key) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Double(value))?;
            self.doubles.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a `CONSTANT_Fieldref_info`
    pub fn get_field_ref(
        &mut self,
        class_name: &str,
        field_name: &str,
        descriptor: &str,
    ) -> Result<FieldRefConstantIndex, Error> {
        let class = self.get_class(class_name)?;
        let name = self.get_utf8(field_name)?;
        let desc = self.get_utf8(descriptor)?;
        let name_and_type = self.get_name_and_type(name, desc)?;

        let key = (class, name_and_type);
        if let Some(idx) = self.field_refs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::FieldRef(class, name_and_type);
            let idx = FieldRefConstantIndex(self.push_constant(constant)?);
            self.field_refs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a `CONSTANT_Methodref_info` or
    /// `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class = self.get_class(class_name)?;
        let name = self.get_utf8(method_name)?;
        let desc = self.get_utf8(descriptor)?;
        let name_and_type = self.get_name_and_type(name, desc)?;

        let key = (class, name_and_type, is_interface);
        if let Some(idx) = self.method_refs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            let idx = MethodRefConstantIndex(self.push_constant(constant)?);
            self.method_refs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method handle constant
    pub fn get_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        let key = (handle_kind, member);
        if let Some(idx) = self.method_handles.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodHandle {
                handle_kind,
                member,
            };
            let idx = self.push_constant(constant)?;
            self.method_handles.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method type constant
    pub fn get_method_type(&mut self, descriptor: &str) -> Result<ConstantIndex, Error> {
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.method_types.get(&descriptor) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::MethodType { descriptor })?;
            self.method_types.insert(descriptor, idx);
            Ok(idx)
        }
    }

    /// Get or insert an invoke dynamic constant
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        let key = (bootstrap_method, name_and_type);
        if let Some(idx) = self.invoke_dynamics.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            };
            let idx = self.push_constant(constant)?;
            self.invoke_dynamics.insert(key, idx);
            Ok(idx)
        }
    }

    /// Build an attribute from a payload, interning its name
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];
        attribute.serialize(&mut info)?;

        Ok(Attribute { name_index, info })
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

fn serialized_width(constant: &Constant) -> usize {
    match constant {
        Constant::Utf8(string) => 3 + encode_modified_utf8(string).len(),
        Constant::Integer(_) | Constant::Float(_) => 5,
        Constant::Long(_) | Constant::Double(_) => 9,
        Constant::Class(_)
        | Constant::String(_)
        | Constant::MethodType { .. }
        | Constant::Module(_)
        | Constant::Package(_) => 3,
        Constant::FieldRef(_, _)
        | Constant::MethodRef { .. }
        | Constant::NameAndType { .. }
        | Constant::Dynamic { .. }
        | Constant::InvokeDynamic { .. } => 5,
        Constant::MethodHandle { .. } => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut pool = ConstantsPool::new();

        let first = pool.get_utf8("java/lang/Object").unwrap();
        let class = pool.get_class("java/lang/Object").unwrap();
        let second = pool.get_utf8("java/lang/Object").unwrap();
        let class_again = pool.get_class("java/lang/Object").unwrap();

        assert_eq!(first, second);
        assert_eq!(class, class_again);
        assert_eq!(pool.into_constants().len(), 2);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();

        let long = pool.get_long(42).unwrap();
        let next = pool.get_integer(7).unwrap();

        assert_eq!(long, ConstantIndex(1));
        assert_eq!(next, ConstantIndex(3));
    }

    #[test]
    fn member_refs_reuse_intermediate_entries() {
        let mut pool = ConstantsPool::new();

        let read = pool
            .get_field_ref("com/acme/Widget", "count", "I")
            .unwrap();
        let write = pool
            .get_field_ref("com/acme/Widget", "count", "I")
            .unwrap();
        assert_eq!(read, write);

        // class + 3 utf8 + name-and-type + field ref
        assert_eq!(pool.into_constants().len(), 6);
    }

    #[test]
    fn rebuilding_preserves_indices() {
        let mut pool = ConstantsPool::new();
        let throwable = pool.get_class("java/lang/Throwable").unwrap();
        let size = pool.size();

        let mut rebuilt = ConstantsPool::from_constants(pool.into_constants());
        assert_eq!(rebuilt.size(), size);
        assert_eq!(rebuilt.get_class("java/lang/Throwable").unwrap(), throwable);
        assert_eq!(rebuilt.size(), size);
    }

    #[test]
    fn overflowing_the_pool_is_an_error() {
        let mut pool = ConstantsPool::new();

        for n in 0..u16::MAX as usize / 2 {
            pool.get_long(n as i64).unwrap();
        }

        match pool.get_long(-1) {
            Err(Error::ConstantPoolOverflow { .. }) => {}
            other => panic!("expected overflow, got {:?}", other.map(|_| ())),
        }
    }
}
