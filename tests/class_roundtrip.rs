use classcov::jvm::class_file::{
    runtime_visible_annotations, Annotation, BytecodeArray, BytecodeIndex, ClassFile,
    ClassReader, Code, ConstantValue, ConstantsPool, ElementValue, ExceptionTableEntry, Field,
    LineNumber, LineNumberTable, Method, Serialize, SourceFile, Version,
};
use classcov::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

/// A small but representative class: an interface list, a constant field, a
/// method with a `try`/`catch` body and line numbers, an annotation, and a
/// `SourceFile` attribute
fn widget_class_bytes() -> Vec<u8> {
    let mut pool = ConstantsPool::new();
    let this_class = pool.get_class("com/acme/Widget").unwrap();
    let super_class = pool.get_class("java/lang/Object").unwrap();
    let serializable = pool.get_class("java/io/Serializable").unwrap();

    // static final int VERSION = 3
    let field_name = pool.get_utf8("VERSION").unwrap();
    let field_descriptor = pool.get_utf8("I").unwrap();
    let three = pool.get_integer(3).unwrap();
    let constant_value = pool.get_attribute(ConstantValue(three)).unwrap();

    // void run(), protecting its first two instructions
    let method_name = pool.get_utf8("run").unwrap();
    let method_descriptor = pool.get_utf8("()V").unwrap();
    let catch_type = pool.get_class("java/io/IOException").unwrap();
    let line_numbers = pool
        .get_attribute(LineNumberTable(vec![
            LineNumber {
                start_pc: BytecodeIndex(0),
                line_number: 10,
            },
            LineNumber {
                start_pc: BytecodeIndex(3),
                line_number: 12,
            },
        ]))
        .unwrap();
    let code = pool
        .get_attribute(Code {
            max_stack: 1,
            max_locals: 2,
            code_array: BytecodeArray(vec![0x03, 0x3c, 0xb1, 0x57, 0xb1]),
            exception_table: vec![ExceptionTableEntry {
                start_pc: BytecodeIndex(0),
                end_pc: BytecodeIndex(2),
                handler_pc: BytecodeIndex(3),
                catch_type,
            }],
            attributes: vec![line_numbers],
        })
        .unwrap();

    let marker = Annotation {
        type_descriptor: "Lcom/acme/Marker;".to_owned(),
        values: vec![
            ("level".to_owned(), ElementValue::Int(2)),
            (
                "tags".to_owned(),
                ElementValue::Array(vec![ElementValue::String("fast".to_owned())]),
            ),
        ],
    };
    let annotations = runtime_visible_annotations(&mut pool, &[marker]).unwrap();

    let source_name = pool.get_utf8("Widget.java").unwrap();
    let source_file = pool.get_attribute(SourceFile(source_name)).unwrap();

    let class_file = ClassFile {
        version: Version::JAVA11,
        constants: pool.into_constants(),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![serializable],
        fields: vec![Field {
            access_flags: FieldAccessFlags::PUBLIC
                | FieldAccessFlags::STATIC
                | FieldAccessFlags::FINAL,
            name_index: field_name,
            descriptor_index: field_descriptor,
            attributes: vec![constant_value],
        }],
        methods: vec![Method {
            access_flags: MethodAccessFlags::PUBLIC,
            name_index: method_name,
            descriptor_index: method_descriptor,
            attributes: vec![code, annotations],
        }],
        attributes: vec![source_file],
    };

    let mut bytes = vec![];
    class_file.serialize(&mut bytes).unwrap();
    bytes
}

#[test]
fn read_then_write_is_byte_identical() {
    let original = widget_class_bytes();

    let parsed = ClassReader::new(&original).unwrap().parse_class().unwrap();

    let mut rewritten = vec![];
    parsed.class_file.serialize(&mut rewritten).unwrap();
    assert_eq!(rewritten, original);
}

#[test]
fn resolved_views_expose_member_details() {
    let bytes = widget_class_bytes();
    let parsed = ClassReader::new(&bytes).unwrap().parse_class().unwrap();

    assert_eq!(parsed.attributes.source_file.as_deref(), Some("Widget.java"));

    let field_view = &parsed.fields[0];
    assert!(field_view.constant_value.is_some());

    let method_view = &parsed.methods[0];
    let code = method_view.code.as_ref().unwrap();
    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 2);
    assert_eq!(code.bytecode, vec![0x03, 0x3c, 0xb1, 0x57, 0xb1]);
    assert_eq!(code.exception_table.len(), 1);
    assert_eq!(code.exception_table[0].handler_pc, BytecodeIndex(3));
    assert_eq!(code.line_numbers.len(), 2);
    assert_eq!(code.line_numbers[1].line_number, 12);

    let annotations = &method_view.common.annotations;
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].type_descriptor, "Lcom/acme/Marker;");
    assert_eq!(
        annotations[0].values[0],
        ("level".to_owned(), ElementValue::Int(2))
    );
}

#[test]
fn unrecognized_attributes_are_skipped_and_reemitted_raw() {
    let mut pool = ConstantsPool::new();
    let this_class = pool.get_class("com/acme/Widget").unwrap();
    let super_class = pool.get_class("java/lang/Object").unwrap();

    // a made-up attribute ahead of a known one, so a wrong skip would
    // derail the SourceFile parse that follows
    let custom_name = pool.get_utf8("WidgetFingerprint").unwrap();
    let custom = classcov::jvm::class_file::Attribute {
        name_index: custom_name,
        info: vec![0xDE, 0xAD, 0xBE, 0xEF, 0x05],
    };
    let source_name = pool.get_utf8("Widget.java").unwrap();
    let source_file = pool.get_attribute(SourceFile(source_name)).unwrap();

    let class_file = ClassFile {
        version: Version::JAVA11,
        constants: pool.into_constants(),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods: vec![],
        attributes: vec![custom.clone(), source_file],
    };

    let mut original = vec![];
    class_file.serialize(&mut original).unwrap();

    let parsed = ClassReader::new(&original).unwrap().parse_class().unwrap();

    // the cursor landed exactly on the next attribute
    assert_eq!(parsed.attributes.source_file.as_deref(), Some("Widget.java"));
    assert_eq!(parsed.class_file.attributes[0], custom);

    let mut rewritten = vec![];
    parsed.class_file.serialize(&mut rewritten).unwrap();
    assert_eq!(rewritten, original);
}

#[test]
fn reinterning_a_parsed_pool_adds_no_duplicates() {
    let bytes = widget_class_bytes();
    let parsed = ClassReader::new(&bytes).unwrap().parse_class().unwrap();

    let entry_count = parsed.class_file.constants.len();
    let mut pool = ConstantsPool::from_constants(parsed.class_file.constants);
    let size_before = pool.size();

    pool.get_class("com/acme/Widget").unwrap();
    pool.get_utf8("run").unwrap();
    pool.get_integer(3).unwrap();

    assert_eq!(pool.size(), size_before);
    assert_eq!(pool.into_constants().len(), entry_count);
}

#[test]
fn a_rewritten_class_can_grow_its_pool_without_disturbing_parsed_entries() {
    let bytes = widget_class_bytes();
    let mut parsed = ClassReader::new(&bytes).unwrap().parse_class().unwrap();

    let mut pool = ConstantsPool::from_constants(parsed.class_file.constants);
    let recorder = pool
        .get_method_ref(
            "com/acme/Recorder",
            "hit",
            "(II)V",
            false,
        )
        .unwrap();
    assert!(recorder.0 .0 > 0);

    parsed.class_file.constants = pool.into_constants();

    let mut rewritten = vec![];
    parsed.class_file.serialize(&mut rewritten).unwrap();

    // the grown class still parses, and the original entries kept their spots
    let reparsed = ClassReader::new(&rewritten).unwrap().parse_class().unwrap();
    let mut reparsed_pool = ConstantsPool::from_constants(reparsed.class_file.constants);
    assert_eq!(
        reparsed_pool
            .get_method_ref("com/acme/Recorder", "hit", "(II)V", false)
            .unwrap(),
        recorder
    );
}
