use callswap::jvm::class_file::{ClassFile, ConstantsPool, Method, Version};
use callswap::jvm::code::{
    Branch, Call, Code, FieldOperand, Insn, Instruction, InvokeKind, Label, OrdComparison,
};
use callswap::jvm::model::Class;
use callswap::jvm::{
    ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
    ParseDescriptor,
};
use callswap::redirect::{Catalog, ClassTransformer, Outcome, Settings, Unresolved};

/// Builds class files in memory, one method at a time
struct ClassBuilder {
    class_file: ClassFile,
}

impl ClassBuilder {
    fn new(name: &str) -> ClassBuilder {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class(name).unwrap();
        let super_class = constants.get_class("java/lang/Object").unwrap();
        let class_file = ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };
        ClassBuilder { class_file }
    }

    fn interface(name: &str) -> ClassBuilder {
        let mut builder = ClassBuilder::new(name);
        builder.class_file.access_flags =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        builder
    }

    fn field(&mut self, owner: &str, name: &str, descriptor: &str) -> FieldOperand {
        FieldOperand {
            index: self
                .class_file
                .constants
                .get_field_ref(owner, name, descriptor)
                .unwrap(),
            field_type: FieldType::parse(descriptor).unwrap(),
        }
    }

    fn method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        instructions: Vec<Insn>,
    ) -> &mut ClassBuilder {
        let constants = &mut self.class_file.constants;
        let code = Code::from_instructions(max_stack, 4, instructions)
            .encode(constants)
            .unwrap();
        let code = constants.get_attribute(&code).unwrap();
        let method = Method {
            access_flags,
            name_index: constants.get_utf8(name).unwrap(),
            descriptor_index: constants.get_utf8(descriptor).unwrap(),
            attributes: vec![code],
        };
        self.class_file.methods.push(method);
        self
    }

    fn abstract_method(&mut self, name: &str, descriptor: &str) -> &mut ClassBuilder {
        let constants = &mut self.class_file.constants;
        let method = Method {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            name_index: constants.get_utf8(name).unwrap(),
            descriptor_index: constants.get_utf8(descriptor).unwrap(),
            attributes: vec![],
        };
        self.class_file.methods.push(method);
        self
    }

    fn bytes(&self) -> Vec<u8> {
        self.class_file.to_bytes().unwrap()
    }
}

fn public() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC
}

fn public_static() -> MethodAccessFlags {
    MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC
}

fn call(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Insn {
    Insn::Call(Call {
        kind,
        owner: owner.to_owned(),
        name: name.to_owned(),
        descriptor: MethodDescriptor::parse(descriptor).unwrap(),
        interface: false,
    })
}

fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Insn {
    call(InvokeKind::Static, owner, name, descriptor)
}

fn generic(instruction: Instruction) -> Insn {
    Insn::Generic(instruction)
}

fn transformer(catalog: &str) -> ClassTransformer {
    ClassTransformer::new(Settings::new(), Catalog::parse(catalog).unwrap())
}

/// Transform a class, expecting it to change
fn transform(catalog: &str, bytes: &[u8]) -> Vec<u8> {
    transformer(catalog)
        .transform_bytes(bytes)
        .unwrap()
        .expect("class should have been modified")
}

/// Instructions and `max_stack` of a method in the encoded class
fn method_code(bytes: &[u8], method_index: usize) -> (Vec<Insn>, u16) {
    let class = Class::parse(bytes).unwrap();
    let code = class.methods[method_index].code.clone().unwrap();
    (code.instructions, code.max_stack)
}

/// Deepest the stack gets in straight-line code
fn max_depth(instructions: &[Insn]) -> i32 {
    let mut depth = 0;
    let mut deepest = 0;
    for insn in instructions {
        depth += insn.stack_delta();
        deepest = deepest.max(depth);
    }
    deepest
}

fn call_count(instructions: &[Insn]) -> usize {
    instructions
        .iter()
        .filter(|insn| matches!(insn, Insn::Call(_)))
        .count()
}

#[test]
fn static_call_keeps_its_arguments() {
    let mut class = ClassBuilder::new("a/Service");
    class.method(
        public_static(),
        "run",
        "()I",
        2,
        vec![
            generic(Instruction::IConst1),
            generic(Instruction::IConst2),
            invoke_static("a/Math", "foo", "(II)I"),
            Insn::Branch(Branch::IReturn),
        ],
    );

    let bytes = transform("a/Math foo (II)I foo (II)I", &class.bytes());
    let (instructions, max_stack) = method_code(&bytes, 0);
    assert_eq!(
        instructions,
        vec![
            generic(Instruction::IConst1),
            generic(Instruction::IConst2),
            invoke_static("a/ServiceTest", "foo", "(II)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );
    assert_eq!(max_stack, 3);
}

#[test]
fn static_call_gets_a_placeholder() {
    let mut class = ClassBuilder::new("a/Service");
    class.method(
        public_static(),
        "run",
        "()I",
        2,
        vec![
            generic(Instruction::IConst1),
            generic(Instruction::IConst2),
            invoke_static("a/Math", "foo", "(II)I"),
            Insn::Branch(Branch::IReturn),
        ],
    );

    let bytes = transform("a/Math foo (II)I foo (La/Math;II)I", &class.bytes());
    let (instructions, max_stack) = method_code(&bytes, 0);
    assert_eq!(
        instructions,
        vec![
            generic(Instruction::AConstNull),
            generic(Instruction::IConst1),
            generic(Instruction::IConst2),
            invoke_static("a/ServiceTest", "foo", "(La/Math;II)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );
    assert_eq!(max_depth(&instructions), 3);
    assert!(max_depth(&instructions) <= max_stack as i32);
}

#[test]
fn receivers_are_elided_or_kept() {
    let mut class = ClassBuilder::new("a/Service");
    let db = class.field("a/Service", "db", "La/Db;");
    let body = vec![
        Insn::LineMarker(10),
        generic(Instruction::ALoad(0)),
        generic(Instruction::GetField(db.clone())),
        generic(Instruction::IConst3),
        call(InvokeKind::Virtual, "a/Db", "get", "(I)I"),
        Insn::Branch(Branch::IReturn),
    ];
    class.method(public(), "run", "()I", 2, body);
    let bytes = class.bytes();

    let elided = transform("a/Db get (I)I get (I)I", &bytes);
    let (instructions, _) = method_code(&elided, 0);
    assert_eq!(
        instructions,
        vec![
            Insn::LineMarker(10),
            generic(Instruction::IConst3),
            invoke_static("a/ServiceTest", "get", "(I)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );

    let kept = transform("a/Db get (I)I get (La/Db;I)I", &bytes);
    let (instructions, max_stack) = method_code(&kept, 0);
    assert_eq!(
        instructions,
        vec![
            Insn::LineMarker(10),
            generic(Instruction::ALoad(0)),
            generic(Instruction::GetField(db)),
            generic(Instruction::IConst3),
            invoke_static("a/ServiceTest", "get", "(La/Db;I)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );
    assert!(max_depth(&instructions) <= max_stack as i32);
}

#[test]
fn constructions_become_static_calls() {
    let mut class = ClassBuilder::new("a/Service");
    class.method(
        public_static(),
        "connect",
        "()La/Conn;",
        3,
        vec![
            Insn::Construct(String::from("a/Conn")),
            generic(Instruction::Dup),
            generic(Instruction::IConst5),
            call(InvokeKind::Special, "a/Conn", "<init>", "(I)V"),
            Insn::Branch(Branch::AReturn),
        ],
    );
    let original = class.bytes();
    let (before, _) = method_code(&original, 0);

    let bytes = transform("a/Conn <init> (I)V conn (I)La/Conn;", &original);
    let (instructions, max_stack) = method_code(&bytes, 0);
    assert_eq!(
        instructions,
        vec![
            generic(Instruction::IConst5),
            invoke_static("a/ServiceTest", "conn", "(I)La/Conn;"),
            Insn::Branch(Branch::AReturn),
        ]
    );
    assert_eq!(max_stack, 3);
    assert_eq!(call_count(&instructions), call_count(&before));
}

#[test]
fn nested_constructions() {
    let mut class = ClassBuilder::new("a/Service");
    class.method(
        public_static(),
        "tree",
        "()La/Node;",
        4,
        vec![
            Insn::Construct(String::from("a/Node")),
            generic(Instruction::Dup),
            Insn::Construct(String::from("a/Node")),
            generic(Instruction::Dup),
            call(InvokeKind::Special, "a/Node", "<init>", "()V"),
            call(InvokeKind::Special, "a/Node", "<init>", "(La/Node;)V"),
            Insn::Branch(Branch::AReturn),
        ],
    );

    let catalog = "
        a/Node  <init>  ()V          leaf  ()La/Node;
        a/Node  <init>  (La/Node;)V  node  (La/Node;)La/Node;
    ";
    let bytes = transform(catalog, &class.bytes());
    let (instructions, _) = method_code(&bytes, 0);
    assert_eq!(
        instructions,
        vec![
            invoke_static("a/ServiceTest", "leaf", "()La/Node;"),
            invoke_static("a/ServiceTest", "node", "(La/Node;)La/Node;"),
            Insn::Branch(Branch::AReturn),
        ]
    );
}

#[test]
fn transformation_is_idempotent() {
    let catalog = "a/Math foo (II)I foo (II)I";
    let mut class = ClassBuilder::new("a/Service");
    class.method(
        public_static(),
        "run",
        "()I",
        2,
        vec![
            generic(Instruction::IConst1),
            generic(Instruction::IConst2),
            invoke_static("a/Math", "foo", "(II)I"),
            Insn::Branch(Branch::IReturn),
        ],
    );

    let once = transform(catalog, &class.bytes());
    assert!(transformer(catalog).transform_bytes(&once).unwrap().is_none());

    let mut transformed = Class::parse(&once).unwrap();
    assert!(transformed.has_field("__callswap", "I").unwrap());
    let marker = transformed.class_file.fields.last().unwrap();
    assert_eq!(marker.access_flags, FieldAccessFlags::PRIVATE);

    let report = transformer(catalog)
        .transform_class(&mut transformed)
        .unwrap();
    assert!(report.already_transformed);
    assert!(report.events.is_empty());
    assert!(!transformed.is_modified());
}

#[test]
fn interfaces_get_a_static_marker() {
    let mut class = ClassBuilder::interface("a/Api");
    class
        .abstract_method("call", "()I")
        .method(
            public_static(),
            "helper",
            "()I",
            1,
            vec![
                invoke_static("a/Clock", "now", "()I"),
                Insn::Branch(Branch::IReturn),
            ],
        );

    let bytes = transform("a/Clock now ()I now ()I", &class.bytes());
    let transformed = Class::parse(&bytes).unwrap();
    assert!(transformed.methods[0].code.is_none());
    let marker = transformed.class_file.fields.last().unwrap();
    assert_eq!(
        marker.access_flags,
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL
    );
}

#[test]
fn untouched_methods_keep_their_bytes() {
    let mut class = ClassBuilder::new("a/Service");
    class
        .method(
            public_static(),
            "branchy",
            "(I)I",
            1,
            vec![
                generic(Instruction::ILoad(0)),
                Insn::Branch(Branch::If(OrdComparison::EQ, Label(1))),
                generic(Instruction::IConst1),
                Insn::Branch(Branch::IReturn),
                Insn::Label(Label(1)),
                generic(Instruction::IConst0),
                Insn::Branch(Branch::IReturn),
            ],
        )
        .method(
            public_static(),
            "run",
            "()I",
            1,
            vec![
                invoke_static("a/Clock", "now", "()I"),
                Insn::Branch(Branch::IReturn),
            ],
        );
    let original = class.bytes();

    // Nothing to substitute means nothing to write
    assert!(transformer("a/Other now ()I now ()I")
        .transform_bytes(&original)
        .unwrap()
        .is_none());

    let bytes = transform("a/Clock now ()I now ()I", &original);
    let before = ClassFile::parse(&original).unwrap();
    let after = ClassFile::parse(&bytes).unwrap();
    assert_eq!(before.methods[0].attributes, after.methods[0].attributes);
    assert_ne!(before.methods[1].attributes, after.methods[1].attributes);
}

#[test]
fn jumps_are_rederived_after_removal() {
    let mut class = ClassBuilder::new("a/Service");
    let db = class.field("a/Service", "db", "La/Db;");
    class.method(
        public(),
        "run",
        "(I)I",
        2,
        vec![
            generic(Instruction::ILoad(1)),
            Insn::Branch(Branch::If(OrdComparison::EQ, Label(1))),
            generic(Instruction::ALoad(0)),
            generic(Instruction::GetField(db)),
            generic(Instruction::IConst3),
            call(InvokeKind::Virtual, "a/Db", "get", "(I)I"),
            Insn::Branch(Branch::IReturn),
            Insn::Label(Label(1)),
            generic(Instruction::IConst0),
            Insn::Branch(Branch::IReturn),
        ],
    );

    let bytes = transform("a/Db get (I)I get (I)I", &class.bytes());
    let (instructions, _) = method_code(&bytes, 0);

    // `aload_0; getfield` took 4 bytes, so the jump target moves from 13 to 9
    assert_eq!(
        instructions,
        vec![
            generic(Instruction::ILoad(1)),
            Insn::Branch(Branch::If(OrdComparison::EQ, Label(9))),
            generic(Instruction::IConst3),
            invoke_static("a/ServiceTest", "get", "(I)I"),
            Insn::Branch(Branch::IReturn),
            Insn::Label(Label(9)),
            generic(Instruction::IConst0),
            Insn::Branch(Branch::IReturn),
        ]
    );
}

#[test]
fn kotlin_companions_and_accessors() {
    let mut class = ClassBuilder::new("a/Service");
    let companion = class.field("a/Outer", "Companion", "La/Outer$Companion;");
    class
        .method(
            public_static(),
            "viaCompanion",
            "()I",
            2,
            vec![
                generic(Instruction::GetStatic(companion)),
                generic(Instruction::IConst1),
                call(InvokeKind::Virtual, "a/Outer$Companion", "make", "(I)I"),
                Insn::Branch(Branch::IReturn),
            ],
        )
        .method(
            public(),
            "viaAccessor",
            "()I",
            2,
            vec![
                generic(Instruction::ALoad(0)),
                generic(Instruction::IConst1),
                invoke_static("a/Outer", "access$helper", "(La/Outer;I)I"),
                Insn::Branch(Branch::IReturn),
            ],
        );
    let bytes = class.bytes();

    let catalog = "
        a/Outer  make    (I)I  make    (I)I
        a/Outer  helper  (I)I  helper  (La/Outer;I)I
    ";
    let transformed = transform(catalog, &bytes);
    let (companion_code, _) = method_code(&transformed, 0);
    assert_eq!(
        companion_code,
        vec![
            generic(Instruction::IConst1),
            invoke_static("a/ServiceTest", "make", "(I)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );
    let (accessor_code, _) = method_code(&transformed, 1);
    assert_eq!(
        accessor_code,
        vec![
            generic(Instruction::ALoad(0)),
            generic(Instruction::IConst1),
            invoke_static("a/ServiceTest", "helper", "(La/Outer;I)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );

    // Substitutes for companion functions may also take a (null) instance
    let transformed = transform("a/Outer make (I)I make (La/Outer;I)I", &bytes);
    let (companion_code, _) = method_code(&transformed, 0);
    assert_eq!(
        companion_code,
        vec![
            generic(Instruction::AConstNull),
            generic(Instruction::IConst1),
            invoke_static("a/ServiceTest", "make", "(La/Outer;I)I"),
            Insn::Branch(Branch::IReturn),
        ]
    );
}

#[test]
fn unresolved_sites_are_reported() {
    let mut class = ClassBuilder::new("a/Service");
    class
        .method(
            public(),
            "<init>",
            "()V",
            1,
            vec![
                generic(Instruction::ALoad(0)),
                call(InvokeKind::Special, "a/Base", "<init>", "()V"),
                Insn::Branch(Branch::Return),
            ],
        )
        .method(
            public_static(),
            "pick",
            "(I)I",
            1,
            vec![
                Insn::LineMarker(20),
                generic(Instruction::ILoad(0)),
                Insn::Branch(Branch::If(OrdComparison::EQ, Label(1))),
                generic(Instruction::IConst1),
                Insn::Branch(Branch::Goto(Label(2))),
                Insn::Label(Label(1)),
                generic(Instruction::IConst2),
                Insn::Label(Label(2)),
                Insn::LineMarker(21),
                invoke_static("a/Math", "abs", "(I)I"),
                Insn::Branch(Branch::IReturn),
            ],
        );
    let bytes = class.bytes();

    let catalog = "
        a/Base  <init>  ()V   base  ()La/Base;
        a/Math  abs     (I)I  abs   (I)I
    ";
    let mut parsed = Class::parse(&bytes).unwrap();
    let report = transformer(catalog).transform_class(&mut parsed).unwrap();
    assert_eq!(report.class_name, "a/Service");
    assert_eq!(report.substituted(), 0);
    assert_eq!(report.events.len(), 2);

    assert_eq!(report.events[0].method, "<init>()V");
    assert_eq!(report.events[0].target, "a/Base.<init>()V");
    assert_eq!(
        report.events[0].outcome,
        Outcome::Unresolved(Unresolved::MissingConstruction)
    );

    assert_eq!(report.events[1].method, "pick(I)I");
    assert_eq!(report.events[1].line, Some(21));
    assert!(matches!(
        report.events[1].outcome,
        Outcome::Unresolved(Unresolved::ControlFlowBoundary { .. })
    ));

    assert!(!parsed.is_modified());
    assert!(transformer(catalog).transform_bytes(&bytes).unwrap().is_none());
}
