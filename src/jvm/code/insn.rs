use super::{Branch, Instruction};
use crate::jvm::{BinaryName, MethodDescriptor, RenderDescriptor, UnqualifiedName};
use std::fmt;

/// Position in the instruction sequence that something else refers to
///
/// Labels are created when the code is decoded and are numbered by the byte code offset they
/// originally stood for, so they stay unique even as instructions around them are removed.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(pub u32);

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

/// One entry in a method's flat instruction sequence
///
/// Besides real instructions, the sequence contains zero-width markers for labels and source
/// lines. Entries are identified by their index in the sequence only.
#[derive(Clone, Debug, PartialEq)]
pub enum Insn {
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`, or `invokedynamic`
    Call(Call),

    /// `new` of the given class
    Construct(String),

    /// Instructions from here on come from this source line
    LineMarker(u16),

    /// Position referred to by jumps, exception handlers, local variables, or stack map frames
    Label(Label),

    /// Any other non-branching instruction
    Generic(Instruction),

    /// Instruction that may transfer control somewhere other than the next instruction
    Branch(Branch),
}

impl Insn {
    /// Is this a zero-width marker (as opposed to a real instruction)?
    pub fn is_marker(&self) -> bool {
        matches!(self, Insn::LineMarker(_) | Insn::Label(_))
    }
}

/// Kind of method invocation
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,

    /// Index is into the `BootstrapMethods` attribute of the class
    Dynamic { bootstrap_method: u16 },
}

impl InvokeKind {
    /// Does the call take an implicit receiver under its arguments?
    pub fn has_receiver(&self) -> bool {
        matches!(
            self,
            InvokeKind::Virtual | InvokeKind::Special | InvokeKind::Interface
        )
    }
}

/// Method invocation, with its target resolved out of the constant pool
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub kind: InvokeKind,

    /// Class owning the method (empty for `invokedynamic`, which has no owner)
    pub owner: String,
    pub name: String,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Whether the owner is an interface (ie. the call goes through an `InterfaceMethodref`)
    pub interface: bool,
}

impl Call {
    /// `invokestatic` of a non-interface method
    pub fn invoke_static(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: MethodDescriptor<BinaryName>,
    ) -> Call {
        Call {
            kind: InvokeKind::Static,
            owner: owner.into(),
            name: name.into(),
            descriptor,
            interface: false,
        }
    }

    /// Is this a call to an instance initialization method?
    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT.as_ref()
    }

    /// Slots popped off the stack by the call (arguments and receiver)
    pub fn parameter_slots(&self) -> usize {
        self.descriptor.parameter_length(self.kind.has_receiver())
    }

    /// Slots pushed onto the stack by the call
    pub fn return_slots(&self) -> usize {
        self.descriptor.return_length()
    }
}

impl fmt::Display for Call {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}.{}{}",
            self.owner,
            self.name,
            self.descriptor.render()
        )
    }
}
