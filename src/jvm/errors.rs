use super::class_file::{Constant, ConstantIndex};
use super::code::Label;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Class file does not start with `0xCAFEBABE`
    BadMagic([u8; 4]),

    /// Bytes were left over after the end of the class file
    TrailingBytes(usize),

    /// Constant pool entry has a tag we don't know about
    UnknownConstantTag {
        tag: u8,
        index: ConstantIndex,
    },

    /// A constant index is out of bounds or points at a constant of the wrong kind
    BadConstant {
        index: ConstantIndex,
        expected: &'static str,
    },

    /// Inserting a new constant would overflow the `u16` indices of the constant pool
    ConstantPoolOverflow {
        constant: Constant,
        offset: u16,
    },

    /// A field or method descriptor could not be parsed
    BadDescriptor(String),

    /// Attribute contents do not match the attribute kind
    MalformedAttribute {
        name: &'static str,
        message: String,
    },

    /// Byte code contains an opcode we don't know
    UnknownOpcode {
        opcode: u8,
        offset: usize,
    },

    /// An instruction runs past the end of the byte code
    TruncatedCode(usize),

    /// A jump, handler range, or frame refers to an offset that is not an instruction boundary
    BadCodeOffset(usize),

    /// Stack map frame has a frame type in the reserved range
    UnknownFrameType(u8),

    /// Verification type has an unknown tag
    UnknownVerificationType(u8),

    /// A label is referred to but never placed in the instruction sequence
    MissingLabel(Label),

    /// Jump from `from` to `to` does not fit in the branch encoding
    JumpOutOfRange {
        from: usize,
        to: usize,
    },

    /// Stack map frames are no longer in strictly increasing offset order
    FrameOrder(usize),

    /// Encoded method body exceeds the 64KiB limit
    MethodCodeOverflow(usize),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
