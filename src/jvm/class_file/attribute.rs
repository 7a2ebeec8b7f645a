use crate::jvm::class_file::{
    read_bytes, ClassConstantIndex, ConstantsPool, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// Attributes are kept as raw bytes until something needs to look inside them. Only the ones
/// involved in rewriting method bodies have typed forms (see [`AttributeLike`]).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Name of the attribute, as found in the constant pool
    pub fn name<'a>(&self, constants: &'a ConstantsPool) -> Result<&'a str, Error> {
        constants.utf8(self.name_index)
    }

    /// Decode the contents of the attribute, making sure all of the bytes are used
    pub fn decode<A: AttributeLike>(&self) -> Result<A, Error> {
        let mut reader: &[u8] = &self.info;
        let attribute = A::deserialize(&mut reader)?;
        if reader.is_empty() {
            Ok(attribute)
        } else {
            Err(Error::MalformedAttribute {
                name: A::NAME,
                message: format!("{} unused trailing bytes", reader.len()),
            })
        }
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        (self.info.len() as u32).serialize(writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Deserialize for Attribute {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let len = u32::deserialize(reader)? as usize;
        let info = read_bytes(reader, len)?;
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into attributes and back.
pub trait AttributeLike: Serialize + Deserialize {
    /// Name of the attribute
    const NAME: &'static str;
}

impl ConstantsPool {
    /// Encode an attribute, adding its name to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: &A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];
        attribute.serialize(&mut info)?;
        Ok(Attribute { name_index, info })
    }
}

/// Body of a method, with its byte code still encoded
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        (self.code_array.len() as u32).serialize(writer)?;
        writer.write_all(&self.code_array)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Code {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let max_stack = u16::deserialize(reader)?;
        let max_locals = u16::deserialize(reader)?;
        let code_len = u32::deserialize(reader)? as usize;
        let code_array = read_bytes(reader, code_len)?;
        let exception_table = Vec::<ExceptionHandler>::deserialize(reader)?;
        let attributes = Vec::<Attribute>::deserialize(reader)?;
        Ok(Code {
            max_stack,
            max_locals,
            code_array,
            exception_table,
            attributes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: u16,

    /// End of exception handler range (exclusive)
    pub end_pc: u16,

    /// Start of the exception handler
    pub handler_pc: u16,

    /// Class of exceptions caught (index 0 catches everything)
    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ExceptionHandler {
            start_pc: u16::deserialize(reader)?,
            end_pc: u16::deserialize(reader)?,
            handler_pc: u16::deserialize(reader)?,
            catch_type: ClassConstantIndex::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberTable(pub Vec<LineNumber>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LineNumberTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumberTable(Vec::deserialize(reader)?))
    }
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)
    }
}

impl Deserialize for LineNumber {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumber {
            start_pc: u16::deserialize(reader)?,
            line_number: u16::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableTable(pub Vec<LocalVariable>);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.14
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableTypeTable(pub Vec<LocalVariable>);

/// Entry in either the local variable table or the local variable type table (they have the same
/// layout, except that the type table points at a generic signature instead of a descriptor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub index: u16,
}

impl AttributeLike for LocalVariableTable {
    const NAME: &'static str = "LocalVariableTable";
}

impl AttributeLike for LocalVariableTypeTable {
    const NAME: &'static str = "LocalVariableTypeTable";
}

impl Serialize for LocalVariableTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LocalVariableTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariableTable(Vec::deserialize(reader)?))
    }
}

impl Serialize for LocalVariableTypeTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LocalVariableTypeTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariableTypeTable(Vec::deserialize(reader)?))
    }
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.index.serialize(writer)
    }
}

impl Deserialize for LocalVariable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariable {
            start_pc: u16::deserialize(reader)?,
            length: u16::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            index: u16::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapTable(pub Vec<StackMapFrame>);

impl AttributeLike for StackMapTable {
    const NAME: &'static str = "StackMapTable";
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMapTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMapTable(Vec::deserialize(reader)?))
    }
}

/// Frame as it appears in the table: relative to the previous frame's offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub offset_delta: u16,
    pub kind: FrameKind<u16>,
}

/// Contents of a stack map frame, generic over how `Uninitialized` verification types refer to
/// the `new` instruction which created them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind<U> {
    /// Same locals as the previous frame and an empty stack
    ///
    /// Tags: 0-63 or 251
    Same,

    /// Same locals as the previous frame and exactly one stack entry
    ///
    /// Tags: 64-127 or 247
    SameLocalsOneStack(VerificationType<U>),

    /// Previous frame's locals minus the last `1-3` locals, and an empty stack
    ///
    /// Tags: 248-250
    Chop(u8),

    /// Previous frame's locals plus `1-3` extra locals, and an empty stack
    ///
    /// Tags: 252-254
    Append(Vec<VerificationType<U>>),

    /// Frame has exactly the locals and stack specified
    ///
    /// Tag: 255
    Full {
        locals: Vec<VerificationType<U>>,
        stack: Vec<VerificationType<U>>,
    },
}

impl<U> FrameKind<U> {
    /// Change the representation of uninitialized types
    pub fn try_map<V, E>(
        self,
        mut map: impl FnMut(U) -> Result<V, E>,
    ) -> Result<FrameKind<V>, E> {
        fn map_all<U, V, E>(
            types: Vec<VerificationType<U>>,
            map: &mut impl FnMut(U) -> Result<V, E>,
        ) -> Result<Vec<VerificationType<V>>, E> {
            types.into_iter().map(|typ| typ.try_map(map)).collect()
        }

        Ok(match self {
            FrameKind::Same => FrameKind::Same,
            FrameKind::SameLocalsOneStack(typ) => {
                FrameKind::SameLocalsOneStack(typ.try_map(&mut map)?)
            }
            FrameKind::Chop(chopped) => FrameKind::Chop(chopped),
            FrameKind::Append(locals) => FrameKind::Append(map_all(locals, &mut map)?),
            FrameKind::Full { locals, stack } => FrameKind::Full {
                locals: map_all(locals, &mut map)?,
                stack: map_all(stack, &mut map)?,
            },
        })
    }
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let delta = self.offset_delta;
        match &self.kind {
            // `same_frame` and `same_frame_extended`
            FrameKind::Same if delta <= 63 => (delta as u8).serialize(writer)?,
            FrameKind::Same => {
                251u8.serialize(writer)?;
                delta.serialize(writer)?;
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            FrameKind::SameLocalsOneStack(stack) => {
                if delta <= 63 {
                    (delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            FrameKind::Chop(chopped_k) => {
                (251 - chopped_k).serialize(writer)?;
                delta.serialize(writer)?;
            }

            // `append_frame`
            FrameKind::Append(locals) => {
                (251 + locals.len() as u8).serialize(writer)?;
                delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame` (counts are in entries, not slots)
            FrameKind::Full { locals, stack } => {
                255u8.serialize(writer)?;
                delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        let (offset_delta, kind) = match tag {
            0..=63 => (tag as u16, FrameKind::Same),
            64..=127 => {
                let stack = VerificationType::<u16>::deserialize(reader)?;
                (tag as u16 - 64, FrameKind::SameLocalsOneStack(stack))
            }
            247 => {
                let delta = u16::deserialize(reader)?;
                let stack = VerificationType::<u16>::deserialize(reader)?;
                (delta, FrameKind::SameLocalsOneStack(stack))
            }
            248..=250 => (u16::deserialize(reader)?, FrameKind::Chop(251 - tag)),
            251 => (u16::deserialize(reader)?, FrameKind::Same),
            252..=254 => {
                let delta = u16::deserialize(reader)?;
                let locals = (251..tag)
                    .map(|_| VerificationType::<u16>::deserialize(reader))
                    .collect::<Result<Vec<_>, Error>>()?;
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = u16::deserialize(reader)?;
                let locals = Vec::<VerificationType<u16>>::deserialize(reader)?;
                let stack = Vec::<VerificationType<u16>>::deserialize(reader)?;
                (delta, FrameKind::Full { locals, stack })
            }
            _ => return Err(Error::UnknownFrameType(tag)),
        };
        Ok(StackMapFrame { offset_delta, kind })
    }
}

/// Types used in stack map frames
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType<U> {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(ClassConstantIndex),

    /// Object created by the `new` instruction at some offset, whose constructor has not been
    /// called yet
    Uninitialized(U),
}

impl<U> VerificationType<U> {
    pub fn try_map<V, E>(
        self,
        map: &mut impl FnMut(U) -> Result<V, E>,
    ) -> Result<VerificationType<V>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(class) => VerificationType::Object(class),
            VerificationType::Uninitialized(at) => VerificationType::Uninitialized(map(at)?),
        })
    }
}

impl Serialize for VerificationType<u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(class) => {
                7u8.serialize(writer)?;
                class.serialize(writer)?;
            }
            VerificationType::Uninitialized(offset) => {
                8u8.serialize(writer)?;
                offset.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType<u16> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let typ = match u8::deserialize(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(ClassConstantIndex::deserialize(reader)?),
            8 => VerificationType::Uninitialized(u16::deserialize(reader)?),
            other => return Err(Error::UnknownVerificationType(other)),
        };
        Ok(typ)
    }
}
