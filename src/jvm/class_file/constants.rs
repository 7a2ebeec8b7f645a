use crate::jvm::class_file::{read_bytes, Deserialize, Serialize};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;

/// Class file constants pool
///
/// The pool is append only: constants read out of an existing class keep their indices, and new
/// constants are pushed onto the end. The `get_*` methods look for an existing constant before
/// inserting a new one, so re-encoding code which only refers to things already in the pool does
/// not grow it.
#[derive(Debug)]
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), FieldRefConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
    invoke_dynamics: HashMap<(u16, NameAndTypeConstantIndex), InvokeDynamicConstantIndex>,
}

/// Owner, name, and descriptor of a field or method reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub is_interface: bool,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            name_and_types: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            invoke_dynamics: HashMap::new(),
        }
    }

    /// Number of constants (not the number of indices they occupy)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Look up a constant by index
    pub fn get(&self, index: impl Into<ConstantIndex>) -> Option<&Constant> {
        let ConstantIndex(index) = index.into();
        self.constants.get_offset(Offset(index as usize))
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset: u16 = self.constants.offset_len().0 as u16;
        if offset.checked_add(constant.width() as u16).is_none() {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }
        self.record(ConstantIndex(offset), &constant);
        self.constants.push(constant);
        Ok(ConstantIndex(offset))
    }

    /// Remember a constant for de-duplication (the first occurrence wins)
    fn record(&mut self, index: ConstantIndex, constant: &Constant) {
        match constant {
            Constant::Utf8(string) => {
                self.utf8s
                    .entry(string.clone())
                    .or_insert(Utf8ConstantIndex(index));
            }
            Constant::Class(name) => {
                self.classes
                    .entry(*name)
                    .or_insert(ClassConstantIndex(index));
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_types
                    .entry((*name, *descriptor))
                    .or_insert(NameAndTypeConstantIndex(index));
            }
            Constant::FieldRef(class, name_and_type) => {
                self.fieldrefs
                    .entry((*class, *name_and_type))
                    .or_insert(FieldRefConstantIndex(index));
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                self.methodrefs
                    .entry((*class, *name_and_type, *is_interface))
                    .or_insert(MethodRefConstantIndex(index));
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                self.invoke_dynamics
                    .entry((*bootstrap_method, *method_descriptor))
                    .or_insert(InvokeDynamicConstantIndex(index));
            }
            _ => (),
        }
    }

    /// Get or insert a utf8 constant
    pub fn get_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, Error> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Utf8(utf8.to_owned()))?;
            Ok(Utf8ConstantIndex(idx))
        }
    }

    /// Get or insert a class constant
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::Class(name))?;
            Ok(ClassConstantIndex(idx))
        }
    }

    /// Get or insert a name & type constant
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.name_and_types.get(&(name, descriptor)) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::NameAndType { name, descriptor })?;
            Ok(NameAndTypeConstantIndex(idx))
        }
    }

    /// Get or insert a field reference constant
    pub fn get_field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<FieldRefConstantIndex, Error> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self.fieldrefs.get(&(class, name_and_type)) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(Constant::FieldRef(class, name_and_type))?;
            Ok(FieldRefConstantIndex(idx))
        }
    }

    /// Get or insert a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self.methodrefs.get(&(class, name_and_type, is_interface)) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            Ok(MethodRefConstantIndex(self.push_constant(constant)?))
        }
    }

    /// Get or insert an invoke dynamic constant
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<InvokeDynamicConstantIndex, Error> {
        let method_descriptor = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self
            .invoke_dynamics
            .get(&(bootstrap_method, method_descriptor))
        {
            Ok(*idx)
        } else {
            let constant = Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            };
            Ok(InvokeDynamicConstantIndex(self.push_constant(constant)?))
        }
    }

    /// Resolve a utf8 constant
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.get(index) {
            Some(Constant::Utf8(string)) => Ok(string),
            _ => Err(Error::BadConstant {
                index: index.into(),
                expected: "Utf8",
            }),
        }
    }

    /// Resolve the name of a class constant
    pub fn class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(Error::BadConstant {
                index: index.into(),
                expected: "Class",
            }),
        }
    }

    /// Resolve the name and descriptor of a name & type constant
    pub fn name_and_type(&self, index: NameAndTypeConstantIndex) -> Result<(&str, &str), Error> {
        match self.get(index) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(Error::BadConstant {
                index: index.into(),
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a field or method reference
    pub fn member_ref(&self, index: ConstantIndex) -> Result<MemberRef<'_>, Error> {
        let (class, name_and_type, is_interface) = match self.get(index) {
            Some(Constant::FieldRef(class, name_and_type)) => (*class, *name_and_type, false),
            Some(Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            }) => (*class, *name_and_type, *is_interface),
            _ => {
                return Err(Error::BadConstant {
                    index,
                    expected: "Fieldref, Methodref, or InterfaceMethodref",
                })
            }
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.class_name(class)?,
            name,
            descriptor,
            is_interface,
        })
    }

    /// Resolve the bootstrap method index, name, and descriptor of an invoke dynamic constant
    pub fn invoke_dynamic(&self, index: ConstantIndex) -> Result<(u16, &str, &str), Error> {
        match self.get(index) {
            Some(Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            }) => {
                let (name, descriptor) = self.name_and_type(*method_descriptor)?;
                Ok((*bootstrap_method, name, descriptor))
            }
            _ => Err(Error::BadConstant {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> ConstantsPool {
        ConstantsPool::new()
    }
}

/// The count written out is one more than the largest index (so accounts for the two slots of
/// `long` and `double` constants).
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        (self.constants.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in &self.constants {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for ConstantsPool {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u16::deserialize(reader)? as usize;
        let mut pool = ConstantsPool::new();
        while pool.constants.offset_len().0 < count {
            let index = ConstantIndex(pool.constants.offset_len().0 as u16);
            let constant = Constant::read(reader, index)?;
            pool.push_constant(constant)?;
        }
        if pool.constants.offset_len().0 != count {
            let last = ConstantIndex(count.saturating_sub(1) as u16);
            return Err(Error::BadConstant {
                index: last,
                expected: "constant that fits in the pool",
            });
        }
        Ok(pool)
    }
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// `CONSTANT_Utf8` whose contents aren't a valid Rust string (eg. string literals containing
    /// unpaired surrogates). The bytes are kept exactly as they were read.
    Utf8Raw(Vec<u8>),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
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
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

impl Constant {
    /// Read one constant, starting from its tag
    fn read<R: ReadBytesExt>(reader: &mut R, index: ConstantIndex) -> Result<Constant, Error> {
        let tag = u8::deserialize(reader)?;
        let constant = match tag {
            1 => {
                let len = u16::deserialize(reader)? as usize;
                let bytes = read_bytes(reader, len)?;
                match decode_modified_utf8(&bytes) {
                    Some(string) => Constant::Utf8(string),
                    None => Constant::Utf8Raw(bytes),
                }
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => {
                let kind = u8::deserialize(reader)?;
                let handle_kind = HandleKind::from_byte(kind).ok_or(Error::BadConstant {
                    index,
                    expected: "MethodHandle with a valid reference kind",
                })?;
                Constant::MethodHandle {
                    handle_kind,
                    member: ConstantIndex::deserialize(reader)?,
                }
            }
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                method_descriptor: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            _ => return Err(Error::UnknownConstantTag { tag, index }),
        };
        Ok(constant)
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Utf8Raw(buffer) => {
                1u8.serialize(writer)?;
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]:
///
///   - the null character `\u0000` is encoded in the 2-byte format
///   - only the 1-byte, 2-byte, and 3-byte formats are used
///   - supplementary characters are written as a surrogate pair, each half in the 3-byte format
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for unit in string.encode_utf16() {
        match unit {
            0x0001..=0x007F => buffer.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push((unit >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Returns `None` if the bytes are malformed or decode to unpaired surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let continuation = |idx: usize| -> Option<u16> {
        let byte = *bytes.get(idx)?;
        if byte & 0b1100_0000 == 0b1000_0000 {
            Some((byte & 0x3F) as u16)
        } else {
            None
        }
    };

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte & 0b1000_0000 == 0 {
            units.push(byte as u16);
            idx += 1;
        } else if byte & 0b1110_0000 == 0b1100_0000 {
            units.push(((byte & 0x1F) as u16) << 6 | continuation(idx + 1)?);
            idx += 2;
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            let high = ((byte & 0x0F) as u16) << 12 | continuation(idx + 1)? << 6;
            units.push(high | continuation(idx + 2)?);
            idx += 3;
        } else {
            return None;
        }
    }

    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

/// Indices into the constant pool that are expected to point at a particular kind of constant
macro_rules! typed_constant_indices {
    ($($(#[$attr:meta])* $index:ident;)*) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
            pub struct $index(pub ConstantIndex);

            impl From<$index> for ConstantIndex {
                fn from(index: $index) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $index {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }

            impl Deserialize for $index {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                    Ok($index(ConstantIndex::deserialize(reader)?))
                }
            }
        )*
    };
}

typed_constant_indices! {
    Utf8ConstantIndex;
    NameAndTypeConstantIndex;
    ClassConstantIndex;
    FieldRefConstantIndex;
    MethodRefConstantIndex;
    InvokeDynamicConstantIndex;
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
    const KINDS: [HandleKind; 9] = [
        HandleKind::GetField,
        HandleKind::GetStatic,
        HandleKind::PutField,
        HandleKind::PutStatic,
        HandleKind::InvokeVirtual,
        HandleKind::InvokeStatic,
        HandleKind::InvokeSpecial,
        HandleKind::NewInvokeSpecial,
        HandleKind::InvokeInterface,
    ];

    /// Reference kinds are numbered from 1
    fn from_byte(byte: u8) -> Option<HandleKind> {
        let idx = (byte as usize).checked_sub(1)?;
        HandleKind::KINDS.get(idx).copied()
    }
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = (*self as u8) + 1;
        byte.serialize(writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modified_utf8_null_and_ascii() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn modified_utf8_supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), encoded);
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
        assert_eq!(decode_modified_utf8("ĄऄǍ".as_bytes()).unwrap(), "ĄऄǍ");
    }

    #[test]
    fn modified_utf8_rejects_unpaired_surrogates() {
        assert_eq!(decode_modified_utf8(&[237, 160, 128]), None);
        assert_eq!(decode_modified_utf8(&[0xC0]), None);
        assert_eq!(decode_modified_utf8(&[0xF0, 0x90, 0x80, 0x80]), None);
    }

    #[test]
    fn pool_deduplicates_inserts() {
        let mut pool = ConstantsPool::new();
        let a = pool.get_method_ref("a/B", "foo", "(I)I", false).unwrap();
        let b = pool.get_method_ref("a/B", "foo", "(I)I", false).unwrap();
        let c = pool.get_method_ref("a/B", "foo", "(I)I", true).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let member = pool.member_ref(a.into()).unwrap();
        assert_eq!(member.owner, "a/B");
        assert_eq!(member.name, "foo");
        assert_eq!(member.descriptor, "(I)I");
        assert!(!member.is_interface);
    }

    #[test]
    fn pool_round_trip_with_wide_constants() {
        let mut pool = ConstantsPool::new();
        pool.push_constant(Constant::Long(7)).unwrap();
        let utf8 = pool.get_utf8("after").unwrap();
        assert_eq!(utf8, Utf8ConstantIndex(ConstantIndex(3)));

        let mut bytes = vec![];
        pool.serialize(&mut bytes).unwrap();
        assert_eq!(&bytes[..2], &[0, 4]);

        let mut reread = ConstantsPool::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(reread.get(ConstantIndex(1)), Some(&Constant::Long(7)));
        assert_eq!(reread.get(ConstantIndex(2)), None);
        assert_eq!(reread.utf8(utf8).unwrap(), "after");
        assert_eq!(reread.get_utf8("after").unwrap(), utf8);
    }

    #[test]
    fn bad_lookups() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("x").unwrap();
        assert!(matches!(
            pool.class_name(ClassConstantIndex(utf8.into())),
            Err(Error::BadConstant { .. })
        ));
        assert!(pool.get(ConstantIndex(0)).is_none());
    }

    #[test]
    fn unknown_tag() {
        let bytes = [0u8, 2, 2, 0, 0];
        assert!(matches!(
            ConstantsPool::deserialize(&mut &bytes[..]),
            Err(Error::UnknownConstantTag { tag: 2, .. })
        ));
    }
}
