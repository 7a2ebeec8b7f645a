use crate::jvm::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result};

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Inverse of [`Serialize`]
///
/// Reading can fail for more reasons than writing: besides running out of input, the bytes may
/// not describe a well-formed class file.
pub trait Deserialize: Sized {
    /// Read the construct out of a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error>;
}

macro_rules! primitive_binary_format {
    ($($int:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Serialize for $int {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }

            impl Deserialize for $int {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
                    Ok(reader.$read::<BigEndian>()?)
                }
            }
        )*
    };
}

primitive_binary_format! {
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

// Single bytes have no endianness
impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u8()?)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Deserialize for i8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_i8()?)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        (0..len).map(|_| A::deserialize(reader)).collect()
    }
}

/// Read exactly `len` raw bytes
///
/// The buffer grows with the input, so a bogus length can't trigger a huge allocation up front.
pub fn read_bytes<R: ReadBytesExt>(reader: &mut R, len: usize) -> std::result::Result<Vec<u8>, Error> {
    let mut bytes = vec![];
    Read::take(&mut *reader, len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < len {
        return Err(Error::IoError(std::io::Error::from(
            std::io::ErrorKind::UnexpectedEof,
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn big_endian() {
        let mut bytes = vec![];
        0x1234u16.serialize(&mut bytes).unwrap();
        (-2i32).serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut reader = bytes.as_slice();
        assert_eq!(u16::deserialize(&mut reader).unwrap(), 0x1234);
        assert_eq!(i32::deserialize(&mut reader).unwrap(), -2);
    }

    #[test]
    fn length_prefixed_vectors() {
        let mut bytes = vec![];
        vec![7u16, 8u16].serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 2, 0, 7, 0, 8]);
        assert_eq!(Vec::<u16>::deserialize(&mut bytes.as_slice()).unwrap(), vec![7, 8]);
    }

    #[test]
    fn truncated_input() {
        let bytes = [0u8, 3, 0, 1];
        assert!(matches!(
            Vec::<u16>::deserialize(&mut &bytes[..]),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn raw_bytes_longer_than_the_input() {
        let bytes = [1u8, 2, 3];
        assert_eq!(read_bytes(&mut &bytes[..], 2).unwrap(), vec![1, 2]);
        assert!(matches!(
            read_bytes(&mut &bytes[..], u32::MAX as usize),
            Err(Error::IoError(_))
        ));
    }
}
