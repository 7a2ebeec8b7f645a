//! Editable representation of classes
//!
//! This is the representation to use while rewriting method bodies. The underlying
//! [`ClassFile`](super::class_file::ClassFile) is kept around so that everything which is not
//! edited (fields, attributes, untouched methods, the constant pool) is written back exactly as it
//! was read.
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`]

mod class;
mod method;

pub use class::*;
pub use method::*;
