//! Read, inspect and write JVM classes
//!
//! ### Layers
//!
//!   - [`class_file`] is the binary layout of a `.class` file: the constant pool, fields,
//!     methods and raw attributes. It can be parsed from bytes and serialized back.
//!
//!   - [`code`] turns the byte code inside a `Code` attribute into a flat, editable sequence of
//!     instructions (and back). Offsets are replaced by labels so that instructions can be
//!     removed or inserted without manually fixing up jumps.
//!
//!   - [`model`] ties the two together: a class with decoded method bodies that can be edited in
//!     place and then written back out.
//!
//! ### Round trip
//!
//! ```
//! use callswap::jvm::class_file::ClassFile;
//! use callswap::jvm::model::Class;
//! use callswap::jvm::Error;
//!
//! fn rewrite(bytes: &[u8]) -> Result<Vec<u8>, Error> {
//!     let class = Class::from_class_file(ClassFile::parse(bytes)?)?;
//!     // ... edit `class.methods[..].code` here ...
//!     class.into_class_file()?.to_bytes()
//! }
//! ```

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
pub mod model;
mod names;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
