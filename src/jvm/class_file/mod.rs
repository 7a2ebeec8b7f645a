//! Binary layout of `.class` files
//!
//! Everything here maps one-to-one onto the structures in [chapter 4 of the JVM
//! specification][0]. Constant pool entries are referred to by index and attribute bodies stay
//! as raw bytes unless they are decoded explicitly with [`Attribute::decode`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

mod attribute;
mod class;
mod constants;
mod field;
mod method;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use serialize::*;
pub use version::*;
