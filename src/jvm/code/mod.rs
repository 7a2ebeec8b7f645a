//! Editable method bodies
//!
//! A `Code` attribute is decoded into a [`Code`] holding a flat `Vec<Insn>`. Every byte code
//! offset that something refers to (a jump, an exception handler range, a local variable range,
//! a stack map frame, or an uninitialized verification type) turns into an [`Insn::Label`] marker
//! at that position, and source line numbers turn into [`Insn::LineMarker`]s. This makes it
//! possible to remove and insert instructions freely: offsets, compact instruction forms, and the
//! debug tables are all recomputed when the code is encoded again.

mod branch;
mod code;
mod decode;
mod encode;
mod insn;
mod instruction;
mod stack_effect;

pub use branch::*;
pub use code::*;
pub use insn::*;
pub use instruction::*;
