//! Redirect call sites in compiled methods to substitute routines
//!
//! Given a [`Catalog`] of substitutes, a [`ClassTransformer`] rewrites every method of a class so
//! that matching calls (and object constructions) go to a static method on a substitute class
//! instead. For a class `com/example/Service`, the substitute class is `com/example/ServiceTest`
//! unless [`Settings`] say otherwise.
//!
//! Each call site goes through the same pipeline:
//!
//!   1. the [`matcher`] decides whether the call has a substitute, undoing the renaming Kotlin
//!      does for companion objects and synthetic accessors
//!
//!   2. the [`resolver`] walks backwards from the call, adding up stack effects, to find the first
//!      instruction that computes the receiver or arguments of the call
//!
//!   3. the [`splicer`] rewrites that range so that the values flow into an `invokestatic` of the
//!      substitute instead
//!
//! Call sites that can't be resolved are left untouched and reported (see [`TransformReport`]).
//! Once any method has been rewritten, a marker field is added to the class so that it never
//! gets transformed twice.

mod catalog;
mod driver;
mod errors;
pub mod matcher;
mod report;
pub mod resolver;
mod settings;
pub mod splicer;

pub use catalog::*;
pub use driver::*;
pub use errors::*;
pub use report::*;
pub use resolver::Unresolved;
pub use settings::*;
