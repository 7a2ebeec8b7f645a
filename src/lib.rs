//! Redirect call sites in compiled JVM classes to substitute routines
//!
//! This makes it possible to swap a dependency of already compiled code for a test double: calls
//! (and object constructions) listed in a [`redirect::Catalog`] get rewritten into `invokestatic`
//! calls of substitutes living in a separate class, without recompiling anything.
//!
//!   - [`jvm`] reads, edits, and writes class files
//!   - [`redirect`] finds the call sites and rewrites them
//!
//! ```no_run
//! use callswap::redirect::{Catalog, ClassTransformer, Error, Settings};
//!
//! fn swap(bytes: &[u8]) -> Result<Option<Vec<u8>>, Error> {
//!     let catalog = Catalog::from_path("substitutes.txt")?;
//!     let transformer = ClassTransformer::new(Settings::new(), catalog);
//!     transformer.transform_bytes(bytes)
//! }
//! ```

pub mod jvm;
pub mod redirect;
mod util;
