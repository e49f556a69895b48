//! A small embeddable Lisp: a reader, a tree-walking evaluator whose
//! closures see the caller's scope chain, and a reference-counted object
//! heap. Evaluation never fails; malformed input degrades to the null
//! sentinel `()`.
//!
//! ```
//! use lispet::Interp;
//!
//! let mut interp = Interp::with_prelude();
//! let answer = interp.eval_str("(+ 1 2 3)");
//! assert_eq!(answer.describe(&interp.heap), "6");
//! ```

pub mod core;
pub mod env;
pub mod error;
pub mod eval;
pub mod heap;
pub mod interp;
pub mod reader;
pub mod repl;
pub mod value;

pub use env::Env;
pub use error::LoadError;
pub use eval::{eval, MAX_DEPTH};
pub use heap::{Heap, ObjId};
pub use interp::Interp;
pub use value::{AtomValue, Function, NativeFn, SExpr};
