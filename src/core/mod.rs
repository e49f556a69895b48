//! The built-in language: special forms, eager builtins, and the Lisp-level
//! prelude evaluated at startup.

pub mod native_fns;
pub mod prelude;
pub mod special_forms;

use crate::interp::Interp;

pub fn install(interp: &mut Interp) {
    special_forms::install(interp);
    native_fns::install(interp);
}
