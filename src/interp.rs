use std::fs;
use std::path::Path;

use crate::core;
use crate::env::Env;
use crate::error::LoadError;
use crate::eval::eval;
use crate::heap::Heap;
use crate::reader;
use crate::value::{AtomValue, Function, NativeFn, SExpr};

//===----------------------------------------------------------------------===//
// Interp
//===----------------------------------------------------------------------===//

/// The interpreter context: the object heap, the root scope, and a counter
/// for generated lambda names. One `Interp` is one isolated world; hosts
/// extend it through `register`.
#[derive(Debug)]
pub struct Interp {
    pub heap: Heap,
    root: Env,
    next_lambda: u32,
}

impl Interp {
    /// A context with the core forms installed but no prelude loaded.
    pub fn new() -> Interp {
        let mut interp =
            Interp { heap: Heap::new(), root: Env::new(), next_lambda: 0 };
        core::install(&mut interp);
        interp
    }

    /// A context with the core forms and the Lisp-level prelude.
    pub fn with_prelude() -> Interp {
        let mut interp = Interp::new();
        for form in core::prelude::FORMS {
            interp.eval_str(form);
        }
        interp
    }

    pub fn root(&self) -> Env {
        self.root.clone()
    }

    /// Installs a builtin into the root scope. This is the host embedding
    /// surface; core and host functions share one calling convention.
    pub fn register(&mut self, name: &str, special: bool, f: NativeFn) {
        let root = self.root.clone();
        root.put(
            &mut self.heap,
            name,
            SExpr::Atom(AtomValue::Function(Function::native(name, special, f))),
        );
    }

    /// Next generated name for an anonymous function.
    pub fn fresh_lambda_name(&mut self) -> String {
        self.next_lambda += 1;
        format!("TMP${}", self.next_lambda)
    }

    /// Reads and evaluates one source string at the root scope.
    pub fn eval_str(&mut self, source: &str) -> SExpr {
        let expr = reader::read(source);
        let root = self.root.clone();
        eval(self, &expr, &root, 0)
    }

    /// Feeds lines through the chunking rule: comment lines are dropped,
    /// the rest accumulate until the paren counts balance, and each
    /// balanced chunk is evaluated. Returns the last chunk's value.
    pub fn process<I, S>(&mut self, lines: I) -> SExpr
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buffer = String::new();
        let mut last = SExpr::null();
        for line in lines {
            let line = line.as_ref();
            if line.trim_start().starts_with(';') {
                continue;
            }
            buffer.push_str(line);
            buffer.push('\n');
            if balanced(&buffer) {
                if !buffer.trim().is_empty() {
                    last = self.eval_str(&buffer);
                }
                buffer.clear();
            }
        }
        last
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<SExpr, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.process(text.lines()))
    }

    /// Toggles the evaluation trace, kept as an ordinary root binding so
    /// programs can flip it themselves.
    pub fn set_trace(&mut self, on: bool) {
        let root = self.root.clone();
        if on {
            root.put(&mut self.heap, "trace", SExpr::strue());
        } else {
            root.remove(&mut self.heap, "trace");
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

/// Whether a source chunk has as many open as close parens. Quoting is not
/// considered; the chunking rule is purely textual.
pub fn balanced(source: &str) -> bool {
    let mut opens: i64 = 0;
    let mut closes: i64 = 0;
    for c in source.chars() {
        match c {
            '(' => opens += 1,
            ')' => closes += 1,
            _ => {}
        }
    }
    opens == closes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AtomValue;

    #[test]
    fn balanced_counts_parens_only() {
        assert!(balanced("(a (b) c)"));
        assert!(!balanced("(a (b c)"));
        assert!(balanced("plain text"));
    }

    #[test]
    fn process_accumulates_until_balanced() {
        let mut interp = Interp::with_prelude();
        let result = interp.process(["(+ 1", "   2", "   3)"]);
        assert_eq!(result, SExpr::Atom(AtomValue::Int(6)));
    }

    #[test]
    fn process_skips_comment_lines() {
        let mut interp = Interp::with_prelude();
        let result = interp.process(["; nothing to see", "(+ 1 1)"]);
        assert_eq!(result, SExpr::Atom(AtomValue::Int(2)));
    }

    #[test]
    fn registered_builtins_are_callable() {
        let mut interp = Interp::new();
        interp.register("answer", false, |_, _, _, _| {
            SExpr::Atom(AtomValue::Int(42))
        });
        assert_eq!(interp.eval_str("(answer)"), SExpr::Atom(AtomValue::Int(42)));
    }

    #[test]
    fn lambda_names_are_unique() {
        let mut interp = Interp::new();
        let a = interp.fresh_lambda_name();
        let b = interp.fresh_lambda_name();
        assert_ne!(a, b);
        assert!(a.starts_with("TMP$"));
    }
}
