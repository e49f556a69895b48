//! Forms evaluated against the root scope at startup. Everything here is
//! ordinary source text, so redefining any of it from user code works the
//! same way as defining it did.

pub const FORMS: &[&str] = &[
    "(setq blank \" \")",
    "(setq Pi 3.141592)",
    "(setq Pi2 (/ 3.141592 2))",
    "(setq Pi4 (/ 3.141592 4))",
    "(setq e 2.718281828459045)",
    "(defun r2d (x) (* (/ x Pi) 180))",
    "(defun d2r (x) (* (/ x 180) Pi))",
    "(setq null (quote ()))",
    "(setq trace (quote ()))",
    "(setq newlines (list 10 13 133 8232 8233 ))",
    "(defun flatten (l) \
        (cond ((= l null) ()) \
              ((atomp (car l)) (cons (car l) (flatten (cdr l)))) \
              ((quote true) (list (flatten (car l)) (flatten (cdr l))))))",
    "(defun land (l) (reduce and true l))",
    "(defun lor (l) (reduce or false l))",
];

#[cfg(test)]
mod tests {
    use crate::interp::Interp;
    use crate::value::{AtomValue, SExpr};

    #[test]
    fn constants_are_bound() {
        let mut interp = Interp::with_prelude();
        assert_eq!(
            interp.eval_str("Pi"),
            SExpr::Atom(AtomValue::Double(3.141592))
        );
        assert!(interp.eval_str("null").is_null());
        assert!(interp.eval_str("trace").is_null());
    }

    #[test]
    fn flatten_collapses_nesting() {
        let mut interp = Interp::with_prelude();
        let result = interp.eval_str("(flatten (quote (1 (2 (3)) 4)))");
        // Every leaf survives in order.
        let text = result.describe(&interp.heap);
        assert!(text.contains('1') && text.contains('2'));
        assert!(text.contains('3') && text.contains('4'));
    }

    #[test]
    fn land_and_lor_fold_booleans() {
        let mut interp = Interp::with_prelude();
        assert_eq!(
            interp.eval_str("(land (quote (true true)))"),
            SExpr::Atom(AtomValue::Boolean(true))
        );
        assert_eq!(
            interp.eval_str("(land (quote (true false)))"),
            SExpr::Atom(AtomValue::Boolean(false))
        );
        assert_eq!(
            interp.eval_str("(lor (quote (false true)))"),
            SExpr::Atom(AtomValue::Boolean(true))
        );
    }

    #[test]
    fn degree_conversions() {
        let mut interp = Interp::with_prelude();
        assert_eq!(
            interp.eval_str("(floor (r2d Pi))"),
            SExpr::Atom(AtomValue::Int(180))
        );
    }
}
