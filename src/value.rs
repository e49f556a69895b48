use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::heap::{Heap, ObjId};
use crate::interp::Interp;

//===----------------------------------------------------------------------===//
// SExpr
//===----------------------------------------------------------------------===//

/// An S-expression: the single tree type shared by programs and data.
/// The empty list doubles as the null/false sentinel.
#[derive(Debug, Clone)]
pub enum SExpr {
    Atom(AtomValue),
    List(Vec<SExpr>),
}

impl SExpr {
    /// The null/false sentinel.
    pub fn null() -> SExpr {
        SExpr::List(Vec::new())
    }

    /// The canonical truth value: the string atom `"true"`.
    pub fn strue() -> SExpr {
        SExpr::Atom(AtomValue::Str("true".to_string()))
    }

    pub fn symbol(name: &str) -> SExpr {
        SExpr::Atom(AtomValue::Str(name.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SExpr::List(l) if l.is_empty())
    }

    pub fn is_false(&self, heap: &Heap) -> bool {
        match self {
            SExpr::Atom(v) => !v.boolean_value(heap),
            SExpr::List(l) => l.is_empty(),
        }
    }

    pub fn is_true(&self, heap: &Heap) -> bool {
        !self.is_false(heap)
    }

    /// The heap identifier when this value is an object atom.
    pub fn object_id(&self) -> Option<ObjId> {
        match self {
            SExpr::Atom(AtomValue::Object(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn atom(&self) -> Option<&AtomValue> {
        match self {
            SExpr::Atom(v) => Some(v),
            SExpr::List(_) => None,
        }
    }

    pub fn double_value(&self, heap: &Heap) -> f64 {
        match self {
            SExpr::Atom(v) => v.double_value(heap),
            SExpr::List(_) => 0.0,
        }
    }

    pub fn int_value(&self, heap: &Heap) -> i64 {
        match self {
            SExpr::Atom(v) => v.int_value(heap),
            SExpr::List(_) => 0,
        }
    }

    /// Flat textual form: atoms rendered per variant, list elements joined
    /// with single spaces. Used by the string coercion rules.
    pub fn string_value(&self, heap: &Heap) -> String {
        match self {
            SExpr::Atom(v) => v.string_value(heap),
            SExpr::List(l) => {
                l.iter().map(|e| e.string_value(heap)).collect::<Vec<_>>().join(" ")
            }
        }
    }

    /// Printable form. Re-reading the output of a tree whose string atoms
    /// carry no embedded parens or quotes yields a structurally equal tree.
    pub fn describe(&self, heap: &Heap) -> String {
        match self {
            SExpr::Atom(v) => v.describe(heap),
            SExpr::List(l) => {
                let inner =
                    l.iter().map(|e| e.describe(heap)).collect::<Vec<_>>().join(" ");
                format!("({})", inner)
            }
        }
    }

    /// Multi-line form used by the REPL: objects expand into their fields,
    /// everything else falls back to `describe`.
    pub fn pretty(&self, heap: &Heap, prefix: &str) -> String {
        match self {
            SExpr::Atom(AtomValue::Object(id)) => match heap.get(*id) {
                Some(obj) => {
                    let mut out =
                        format!("Object {} References {}", id, obj.references());
                    let nested = format!("{}    ", prefix);
                    for (field, value) in obj.fields() {
                        out.push('\n');
                        if let Some(fid) = value.object_id() {
                            let name = heap
                                .field(fid, "name")
                                .map(|v| v.string_value(heap))
                                .unwrap_or_default();
                            out.push_str(&format!(
                                "{}{}: {} {}",
                                nested, field, fid, name
                            ));
                        } else {
                            out.push_str(&format!(
                                "{}{}: {}",
                                nested,
                                field,
                                value.pretty(heap, &nested)
                            ));
                        }
                    }
                    out
                }
                None => format!("Object {} does not exist", id),
            },
            _ => self.describe(heap),
        }
    }
}

/// Structural equality; atoms compare per `AtomValue`, lists element-wise.
impl PartialEq for SExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SExpr::Atom(a), SExpr::Atom(b)) => a == b,
            (SExpr::List(a), SExpr::List(b)) => a == b,
            _ => false,
        }
    }
}

//===----------------------------------------------------------------------===//
// AtomValue
//===----------------------------------------------------------------------===//

/// Opaque image-like payload. The core only queries its size; decoding and
/// rendering belong to host collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub width: f64,
    pub height: f64,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn pixel_area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Debug, Clone)]
pub enum AtomValue {
    Int(i64),
    Double(f64),
    Str(String),
    Boolean(bool),
    Binary(Option<Vec<u8>>),
    Image(Option<ImageBlob>),
    Object(ObjId),
    Function(Function),
}

/// Comparison tolerance for doubles.
pub const DOUBLE_EPSILON: f64 = 1e-6;

impl AtomValue {
    /// Numeric coercion. Total: every variant has a defined fallback.
    pub fn double_value(&self, heap: &Heap) -> f64 {
        match self {
            AtomValue::Int(v) => *v as f64,
            AtomValue::Double(v) => *v,
            AtomValue::Str(v) => v.parse::<f64>().unwrap_or(0.0),
            AtomValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            AtomValue::Binary(data) => {
                data.as_ref().map(|d| d.len() as f64).unwrap_or(0.0)
            }
            AtomValue::Image(img) => {
                img.as_ref().map(|i| i.pixel_area()).unwrap_or(0.0)
            }
            AtomValue::Object(id) => {
                heap.get(*id).map(|o| o.field_count() as f64).unwrap_or(0.0)
            }
            AtomValue::Function(_) => 0.0,
        }
    }

    /// Integer coercion. Doubles truncate toward zero, saturating at the
    /// `i64` bounds; strings parse as integers only.
    pub fn int_value(&self, heap: &Heap) -> i64 {
        match self {
            AtomValue::Int(v) => *v,
            AtomValue::Double(v) => *v as i64,
            AtomValue::Str(v) => v.parse::<i64>().unwrap_or(0),
            AtomValue::Boolean(v) => *v as i64,
            AtomValue::Binary(data) => {
                data.as_ref().map(|d| d.len() as i64).unwrap_or(0)
            }
            AtomValue::Image(img) => {
                img.as_ref().map(|i| i.pixel_area() as i64).unwrap_or(0)
            }
            AtomValue::Object(id) => {
                heap.get(*id).map(|o| o.field_count() as i64).unwrap_or(0)
            }
            AtomValue::Function(_) => 0,
        }
    }

    pub fn string_value(&self, heap: &Heap) -> String {
        match self {
            AtomValue::Int(v) => v.to_string(),
            AtomValue::Double(v) => format_double(*v),
            AtomValue::Str(v) => v.clone(),
            AtomValue::Boolean(v) => {
                if *v {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            AtomValue::Binary(data) => match data {
                Some(bytes) => match std::str::from_utf8(bytes) {
                    Ok(s) => s.to_string(),
                    Err(_) => format!("Binary data {} bytes", bytes.len()),
                },
                None => "Empty binary data".to_string(),
            },
            AtomValue::Image(img) => match img {
                Some(i) => format!("Image {} by {} pixels", i.width, i.height),
                None => "Empty image".to_string(),
            },
            AtomValue::Object(id) => match heap.get(*id) {
                Some(obj) => obj
                    .fields()
                    .map(|(field, value)| {
                        if let Some(fid) = value.object_id() {
                            let name = heap
                                .field(fid, "name")
                                .map(|v| v.string_value(heap))
                                .unwrap_or_default();
                            format!("{}: {} {}", field, fid, name)
                        } else {
                            format!("{}: {}", field, value.string_value(heap))
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => String::new(),
            },
            AtomValue::Function(f) => f.name.clone(),
        }
    }

    /// Truthiness. Doubles are true once their magnitude reaches 1.0; the
    /// string `"false"` and the empty string are false.
    pub fn boolean_value(&self, heap: &Heap) -> bool {
        match self {
            AtomValue::Int(v) => *v != 0,
            AtomValue::Double(v) => v.abs() >= 1.0,
            AtomValue::Str(v) => v != "false" && !v.is_empty(),
            AtomValue::Boolean(v) => *v,
            AtomValue::Binary(data) => data.is_some(),
            AtomValue::Image(img) => img.is_some(),
            AtomValue::Object(id) => {
                heap.get(*id).map(|o| o.field_count() != 0).unwrap_or(false)
            }
            AtomValue::Function(_) => true,
        }
    }

    pub fn function(&self) -> Option<&Function> {
        match self {
            AtomValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Printable form; strings that would not survive re-reading as a single
    /// bare token are quoted.
    pub fn describe(&self, heap: &Heap) -> String {
        match self {
            AtomValue::Str(v) if v.is_empty() || v.contains(' ') => {
                format!("\"{}\"", v)
            }
            AtomValue::Object(id) => match heap.get(*id) {
                Some(obj) => format!(
                    "Object {} References {}\n {}",
                    id,
                    obj.references(),
                    self.string_value(heap)
                ),
                None => format!("Object {} does not exist", id),
            },
            other => other.string_value(heap),
        }
    }
}

/// Numeric comparisons are by value with an epsilon for doubles; every
/// cross-variant comparison is unequal. Images never compare equal, not
/// even to themselves.
impl PartialEq for AtomValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AtomValue::Int(l), AtomValue::Int(r)) => l == r,
            (AtomValue::Double(l), AtomValue::Double(r)) => {
                (l - r).abs() < DOUBLE_EPSILON
            }
            (AtomValue::Str(l), AtomValue::Str(r)) => l == r,
            (AtomValue::Boolean(l), AtomValue::Boolean(r)) => l == r,
            (AtomValue::Binary(l), AtomValue::Binary(r)) => l == r,
            (AtomValue::Object(l), AtomValue::Object(r)) => l == r,
            (AtomValue::Function(l), AtomValue::Function(r)) => l.name == r.name,
            _ => false,
        }
    }
}

/// Doubles always render with a decimal point so the printed form re-reads
/// as a double.
pub fn format_double(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

//===----------------------------------------------------------------------===//
// Functions
//===----------------------------------------------------------------------===//

/// Calling convention shared by every builtin, core or host-installed: the
/// full call list including the head symbol, the active scope, and the
/// current recursion depth. Builtins never fail; shape mismatches degrade
/// to the null sentinel.
pub type NativeFn = fn(&mut Interp, &SExpr, &Env, usize) -> SExpr;

/// A Lisp-level closure: formal parameter names and an unevaluated body.
/// Nothing about the defining scope is captured; free variables resolve
/// through the caller's chain at invocation time.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: SExpr,
}

#[derive(Clone)]
pub enum Callable {
    Native(NativeFn),
    Closure(Rc<Closure>),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "Native(..)"),
            Callable::Closure(c) => write!(f, "Closure({:?})", c.params),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub special: bool,
    pub callable: Callable,
}

impl Function {
    pub fn native(name: &str, special: bool, f: NativeFn) -> Function {
        Function { name: name.to_string(), special, callable: Callable::Native(f) }
    }

    pub fn closure(
        name: String,
        special: bool,
        params: Vec<String>,
        body: SExpr,
    ) -> Function {
        Function {
            name,
            special,
            callable: Callable::Closure(Rc::new(Closure { params, body })),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

//===----------------------------------------------------------------------===//
// Macros
//===----------------------------------------------------------------------===//

#[macro_export]
macro_rules! list {
    () => (
        $crate::value::SExpr::List(vec![])
    );
    ($($args:expr),* $(,)?) => {{
        let v: Vec<$crate::value::SExpr> = vec![$($args),*];
        $crate::value::SExpr::List(v)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_is_empty_list() {
        assert!(SExpr::null().is_null());
        assert!(!SExpr::strue().is_null());
    }

    #[test]
    fn double_equality_uses_epsilon() {
        assert_eq!(AtomValue::Double(1.0000001), AtomValue::Double(1.0));
        assert_ne!(AtomValue::Double(1.01), AtomValue::Double(1.0));
    }

    #[test]
    fn cross_variant_comparisons_are_unequal() {
        assert_ne!(AtomValue::Int(1), AtomValue::Double(1.0));
        assert_ne!(AtomValue::Str("true".into()), AtomValue::Boolean(true));
    }

    #[test]
    fn images_never_compare_equal() {
        let img = ImageBlob { width: 2.0, height: 2.0, bytes: vec![0, 1, 2, 3] };
        assert_ne!(
            AtomValue::Image(Some(img.clone())),
            AtomValue::Image(Some(img))
        );
    }

    #[test]
    fn string_coercions_fall_back_to_zero() {
        let heap = Heap::new();
        assert_eq!(AtomValue::Str("3.5".into()).double_value(&heap), 3.5);
        assert_eq!(AtomValue::Str("nope".into()).double_value(&heap), 0.0);
        assert_eq!(AtomValue::Str("42".into()).int_value(&heap), 42);
        assert_eq!(AtomValue::Str("3.5".into()).int_value(&heap), 0);
    }

    #[test]
    fn double_truthiness_threshold() {
        let heap = Heap::new();
        assert!(!AtomValue::Double(0.5).boolean_value(&heap));
        assert!(AtomValue::Double(-1.0).boolean_value(&heap));
        assert!(!AtomValue::Str("false".into()).boolean_value(&heap));
        assert!(!AtomValue::Str("".into()).boolean_value(&heap));
    }

    #[test]
    fn int_coercion_saturates() {
        let heap = Heap::new();
        assert_eq!(AtomValue::Double(1e300).int_value(&heap), i64::MAX);
        assert_eq!(AtomValue::Double(-1e300).int_value(&heap), i64::MIN);
        assert_eq!(AtomValue::Double(-2.9).int_value(&heap), -2);
    }

    #[test]
    fn describe_quotes_strings_with_spaces() {
        let heap = Heap::new();
        let v = list![
            SExpr::Atom(AtomValue::Int(1)),
            SExpr::Atom(AtomValue::Str("a b".into()))
        ];
        assert_eq!(v.describe(&heap), "(1 \"a b\")");
    }

    #[test]
    fn doubles_render_with_decimal_point() {
        assert_eq!(format_double(3.0), "3.0");
        assert_eq!(format_double(3.25), "3.25");
    }

    #[test]
    fn list_string_value_joins_with_spaces() {
        let heap = Heap::new();
        let v = list![
            SExpr::symbol("a"),
            list![SExpr::Atom(AtomValue::Int(1)), SExpr::Atom(AtomValue::Int(2))]
        ];
        assert_eq!(v.string_value(&heap), "a 1 2");
    }
}
