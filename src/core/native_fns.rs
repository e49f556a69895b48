//! Eager builtins: list access, equality, arithmetic, strings, vectors,
//! geometry, and object field access. All of them receive fully evaluated
//! arguments and degrade to the null sentinel on shape mismatches.

use std::sync::Mutex;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::eval::{eval, invoke};
use crate::heap::Heap;
use crate::interp::Interp;
use crate::list;
use crate::value::{AtomValue, SExpr};

pub fn install(interp: &mut Interp) {
    interp.register("car", false, car);
    interp.register("cdr", false, cdr);
    interp.register("cons", false, cons);
    interp.register("reversed", false, reversed);
    interp.register("transposed", false, transposed);
    interp.register("list", false, list_fn);
    interp.register("eval", false, eval_fn);
    interp.register("count", false, count);
    interp.register("item", false, item);
    interp.register("replaceItem", false, replace_item);
    interp.register("map", false, map_fn);
    interp.register("reduce", false, reduce);
    interp.register("compact", false, compact);

    interp.register("=", false, equal);
    interp.register("atomp", false, atomp);
    interp.register("intp", false, intp);
    interp.register("doublep", false, doublep);
    interp.register("stringp", false, stringp);
    interp.register("booleanp", false, booleanp);
    interp.register("not", false, not);
    interp.register("and", false, and);
    interp.register("or", false, or);
    interp.register(">", false, greater);
    interp.register("<", false, lesser);
    interp.register(">=", false, greater_or_equal);
    interp.register("<=", false, lesser_or_equal);

    interp.register("+", false, add);
    interp.register("*", false, multiply);
    interp.register("-", false, subtract);
    interp.register("/", false, divide);
    interp.register("mod", false, modulo);
    interp.register("abs", false, abs);
    interp.register("sqr", false, sqr);
    interp.register("sqrt", false, sqrt);
    interp.register("exp", false, exp);
    interp.register("ln", false, ln);
    interp.register("pwr", false, pwr);
    interp.register("floor", false, floor);
    interp.register("sin", false, sin);
    interp.register("cos", false, cos);
    interp.register("tan", false, tan);
    interp.register("asin", false, asin);
    interp.register("acos", false, acos);
    interp.register("atan", false, atan);
    interp.register("atan2", false, atan2);
    interp.register("p2r", false, p2r);
    interp.register("r2p", false, r2p);

    interp.register("vadd", false, vadd);
    interp.register("vsubtract", false, vsubtract);
    interp.register("vdot", false, vdot);
    interp.register("vcross", false, vcross);
    interp.register("vmultiply", false, vmultiply);

    interp.register("explode", false, explode);
    interp.register("implode", false, implode);
    interp.register("concat", false, concat);
    interp.register("split", false, split);
    interp.register("hasprefix", false, hasprefix);
    interp.register("hassuffix", false, hassuffix);
    interp.register("contains", false, contains);
    interp.register("matches", false, matches);

    interp.register("fget", false, fget);
    interp.register("fset", false, fset);
    interp.register("printenv", false, printenv);
}

//===----------------------------------------------------------------------===//
// Helpers
//===----------------------------------------------------------------------===//

fn params(call: &SExpr) -> &[SExpr] {
    match call {
        SExpr::List(elements) => elements,
        SExpr::Atom(_) => &[],
    }
}

fn atom_at<'a>(p: &'a [SExpr], index: usize) -> Option<&'a AtomValue> {
    p.get(index).and_then(|e| e.atom())
}

fn list_at<'a>(p: &'a [SExpr], index: usize) -> Option<&'a [SExpr]> {
    match p.get(index) {
        Some(SExpr::List(items)) => Some(items),
        _ => None,
    }
}

fn boolean(v: bool) -> SExpr {
    SExpr::Atom(AtomValue::Boolean(v))
}

fn double(v: f64) -> SExpr {
    SExpr::Atom(AtomValue::Double(v))
}

fn int(v: i64) -> SExpr {
    SExpr::Atom(AtomValue::Int(v))
}

/// Numbers only, all coerced to double; a nested list disqualifies the
/// vector.
fn double_array(expr: &SExpr, heap: &Heap) -> Option<Vec<f64>> {
    match expr {
        SExpr::List(items) => {
            items.iter().map(|i| i.atom().map(|v| v.double_value(heap))).collect()
        }
        SExpr::Atom(_) => None,
    }
}

static REGEXES: Lazy<Mutex<FxHashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

fn cached_regex(pattern: &str) -> Option<Regex> {
    let mut cache = match REGEXES.lock() {
        Ok(cache) => cache,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    cache.insert(pattern.to_string(), re.clone());
    Some(re)
}

//===----------------------------------------------------------------------===//
// Lists
//===----------------------------------------------------------------------===//

fn car(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match list_at(p, 1) {
        Some(items) if !items.is_empty() => items[0].clone(),
        _ => SExpr::null(),
    }
}

fn cdr(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match list_at(p, 1) {
        Some(items) if items.len() > 1 => SExpr::List(items[1..].to_vec()),
        _ => SExpr::null(),
    }
}

/// `(cons x l)` prepends onto a list. The first argument is evaluated a
/// second time here, on top of the eager pass.
fn cons(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let tail = match list_at(p, 2) {
        Some(items) => items.to_vec(),
        None => return SExpr::null(),
    };
    let head = eval(interp, &p[1], env, depth + 1);
    let mut out = Vec::with_capacity(tail.len() + 1);
    out.push(head);
    out.extend(tail);
    SExpr::List(out)
}

fn reversed(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match list_at(p, 1) {
        Some(items) => SExpr::List(items.iter().rev().cloned().collect()),
        None => SExpr::null(),
    }
}

/// Matrix transpose. Short rows are padded with integer zeros; a row longer
/// than the first disqualifies the matrix.
fn transposed(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let rows = match list_at(p, 1) {
        Some(rows) if !rows.is_empty() => rows,
        _ => return SExpr::null(),
    };
    let cols = match &rows[0] {
        SExpr::List(first) => first.len(),
        SExpr::Atom(_) => return SExpr::null(),
    };
    let mut grid: Vec<Vec<SExpr>> = vec![vec![int(0); rows.len()]; cols];
    for (i, row) in rows.iter().enumerate() {
        let items = match row {
            SExpr::List(items) => items,
            SExpr::Atom(_) => return SExpr::null(),
        };
        if items.len() > cols {
            return SExpr::null();
        }
        for (j, element) in items.iter().enumerate() {
            grid[j][i] = element.clone();
        }
    }
    SExpr::List(grid.into_iter().map(SExpr::List).collect())
}

/// `(list ...)` collects atoms and splices list arguments one level deep.
fn list_fn(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    let mut out = Vec::new();
    for element in &p[1..] {
        match element {
            SExpr::Atom(_) => out.push(element.clone()),
            SExpr::List(items) => out.extend(items.iter().cloned()),
        }
    }
    SExpr::List(out)
}

/// Evaluates its argument one extra time, which is what makes
/// `(eval (quote form))` run the quoted form.
fn eval_fn(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    eval(interp, &p[1], env, depth + 1)
}

fn count(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match list_at(p, 1) {
        Some(items) => int(items.len() as i64),
        None => SExpr::null(),
    }
}

/// `(item i l)`: zero-based, null when out of range.
fn item(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let index = match atom_at(p, 1) {
        Some(v) => v.int_value(&interp.heap),
        None => return SExpr::null(),
    };
    let items = match list_at(p, 2) {
        Some(items) => items,
        None => return SExpr::null(),
    };
    if index < 0 || index as usize >= items.len() {
        return SExpr::null();
    }
    items[index as usize].clone()
}

/// `(replaceItem i value l)`: out-of-range indices leave the list as is.
fn replace_item(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 4 {
        return SExpr::null();
    }
    let index = match atom_at(p, 1) {
        Some(v) => v.int_value(&interp.heap),
        None => return SExpr::null(),
    };
    let mut items = match list_at(p, 3) {
        Some(items) => items.to_vec(),
        None => return SExpr::null(),
    };
    if index >= 0 && (index as usize) < items.len() {
        items[index as usize] = p[2].clone();
    }
    SExpr::List(items)
}

fn map_fn(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let f = match atom_at(p, 1).and_then(|v| v.function()) {
        Some(f) => f.clone(),
        None => return SExpr::null(),
    };
    let items = match list_at(p, 2) {
        Some(items) => items.to_vec(),
        None => return SExpr::null(),
    };
    let mut out = Vec::with_capacity(items.len());
    for element in items {
        let call = list![p[1].clone(), element];
        out.push(invoke(interp, &f, &call, env, depth + 1));
    }
    SExpr::List(out)
}

/// `(reduce f init l)`: left fold, the accumulator passed as the first
/// argument of `f`.
fn reduce(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 4 {
        return SExpr::null();
    }
    let f = match atom_at(p, 1).and_then(|v| v.function()) {
        Some(f) => f.clone(),
        None => return SExpr::null(),
    };
    let items = match list_at(p, 3) {
        Some(items) => items.to_vec(),
        None => return SExpr::null(),
    };
    let mut acc = p[2].clone();
    for element in items {
        let call = list![p[1].clone(), acc, element];
        acc = invoke(interp, &f, &call, env, depth + 1);
    }
    acc
}

fn compact(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match list_at(p, 1) {
        Some(items) => {
            SExpr::List(items.iter().filter(|i| !i.is_null()).cloned().collect())
        }
        None => SExpr::null(),
    }
}

//===----------------------------------------------------------------------===//
// Equality and predicates
//===----------------------------------------------------------------------===//

/// `(= a b)`: atoms by value, lists element-wise. List elements compare by
/// re-invoking whatever `=` resolves to at the call site, so a redefined
/// `=` also drives the structural recursion.
fn equal(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (&p[1], &p[2]) {
        (SExpr::Atom(a), SExpr::Atom(b)) => {
            if a == b {
                SExpr::strue()
            } else {
                SExpr::null()
            }
        }
        (SExpr::List(a), SExpr::List(b)) => {
            if a.len() != b.len() {
                return SExpr::null();
            }
            let me = match env.lookup_function(&interp.heap, "=") {
                Some((_, f)) => f,
                None => return SExpr::null(),
            };
            let pairs: Vec<(SExpr, SExpr)> =
                a.iter().cloned().zip(b.iter().cloned()).collect();
            for (x, y) in pairs {
                let test = list![SExpr::symbol("="), x, y];
                if invoke(interp, &me, &test, env, depth) != SExpr::strue() {
                    return SExpr::null();
                }
            }
            SExpr::strue()
        }
        _ => SExpr::null(),
    }
}

fn type_predicate(
    interp: &mut Interp,
    call: &SExpr,
    env: &Env,
    depth: usize,
    matcher: fn(&SExpr) -> bool,
) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    // One extra evaluation before testing, same as `eval`.
    let value = eval(interp, &p[1], env, depth + 1);
    if matcher(&value) {
        SExpr::strue()
    } else {
        SExpr::null()
    }
}

fn atomp(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    type_predicate(interp, call, env, depth, |v| matches!(v, SExpr::Atom(_)))
}

fn intp(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    type_predicate(interp, call, env, depth, |v| {
        matches!(v, SExpr::Atom(AtomValue::Int(_)))
    })
}

fn doublep(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    type_predicate(interp, call, env, depth, |v| {
        matches!(v, SExpr::Atom(AtomValue::Double(_)))
    })
}

fn stringp(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    type_predicate(interp, call, env, depth, |v| {
        matches!(v, SExpr::Atom(AtomValue::Str(_)))
    })
}

fn booleanp(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    type_predicate(interp, call, env, depth, |v| {
        matches!(v, SExpr::Atom(AtomValue::Boolean(_)))
    })
}

fn not(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    boolean(p[1].is_false(&interp.heap))
}

fn and(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(a), Some(b)) => {
            boolean(a.boolean_value(&interp.heap) && b.boolean_value(&interp.heap))
        }
        _ => SExpr::null(),
    }
}

fn or(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(a), Some(b)) => {
            boolean(a.boolean_value(&interp.heap) || b.boolean_value(&interp.heap))
        }
        _ => SExpr::null(),
    }
}

/// Two strings compare lexicographically, everything else numerically.
fn compare(
    interp: &Interp,
    call: &SExpr,
    str_cmp: fn(&str, &str) -> bool,
    num_cmp: fn(f64, f64) -> bool,
) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(AtomValue::Str(a)), Some(AtomValue::Str(b))) => boolean(str_cmp(a, b)),
        (Some(a), Some(b)) => {
            boolean(num_cmp(a.double_value(&interp.heap), b.double_value(&interp.heap)))
        }
        _ => SExpr::null(),
    }
}

fn greater(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    compare(interp, call, |a, b| a > b, |a, b| a > b)
}

fn lesser(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    compare(interp, call, |a, b| a < b, |a, b| a < b)
}

fn greater_or_equal(
    interp: &mut Interp,
    call: &SExpr,
    _env: &Env,
    _depth: usize,
) -> SExpr {
    compare(interp, call, |a, b| a >= b, |a, b| a >= b)
}

fn lesser_or_equal(
    interp: &mut Interp,
    call: &SExpr,
    _env: &Env,
    _depth: usize,
) -> SExpr {
    compare(interp, call, |a, b| a <= b, |a, b| a <= b)
}

//===----------------------------------------------------------------------===//
// Arithmetic
//===----------------------------------------------------------------------===//

#[derive(Clone, Copy)]
enum Acc {
    Int(i64),
    Double(f64),
}

impl Acc {
    fn promote(self) -> f64 {
        match self {
            Acc::Int(v) => v as f64,
            Acc::Double(v) => v,
        }
    }

    fn into_atom(self) -> SExpr {
        match self {
            Acc::Int(v) => int(v),
            Acc::Double(v) => double(v),
        }
    }
}

/// Variadic fold for `+` and `*`. Integers keep the result integral until a
/// double shows up; strings join in only if they parse as a number,
/// booleans count as 0/1, nested lists are skipped, and any other atom
/// voids the whole expression.
fn fold_numeric(
    call: &SExpr,
    init: i64,
    int_op: fn(i64, i64) -> i64,
    double_op: fn(f64, f64) -> f64,
) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    let mut acc = Acc::Int(init);
    for element in &p[1..] {
        let v = match element {
            SExpr::Atom(v) => v,
            SExpr::List(_) => continue,
        };
        match v {
            AtomValue::Int(i) => {
                acc = match acc {
                    Acc::Int(a) => Acc::Int(int_op(a, *i)),
                    Acc::Double(a) => Acc::Double(double_op(a, *i as f64)),
                };
            }
            AtomValue::Double(d) => acc = Acc::Double(double_op(acc.promote(), *d)),
            AtomValue::Str(s) => match acc {
                Acc::Int(a) => {
                    if let Ok(i) = s.parse::<i64>() {
                        acc = Acc::Int(int_op(a, i));
                    } else if let Ok(d) = s.parse::<f64>() {
                        acc = Acc::Double(double_op(a as f64, d));
                    }
                }
                Acc::Double(a) => {
                    if let Ok(d) = s.parse::<f64>() {
                        acc = Acc::Double(double_op(a, d));
                    }
                }
            },
            AtomValue::Boolean(b) => {
                acc = match acc {
                    Acc::Int(a) => Acc::Int(int_op(a, *b as i64)),
                    Acc::Double(a) => {
                        Acc::Double(double_op(a, if *b { 1.0 } else { 0.0 }))
                    }
                };
            }
            _ => return SExpr::null(),
        }
    }
    acc.into_atom()
}

fn add(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    fold_numeric(call, 0, i64::wrapping_add, |a, b| a + b)
}

fn multiply(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    fold_numeric(call, 1, i64::wrapping_mul, |a, b| a * b)
}

enum Pair {
    Ints(i64, i64),
    Doubles(f64, f64),
}

/// Strict binary numeric pair: int/int stays integral, any mix with a
/// double goes double, anything else is out.
fn numeric_pair(call: &SExpr) -> Option<Pair> {
    let p = params(call);
    if p.len() != 3 {
        return None;
    }
    match (atom_at(p, 1)?, atom_at(p, 2)?) {
        (AtomValue::Int(a), AtomValue::Int(b)) => Some(Pair::Ints(*a, *b)),
        (AtomValue::Int(a), AtomValue::Double(b)) => Some(Pair::Doubles(*a as f64, *b)),
        (AtomValue::Double(a), AtomValue::Int(b)) => Some(Pair::Doubles(*a, *b as f64)),
        (AtomValue::Double(a), AtomValue::Double(b)) => Some(Pair::Doubles(*a, *b)),
        _ => None,
    }
}

fn subtract(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match numeric_pair(call) {
        Some(Pair::Ints(a, b)) => int(a.wrapping_sub(b)),
        Some(Pair::Doubles(a, b)) => double(a - b),
        None => SExpr::null(),
    }
}

fn divide(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match numeric_pair(call) {
        Some(Pair::Ints(a, b)) => match a.checked_div(b) {
            Some(q) => int(q),
            None => SExpr::null(),
        },
        Some(Pair::Doubles(a, b)) => double(a / b),
        None => SExpr::null(),
    }
}

fn modulo(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match numeric_pair(call) {
        Some(Pair::Ints(a, b)) => match a.checked_rem(b) {
            Some(r) => int(r),
            None => SExpr::null(),
        },
        Some(Pair::Doubles(a, b)) => double(a % b),
        None => SExpr::null(),
    }
}

fn abs(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match atom_at(p, 1) {
        Some(AtomValue::Int(v)) => int(v.wrapping_abs()),
        Some(AtomValue::Double(v)) => double(v.abs()),
        Some(v) => double(v.double_value(&interp.heap).abs()),
        None => SExpr::null(),
    }
}

fn sqr(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match atom_at(p, 1) {
        Some(AtomValue::Int(v)) => int(v.wrapping_mul(*v)),
        Some(AtomValue::Double(v)) => double(v * v),
        _ => SExpr::null(),
    }
}

fn unary_double(
    interp: &Interp,
    call: &SExpr,
    f: fn(f64) -> f64,
) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match atom_at(p, 1) {
        Some(v) => double(f(v.double_value(&interp.heap))),
        None => SExpr::null(),
    }
}

fn sqrt(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::sqrt)
}

fn exp(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::exp)
}

fn ln(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::ln)
}

fn sin(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::sin)
}

fn cos(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::cos)
}

fn tan(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::tan)
}

fn asin(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::asin)
}

fn acos(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::acos)
}

fn atan(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    unary_double(interp, call, f64::atan)
}

fn atan2(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(y), Some(x)) => {
            double(y.double_value(&interp.heap).atan2(x.double_value(&interp.heap)))
        }
        _ => SExpr::null(),
    }
}

/// `(pwr base exponent)`: stays integral when both operands are.
fn pwr(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(a), Some(b)) => {
            let v = a
                .double_value(&interp.heap)
                .powf(b.double_value(&interp.heap));
            if matches!(a, AtomValue::Int(_)) && matches!(b, AtomValue::Int(_)) {
                int(v as i64)
            } else {
                double(v)
            }
        }
        _ => SExpr::null(),
    }
}

fn floor(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match atom_at(p, 1) {
        Some(v) => int(v.double_value(&interp.heap).floor() as i64),
        None => SExpr::null(),
    }
}

//===----------------------------------------------------------------------===//
// Geometry
//===----------------------------------------------------------------------===//

/// Polar (or spherical) to rectangular, on a single 2- or 3-element list.
fn p2r(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let coords = match double_array(&p[1], &interp.heap) {
        Some(c) => c,
        None => return SExpr::null(),
    };
    match coords[..] {
        [r, theta] => list![double(r * theta.cos()), double(r * theta.sin())],
        [r, theta, phi] => list![
            double(r * phi.sin() * theta.cos()),
            double(r * phi.sin() * theta.sin()),
            double(r * phi.cos()),
        ],
        _ => SExpr::null(),
    }
}

fn r2p(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let coords = match double_array(&p[1], &interp.heap) {
        Some(c) => c,
        None => return SExpr::null(),
    };
    match coords[..] {
        [x, y] => list![double((x * x + y * y).sqrt()), double(y.atan2(x))],
        [x, y, z] => list![
            double((x * x + y * y + z * z).sqrt()),
            double(y.atan2(x)),
            double((x * x + y * y).sqrt().atan2(z)),
        ],
        _ => SExpr::null(),
    }
}

//===----------------------------------------------------------------------===//
// Vectors
//===----------------------------------------------------------------------===//

fn vector_pair(interp: &Interp, call: &SExpr) -> Option<(Vec<f64>, Vec<f64>)> {
    let p = params(call);
    if p.len() != 3 {
        return None;
    }
    let a = double_array(p.get(1)?, &interp.heap)?;
    let b = double_array(p.get(2)?, &interp.heap)?;
    if a.len() != b.len() {
        return None;
    }
    Some((a, b))
}

fn from_doubles(values: impl IntoIterator<Item = f64>) -> SExpr {
    SExpr::List(values.into_iter().map(double).collect())
}

fn vadd(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match vector_pair(interp, call) {
        Some((a, b)) => from_doubles(a.iter().zip(&b).map(|(x, y)| x + y)),
        None => SExpr::null(),
    }
}

fn vsubtract(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match vector_pair(interp, call) {
        Some((a, b)) => from_doubles(a.iter().zip(&b).map(|(x, y)| x - y)),
        None => SExpr::null(),
    }
}

fn vdot(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match vector_pair(interp, call) {
        Some((a, b)) => double(a.iter().zip(&b).map(|(x, y)| x * y).sum()),
        None => SExpr::null(),
    }
}

fn vcross(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    match vector_pair(interp, call) {
        Some((u, v)) if u.len() >= 3 => from_doubles([
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ]),
        _ => SExpr::null(),
    }
}

/// `(vmultiply v s)`: scalar multiplication.
fn vmultiply(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let v = match double_array(&p[1], &interp.heap) {
        Some(v) => v,
        None => return SExpr::null(),
    };
    let s = match atom_at(p, 2) {
        Some(a) => a.double_value(&interp.heap),
        None => return SExpr::null(),
    };
    from_doubles(v.into_iter().map(|x| x * s))
}

//===----------------------------------------------------------------------===//
// Strings
//===----------------------------------------------------------------------===//

/// String to a list of unicode scalar values.
fn explode(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    match atom_at(p, 1) {
        Some(v) => SExpr::List(
            v.string_value(&interp.heap).chars().map(|c| int(c as i64)).collect(),
        ),
        None => SExpr::null(),
    }
}

/// List of unicode scalar values to a string; anything unusable becomes a
/// space.
fn implode(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let items = match list_at(p, 1) {
        Some(items) => items,
        None => return SExpr::null(),
    };
    let s: String = items
        .iter()
        .map(|element| match element.atom() {
            Some(v) => u32::try_from(v.int_value(&interp.heap))
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(' '),
            None => ' ',
        })
        .collect();
    SExpr::Atom(AtomValue::Str(s))
}

fn concat(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    let s: String =
        p[1..].iter().map(|e| e.string_value(&interp.heap)).collect();
    SExpr::Atom(AtomValue::Str(s))
}

/// `(split s seps)`: the separators are a list of unicode scalar values.
fn split(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let s = match atom_at(p, 1) {
        Some(v) => v.string_value(&interp.heap),
        None => return SExpr::null(),
    };
    let seps: Vec<char> = match list_at(p, 2) {
        Some(items) => items
            .iter()
            .filter_map(|element| {
                element.atom().and_then(|v| {
                    u32::try_from(v.int_value(&interp.heap))
                        .ok()
                        .and_then(char::from_u32)
                })
            })
            .collect(),
        None => return SExpr::null(),
    };
    if seps.is_empty() {
        return list![SExpr::Atom(AtomValue::Str(s))];
    }
    SExpr::List(
        s.split(|c: char| seps.contains(&c))
            .map(|part| SExpr::Atom(AtomValue::Str(part.to_string())))
            .collect(),
    )
}

fn hasprefix(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(s), Some(prefix)) => boolean(
            s.string_value(&interp.heap)
                .starts_with(&prefix.string_value(&interp.heap)),
        ),
        _ => SExpr::null(),
    }
}

fn hassuffix(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(s), Some(suffix)) => boolean(
            s.string_value(&interp.heap)
                .ends_with(&suffix.string_value(&interp.heap)),
        ),
        _ => SExpr::null(),
    }
}

/// `(contains s pattern)`: regular-expression search anywhere in the
/// string. An invalid pattern is a shape mismatch, not an error.
fn contains(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(s), Some(pattern)) => {
            match cached_regex(&pattern.string_value(&interp.heap)) {
                Some(re) => boolean(re.is_match(&s.string_value(&interp.heap))),
                None => SExpr::null(),
            }
        }
        _ => SExpr::null(),
    }
}

/// `(matches s pattern)`: every match as a list of `(group-name text)`
/// pairs, group 0 included with an empty name.
fn matches(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let (s, pattern) = match (atom_at(p, 1), atom_at(p, 2)) {
        (Some(s), Some(pattern)) => {
            (s.string_value(&interp.heap), pattern.string_value(&interp.heap))
        }
        _ => return SExpr::null(),
    };
    let re = match cached_regex(&pattern) {
        Some(re) => re,
        None => return SExpr::null(),
    };
    let names: Vec<String> = re
        .capture_names()
        .map(|n| n.unwrap_or("").to_string())
        .collect();
    let mut out = Vec::new();
    for caps in re.captures_iter(&s) {
        let groups: Vec<SExpr> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let text = caps.get(i).map(|m| m.as_str()).unwrap_or("");
                list![
                    SExpr::Atom(AtomValue::Str(name.clone())),
                    SExpr::Atom(AtomValue::Str(text.to_string())),
                ]
            })
            .collect();
        out.push(SExpr::List(groups));
    }
    SExpr::List(out)
}

//===----------------------------------------------------------------------===//
// Objects
//===----------------------------------------------------------------------===//

fn fget(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let id = match p[1].object_id() {
        Some(id) => id,
        None => return SExpr::null(),
    };
    let field = match atom_at(p, 2) {
        Some(v) => v.string_value(&interp.heap),
        None => return SExpr::null(),
    };
    interp.heap.field(id, &field).unwrap_or_else(SExpr::null)
}

/// `(fset obj field value)`: writes the field and hands back the value
/// expression as the eager pass produced it. The stored value comes from
/// one more evaluation, mirroring `eval`.
fn fset(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 4 {
        return SExpr::null();
    }
    let id = match p[1].object_id() {
        Some(id) => id,
        None => return SExpr::null(),
    };
    if !interp.heap.contains(id) {
        return SExpr::null();
    }
    let field = match atom_at(p, 2) {
        Some(v) => v.string_value(&interp.heap),
        None => return SExpr::null(),
    };
    let value = eval(interp, &p[3], env, depth + 1);
    interp.heap.set_field(id, &field, value);
    p[3].clone()
}

//===----------------------------------------------------------------------===//
// Diagnostics
//===----------------------------------------------------------------------===//

/// `(printenv)` dumps the scope chain to stderr; `v`, `f`, or `o` narrows
/// the dump to variables, functions, or heap objects.
fn printenv(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    #[derive(PartialEq, Clone, Copy)]
    enum Selector {
        All,
        Vars,
        Functions,
        Objects,
    }

    let p = params(call);
    let selector = if p.len() == 2 {
        match atom_at(p, 1).map(|v| v.string_value(&interp.heap)) {
            Some(s) if s == "v" => Selector::Vars,
            Some(s) if s == "f" => Selector::Functions,
            Some(s) if s == "o" => Selector::Objects,
            _ => return SExpr::null(),
        }
    } else {
        Selector::All
    };

    let mut cursor = Some(env.clone());
    while let Some(scope) = cursor {
        eprintln!("Level {}", scope.depth());
        let bindings = scope.local_bindings();
        if selector == Selector::All || selector == Selector::Functions {
            let names = bindings
                .iter()
                .filter(|(_, v)| matches!(v, SExpr::Atom(AtomValue::Function(_))))
                .map(|(name, _)| name.as_str())
                .join(", ");
            eprintln!("    Functions: {}", names);
        }
        if selector == Selector::All || selector == Selector::Vars {
            eprintln!("    Variables:");
            for (name, value) in &bindings {
                if matches!(value, SExpr::Atom(AtomValue::Function(_))) {
                    continue;
                }
                eprintln!("        {} => {}", name, value.string_value(&interp.heap));
            }
        }
        cursor = scope.parent();
    }
    if selector == Selector::All || selector == Selector::Objects {
        eprintln!("    Objects:");
        for id in interp.heap.ids() {
            eprintln!(
                "{}",
                SExpr::Atom(AtomValue::Object(id)).pretty(&interp.heap, "    ")
            );
        }
    }
    SExpr::null()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> SExpr {
        let mut interp = Interp::with_prelude();
        interp.eval_str(src)
    }

    #[test]
    fn car_and_cdr() {
        assert_eq!(run("(car (quote (a b c)))"), SExpr::symbol("a"));
        assert_eq!(
            run("(cdr (quote (a b c)))"),
            list![SExpr::symbol("b"), SExpr::symbol("c")]
        );
        // A one-element list has no tail.
        assert!(run("(cdr (quote (a)))").is_null());
        assert!(run("(car (quote ()))").is_null());
    }

    #[test]
    fn cons_prepends() {
        assert_eq!(
            run("(cons 1 (quote (2 3)))"),
            list![int(1), int(2), int(3)]
        );
        assert!(run("(cons 1 2)").is_null());
    }

    #[test]
    fn list_splices_list_arguments() {
        assert_eq!(
            run("(list 1 (quote (2 3)) 4)"),
            list![int(1), int(2), int(3), int(4)]
        );
    }

    #[test]
    fn addition_promotes_and_coerces() {
        assert_eq!(run("(+ 1 2)"), int(3));
        assert_eq!(run("(+ 1 2.0)"), double(3.0));
        assert_eq!(run("(+ \"3\" 4)"), int(7));
        assert_eq!(run("(+ \"3.5\" 1)"), double(4.5));
        // An unparseable string contributes nothing.
        assert_eq!(run("(+ 1 (quote abc))"), int(1));
    }

    #[test]
    fn division_by_zero_degrades_to_null() {
        assert!(run("(/ 1 0)").is_null());
        assert!(run("(mod 1 0)").is_null());
        assert_eq!(run("(/ 7 2)"), int(3));
        assert_eq!(run("(/ 7 2.0)"), double(3.5));
    }

    #[test]
    fn integral_power_and_floor() {
        assert_eq!(run("(pwr 2 10)"), int(1024));
        assert_eq!(run("(pwr 2.0 10)"), double(1024.0));
        assert_eq!(run("(floor 3.9)"), int(3));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(run("(= (quote (1 2)) (quote (1 2)))"), SExpr::strue());
        assert!(run("(= (quote (1 2)) (quote (1 3)))").is_null());
        assert!(run("(= 1 1.0)").is_null());
        assert_eq!(run("(= 1.0000001 1.0)"), SExpr::strue());
    }

    #[test]
    fn comparisons_are_string_aware() {
        assert_eq!(run("(> (quote b) (quote a))"), boolean(true));
        assert_eq!(run("(< 2 10)"), boolean(true));
        assert_eq!(run("(>= 2 2.0)"), boolean(true));
    }

    #[test]
    fn predicates_take_one_extra_evaluation() {
        assert_eq!(run("(intp 3)"), SExpr::strue());
        assert!(run("(intp 3.5)").is_null());
        assert_eq!(run("(stringp (quote hello))"), SExpr::strue());
        assert_eq!(run("(atomp (quote x))"), SExpr::strue());
        assert!(run("(atomp (quote (1 2)))").is_null());
    }

    #[test]
    fn map_and_reduce() {
        assert_eq!(
            run("(map sqr (quote (1 2 3)))"),
            list![int(1), int(4), int(9)]
        );
        assert_eq!(run("(reduce + 0 (quote (1 2 3 4)))"), int(10));
    }

    #[test]
    fn compact_drops_nulls() {
        assert_eq!(
            run("(compact (list 1 (quote ()) 2))"),
            list![int(1), int(2)]
        );
    }

    #[test]
    fn item_and_replace_item() {
        assert_eq!(run("(item 1 (quote (a b c)))"), SExpr::symbol("b"));
        assert!(run("(item 9 (quote (a)))").is_null());
        assert_eq!(
            run("(replaceItem 0 9 (quote (1 2)))"),
            list![int(9), int(2)]
        );
        assert_eq!(
            run("(replaceItem 5 9 (quote (1 2)))"),
            list![int(1), int(2)]
        );
    }

    #[test]
    fn transpose_pads_short_rows() {
        assert_eq!(
            run("(transposed (quote ((1 2) (3))))"),
            list![list![int(1), int(3)], list![int(2), int(0)]]
        );
        assert!(run("(transposed (quote ()))").is_null());
    }

    #[test]
    fn string_explode_implode_round_trip() {
        assert_eq!(
            run("(explode (quote ab))"),
            list![int(97), int(98)]
        );
        assert_eq!(
            run("(implode (quote (104 105)))"),
            SExpr::Atom(AtomValue::Str("hi".into()))
        );
    }

    #[test]
    fn split_on_scalar_set() {
        assert_eq!(
            run("(split (quote a-b_c) (quote (45 95)))"),
            list![
                SExpr::Atom(AtomValue::Str("a".into())),
                SExpr::Atom(AtomValue::Str("b".into())),
                SExpr::Atom(AtomValue::Str("c".into())),
            ]
        );
    }

    #[test]
    fn regex_contains_and_matches() {
        assert_eq!(run("(contains (quote abc123) \"[0-9]+\")"), boolean(true));
        assert_eq!(run("(contains (quote abc) \"[0-9]+\")"), boolean(false));
        assert!(run("(contains (quote abc) \"[\")").is_null());
        assert_eq!(
            run("(matches (quote a1b2) \"[0-9]\")"),
            list![
                list![list![
                    SExpr::Atom(AtomValue::Str("".into())),
                    SExpr::Atom(AtomValue::Str("1".into()))
                ]],
                list![list![
                    SExpr::Atom(AtomValue::Str("".into())),
                    SExpr::Atom(AtomValue::Str("2".into()))
                ]],
            ]
        );
    }

    #[test]
    fn vector_operations() {
        assert_eq!(
            run("(vadd (quote (1 2)) (quote (3 4)))"),
            list![double(4.0), double(6.0)]
        );
        assert_eq!(run("(vdot (quote (1 2)) (quote (3 4)))"), double(11.0));
        assert_eq!(
            run("(vcross (quote (1 0 0)) (quote (0 1 0)))"),
            list![double(0.0), double(0.0), double(1.0)]
        );
        assert!(run("(vcross (quote (1 0)) (quote (0 1)))").is_null());
        assert!(run("(vadd (quote (1 2)) (quote (1 2 3)))").is_null());
    }

    #[test]
    fn polar_round_trip() {
        let rect = run("(r2p (p2r (quote (1.0 0.5))))");
        assert_eq!(rect, list![double(1.0), double(0.5)]);
    }

    #[test]
    fn fget_and_fset() {
        let mut interp = Interp::with_prelude();
        interp.eval_str("(setq box (object ((size 1))))");
        assert_eq!(interp.eval_str("(fset box (quote size) 5)"), int(5));
        assert_eq!(interp.eval_str("(fget box (quote size))"), int(5));
        assert!(interp.eval_str("(fget box (quote missing))").is_null());
    }
}
