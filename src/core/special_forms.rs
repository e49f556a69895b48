//! Special forms: builtins registered with the special flag, so the
//! evaluator hands them their arguments raw. Anything they want evaluated
//! they evaluate themselves.

use crate::env::Env;
use crate::eval::eval;
use crate::interp::Interp;
use crate::value::{AtomValue, Function, SExpr};

pub fn install(interp: &mut Interp) {
    interp.register("quote", true, quote);
    interp.register("cond", true, cond);
    interp.register("if", true, if_form);
    interp.register("lambda", true, lambda);
    interp.register("defun", true, defun);
    interp.register("specialform", true, specialform);
    interp.register("progn", true, progn);
    interp.register("setq", true, setq);
    interp.register("set", true, set);
    interp.register("remove", true, remove);
    interp.register("removeq", true, removeq);
    interp.register("print", true, print);
    interp.register("println", true, println);
    interp.register("run", true, run);
    interp.register("object", true, object);
}

fn params(call: &SExpr) -> &[SExpr] {
    match call {
        SExpr::List(elements) => elements,
        SExpr::Atom(_) => &[],
    }
}

/// Formal parameter names from a raw `(a b c)` list.
fn formals(interp: &Interp, expr: &SExpr) -> Option<Vec<String>> {
    match expr {
        SExpr::List(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    SExpr::Atom(v) => Some(v.string_value(&interp.heap)),
                    SExpr::List(_) => None,
                })
                .collect(),
        ),
        SExpr::Atom(_) => None,
    }
}

fn atom_name(interp: &Interp, expr: &SExpr) -> Option<String> {
    match expr {
        SExpr::Atom(v) => Some(v.string_value(&interp.heap)),
        SExpr::List(_) => None,
    }
}

fn quote(_interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    p[1].clone()
}

/// `(cond (test expr)...)`: clauses are pairs; the first truthy test wins.
fn cond(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    for clause in &p[1..] {
        let pair = match clause {
            SExpr::List(pair) if pair.len() == 2 => pair,
            _ => return SExpr::null(),
        };
        let test = eval(interp, &pair[0], env, depth + 1);
        if test.is_true(&interp.heap) {
            return eval(interp, &pair[1], env, depth + 1);
        }
    }
    SExpr::null()
}

fn if_form(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 3 {
        return SExpr::null();
    }
    let test = eval(interp, &p[1], env, depth + 1);
    if test.is_true(&interp.heap) {
        eval(interp, &p[2], env, depth + 1)
    } else if p.len() > 3 {
        eval(interp, &p[3], env, depth + 1)
    } else {
        SExpr::null()
    }
}

/// Builds an anonymous closure, binds it under a generated name in the
/// current call scope, and returns the function atom.
fn lambda(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let formals = match formals(interp, &p[1]) {
        Some(f) => f,
        None => return SExpr::null(),
    };
    let name = interp.fresh_lambda_name();
    let f = Function::closure(name.clone(), false, formals, p[2].clone());
    let atom = SExpr::Atom(AtomValue::Function(f));
    env.put(&mut interp.heap, &name, atom.clone());
    atom
}

fn defun(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    define_function(interp, call, env, false)
}

/// Like `defun`, but the defined function receives raw arguments.
fn specialform(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    define_function(interp, call, env, true)
}

fn define_function(
    interp: &mut Interp,
    call: &SExpr,
    env: &Env,
    special: bool,
) -> SExpr {
    let p = params(call);
    if p.len() != 4 {
        return SExpr::null();
    }
    let name = match atom_name(interp, &p[1]) {
        Some(n) => n,
        None => return SExpr::null(),
    };
    let formals = match formals(interp, &p[2]) {
        Some(f) => f,
        None => return SExpr::null(),
    };
    let f = Function::closure(name.clone(), special, formals, p[3].clone());
    env.put_global(&mut interp.heap, &name, SExpr::Atom(AtomValue::Function(f)));
    SExpr::null()
}

/// Evaluates its arguments in order inside a fresh child scope, returning
/// the last value.
fn progn(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    let scope = env.child();
    let mut result = SExpr::null();
    for expr in &p[1..] {
        result = eval(interp, expr, &scope, depth + 1);
    }
    scope.destroy(&mut interp.heap);
    result
}

/// `(setq name value)`: evaluates the value in a throwaway child scope and
/// binds it at the root.
fn setq(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let name = match atom_name(interp, &p[1]) {
        Some(n) => n,
        None => return SExpr::null(),
    };
    let scope = env.child();
    let value = eval(interp, &p[2], &scope, depth + 1);
    scope.destroy(&mut interp.heap);
    env.put_global(&mut interp.heap, &name, value.clone());
    value
}

/// `(set name value)`: binds in the calling scope rather than the root.
fn set(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 3 {
        return SExpr::null();
    }
    let name = match atom_name(interp, &p[1]) {
        Some(n) => n,
        None => return SExpr::null(),
    };
    let value = eval(interp, &p[2], env, depth + 1);
    let target = env.parent().unwrap_or_else(|| env.clone());
    target.put(&mut interp.heap, &name, value.clone());
    value
}

fn remove(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    if let Some(name) = atom_name(interp, &p[1]) {
        let target = env.parent().unwrap_or_else(|| env.clone());
        target.remove(&mut interp.heap, &name);
    }
    SExpr::null()
}

fn removeq(interp: &mut Interp, call: &SExpr, env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    if let Some(name) = atom_name(interp, &p[1]) {
        env.remove_global(&mut interp.heap, &name);
    }
    SExpr::null()
}

/// Evaluates its first argument and prints it without a newline.
fn print(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    let value = eval(interp, &p[1], env, depth + 1);
    print!("{}", value.describe(&interp.heap));
    value
}

/// Evaluates its first argument and prints the expanded multi-line form.
fn println(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() < 2 {
        return SExpr::null();
    }
    let value = eval(interp, &p[1], env, depth + 1);
    println!("{}", value.pretty(&interp.heap, ""));
    value
}

/// `(run path)`: loads and evaluates a script file. Load failures are
/// reported on stderr and degrade to null.
fn run(interp: &mut Interp, call: &SExpr, _env: &Env, _depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let path = match atom_name(interp, &p[1]) {
        Some(n) => n,
        None => return SExpr::null(),
    };
    match interp.load_file(&path) {
        Ok(_) => eprintln!("Executed {}", path),
        Err(err) => eprintln!("{}", err),
    }
    SExpr::null()
}

/// `(object ((name value)...))`: evaluates each field value and allocates a
/// heap object, returning its handle with a zero reference count.
fn object(interp: &mut Interp, call: &SExpr, env: &Env, depth: usize) -> SExpr {
    let p = params(call);
    if p.len() != 2 {
        return SExpr::null();
    }
    let pairs = match &p[1] {
        SExpr::List(pairs) => pairs,
        SExpr::Atom(_) => return SExpr::null(),
    };
    let mut fields = Vec::new();
    for pair in pairs {
        if let SExpr::List(kv) = pair {
            if kv.len() >= 2 {
                let name = kv[0].string_value(&interp.heap);
                let value = eval(interp, &kv[1], env, depth + 1);
                fields.push((name, value));
            }
        }
    }
    let id = interp.heap.allocate(fields);
    SExpr::Atom(AtomValue::Object(id))
}
