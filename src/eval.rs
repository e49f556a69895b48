use crate::env::Env;
use crate::interp::Interp;
use crate::value::{AtomValue, Callable, Function, SExpr};

/// Recursion ceiling. Exceeding it yields the null sentinel instead of
/// overflowing the host stack.
pub const MAX_DEPTH: usize = 1000;

//===----------------------------------------------------------------------===//
// Evaluator
//===----------------------------------------------------------------------===//

pub fn eval(interp: &mut Interp, expr: &SExpr, env: &Env, depth: usize) -> SExpr {
    eval_with_owner(interp, expr, env, depth).1
}

/// Evaluates one form, also reporting the object a dotted head was projected
/// from so method calls can bind `self`.
pub fn eval_with_owner(
    interp: &mut Interp,
    expr: &SExpr,
    env: &Env,
    depth: usize,
) -> (Option<SExpr>, SExpr) {
    if depth > MAX_DEPTH {
        eprintln!(
            "recursion limit reached while evaluating {}",
            expr.describe(&interp.heap)
        );
        return (None, SExpr::null());
    }

    let tracing = trace_enabled(interp, env);
    if tracing {
        eprintln!("{}Evaluating {}", " ".repeat(depth), expr.describe(&interp.heap));
    }

    let (owner, result) = match expr {
        SExpr::Atom(v) => {
            // Atoms resolve by their textual name; unbound ones quote
            // themselves.
            let name = v.string_value(&interp.heap);
            match env.lookup(&interp.heap, &name) {
                Some((owner, value)) => (owner, value),
                None => (None, expr.clone()),
            }
        }
        SExpr::List(elements) => {
            if elements.is_empty() {
                (None, SExpr::null())
            } else {
                eval_call(interp, elements, env, depth)
            }
        }
    };

    if tracing {
        eprintln!(
            "{}Evaluating {} => {}",
            " ".repeat(depth),
            expr.describe(&interp.heap),
            result.describe(&interp.heap)
        );
    }

    (owner, result)
}

/// Non-empty list evaluation. The special flag is read off the raw head
/// before anything is evaluated; the head itself is always evaluated, the
/// remaining elements only for eager functions. Resolution runs again on
/// the evaluated head, and an unresolvable list evaluates to itself.
fn eval_call(
    interp: &mut Interp,
    elements: &[SExpr],
    env: &Env,
    depth: usize,
) -> (Option<SExpr>, SExpr) {
    let special = match &elements[0] {
        SExpr::Atom(AtomValue::Function(f)) => f.special,
        SExpr::Atom(v) => {
            let name = v.string_value(&interp.heap);
            env.lookup_function(&interp.heap, &name)
                .map(|(_, f)| f.special)
                .unwrap_or(false)
        }
        SExpr::List(_) => false,
    };

    let scope = env.child();
    let mut head_owner: Option<SExpr> = None;
    let mut evaluated: Vec<SExpr> = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        if index == 0 {
            let (owner, value) = eval_with_owner(interp, element, &scope, depth + 1);
            head_owner = owner;
            evaluated.push(value);
        } else if special {
            evaluated.push(element.clone());
        } else {
            evaluated.push(eval(interp, element, &scope, depth + 1));
        }
    }

    // Resolution runs again here, through the call scope: evaluating the
    // head (or the arguments) may have rebound the symbol there.
    let outcome = match &evaluated[0] {
        SExpr::Atom(AtomValue::Function(f)) => {
            let f = f.clone();
            if let Some(receiver) = head_owner {
                scope.put(&mut interp.heap, "self", receiver);
            }
            let call = SExpr::List(evaluated);
            (None, invoke(interp, &f, &call, &scope, depth))
        }
        SExpr::Atom(v) => {
            let name = v.string_value(&interp.heap);
            match scope.lookup_function(&interp.heap, &name) {
                Some((owner, f)) => {
                    if let Some(receiver) = owner.clone() {
                        scope.put(&mut interp.heap, "self", receiver);
                    }
                    let call = SExpr::List(evaluated);
                    (owner, invoke(interp, &f, &call, &scope, depth))
                }
                None => (None, SExpr::List(evaluated)),
            }
        }
        SExpr::List(_) => (None, SExpr::List(evaluated)),
    };

    scope.destroy(&mut interp.heap);
    outcome
}

/// Applies a function to an already-shaped call list. Closures open a child
/// of the calling scope, so their free variables resolve through whatever
/// chain is active at the call site.
pub fn invoke(
    interp: &mut Interp,
    f: &Function,
    call: &SExpr,
    env: &Env,
    depth: usize,
) -> SExpr {
    match &f.callable {
        Callable::Native(native) => native(interp, call, env, depth),
        Callable::Closure(closure) => {
            let scope = env.child();
            if let SExpr::List(elements) = call {
                for (param, arg) in
                    closure.params.iter().zip(elements.iter().skip(1))
                {
                    scope.put(&mut interp.heap, param, arg.clone());
                }
            }
            let result = eval(interp, &closure.body, &scope, depth + 1);
            scope.destroy(&mut interp.heap);
            result
        }
    }
}

fn trace_enabled(interp: &Interp, env: &Env) -> bool {
    env.lookup(&interp.heap, "trace")
        .map(|(_, v)| v.is_true(&interp.heap))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interp;
    use crate::list;

    fn int(v: i64) -> SExpr {
        SExpr::Atom(AtomValue::Int(v))
    }

    #[test]
    fn unbound_symbols_quote_themselves() {
        let mut interp = Interp::new();
        let env = interp.root();
        let result = eval(&mut interp, &SExpr::symbol("mystery"), &env, 0);
        assert_eq!(result, SExpr::symbol("mystery"));
    }

    #[test]
    fn bound_symbols_resolve() {
        let mut interp = Interp::new();
        let env = interp.root();
        env.put(&mut interp.heap, "x", int(7));
        let result = eval(&mut interp, &SExpr::symbol("x"), &env, 0);
        assert_eq!(result, int(7));
    }

    #[test]
    fn unresolvable_lists_evaluate_to_themselves() {
        let mut interp = Interp::new();
        let env = interp.root();
        let expr = list![SExpr::symbol("nosuch"), int(1), int(2)];
        let result = eval(&mut interp, &expr, &env, 0);
        assert_eq!(result, expr);
    }

    #[test]
    fn arguments_evaluate_before_eager_calls() {
        let mut interp = Interp::with_prelude();
        let env = interp.root();
        env.put(&mut interp.heap, "x", int(2));
        let expr = list![SExpr::symbol("+"), SExpr::symbol("x"), int(3)];
        assert_eq!(eval(&mut interp, &expr, &env, 0), int(5));
    }

    #[test]
    fn head_rebound_during_argument_eval_is_invoked() {
        let mut interp = Interp::with_prelude();
        let env = interp.root();
        // set writes into the call scope, so by re-dispatch time the head
        // symbol resolves to the identity function bound there.
        let expr = crate::reader::read("(g (set g (lambda (x) x)))");
        let result = eval(&mut interp, &expr, &env, 0);
        assert!(matches!(result, SExpr::Atom(AtomValue::Function(_))));
    }

    #[test]
    fn recursion_limit_degrades_to_null() {
        let mut interp = Interp::new();
        let env = interp.root();
        let result = eval(&mut interp, &int(1), &env, MAX_DEPTH + 1);
        assert!(result.is_null());
    }
}
