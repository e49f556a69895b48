use lispet::{AtomValue, Interp, ObjId, SExpr};

fn eval(interp: &mut Interp, form: &str) -> SExpr {
    interp.eval_str(form)
}

fn object_id(interp: &mut Interp, name: &str) -> ObjId {
    match eval(interp, name).object_id() {
        Some(id) => id,
        None => panic!("{} is not bound to an object", name),
    }
}

fn refs(interp: &Interp, id: ObjId) -> i64 {
    match interp.heap.get(id) {
        Some(object) => object.references(),
        None => panic!("{} is gone", id),
    }
}

#[test]
fn bindings_drive_the_reference_count() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq a (object ((x 1))))");
    let id = object_id(&mut interp, "a");
    assert_eq!(refs(&interp, id), 1);

    eval(&mut interp, "(setq b a)");
    assert_eq!(refs(&interp, id), 2);

    eval(&mut interp, "(removeq b)");
    assert_eq!(refs(&interp, id), 1);

    eval(&mut interp, "(removeq a)");
    assert!(!interp.heap.contains(id));
    assert!(interp.heap.is_empty());
}

#[test]
fn unbound_objects_stay_allocated() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(object ((x 1)))");
    assert_eq!(interp.heap.len(), 1);
    let id = interp.heap.ids()[0];
    assert_eq!(refs(&interp, id), 0);
}

#[test]
fn call_scopes_release_objects_bound_to_parameters() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(defun poke (o) 1)");
    eval(&mut interp, "(poke (object ((x 1))))");
    assert!(interp.heap.is_empty());
}

#[test]
fn releasing_an_object_cascades_into_its_fields() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq inner (object ((x 1))))");
    eval(&mut interp, "(setq outer (object ((child inner))))");
    let inner = object_id(&mut interp, "inner");
    // One reference from the binding, one from the field.
    assert_eq!(refs(&interp, inner), 2);

    eval(&mut interp, "(removeq inner)");
    eval(&mut interp, "(removeq outer)");
    assert!(interp.heap.is_empty());
}

#[test]
fn dotted_paths_read_fields() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq point (object ((x 3) (y 4))))");
    assert_eq!(eval(&mut interp, "point.x"), SExpr::Atom(AtomValue::Int(3)));
    assert!(eval(&mut interp, "point.z").is_null());
}

#[test]
fn kind_of_delegates_missing_fields() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq base (object ((greeting 7))))");
    eval(&mut interp, "(setq derived (object ((kind-of base) (own 1))))");
    assert_eq!(
        eval(&mut interp, "derived.greeting"),
        SExpr::Atom(AtomValue::Int(7))
    );
    assert_eq!(eval(&mut interp, "derived.own"), SExpr::Atom(AtomValue::Int(1)));
}

#[test]
fn methods_bind_self_to_the_receiver() {
    let mut interp = Interp::with_prelude();
    eval(
        &mut interp,
        "(setq counter (object ((v 41) (bump (lambda () (+ self.v 1))))))",
    );
    assert_eq!(
        eval(&mut interp, "(counter.bump)"),
        SExpr::Atom(AtomValue::Int(42))
    );
}

#[test]
fn fset_updates_and_fget_reads() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq box (object ((size 1))))");
    eval(&mut interp, "(fset box (quote size) (+ 2 3))");
    assert_eq!(
        eval(&mut interp, "(fget box (quote size))"),
        SExpr::Atom(AtomValue::Int(5))
    );
    assert_eq!(eval(&mut interp, "box.size"), SExpr::Atom(AtomValue::Int(5)));
}

#[test]
fn object_skips_malformed_pairs() {
    let mut interp = Interp::with_prelude();
    eval(&mut interp, "(setq thing (object ((a 1) (b) 5 (c 3))))");
    let id = object_id(&mut interp, "thing");
    let object = match interp.heap.get(id) {
        Some(object) => object,
        None => panic!("thing is gone"),
    };
    assert_eq!(object.field_count(), 2);
}
