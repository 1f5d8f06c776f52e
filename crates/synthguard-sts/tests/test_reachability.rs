//! Properties of forward and backward exploration on a small production line
//! with a buffer, an internal observer and a runtime error on overflow

#[cfg(test)]
mod test_reachability {
    use synthguard_bdd::{BDD, BDDManager, Bdd};
    use synthguard_sts::{
        Event, SymbolicTransitionSystem, Value, Variable,
        builder::{EdgeBuilder, SymbolicTransitionSystemBuilder},
        reachability::{Direction, EdgeSelection, Exploration},
    };

    /// Machine `m` produces into buffer `buf` (capacity 2), uncontrollable
    /// `take` removes items. `seen` is an internal observer bit.
    fn line() -> SymbolicTransitionSystem {
        let builder = SymbolicTransitionSystemBuilder::new("line")
            .with_variables([
                Variable::new_location("m", ["idle", "working"]),
                Variable::new_int("buf", 0, 2),
                Variable::new_bool("seen").into_internal(),
            ])
            .unwrap()
            .with_events([
                Event::controllable("start"),
                Event::uncontrollable("finish"),
                Event::uncontrollable("take"),
            ])
            .unwrap()
            .initialize(BDDManager::default());

        let idle = builder.var_eq("m", Value::Location("idle".into())).unwrap();
        let working = builder.var_eq("m", Value::Location("working".into())).unwrap();
        let buf_pos = builder.int_where("buf", |b| b > 0).unwrap();
        let buf0 = builder.var_eq("buf", Value::Int(0)).unwrap();
        let unseen = builder.var_eq("seen", Value::Bool(false)).unwrap();

        builder
            .with_edges([
                EdgeBuilder::new("start")
                    .with_guard(idle.clone())
                    .with_assignment("m", Value::Location("working".into())),
                EdgeBuilder::new("finish")
                    .with_guard(working)
                    .with_assignment("m", Value::Location("idle".into()))
                    .with_offset("buf", 1)
                    .with_assignment("seen", Value::Bool(true)),
                EdgeBuilder::new("take")
                    .with_guard(buf_pos)
                    .with_offset("buf", -1),
            ])
            .unwrap()
            .with_initial_constraint(idle.and(&buf0).and(&unseen))
            .build()
    }

    fn eq(sts: &SymbolicTransitionSystem, var: &str, value: Value) -> BDD {
        sts.var_eq(sts.variable_by_name(var).unwrap(), &value).unwrap()
    }

    #[test]
    fn test_forward_reachable_is_idempotent() {
        let sts = line();
        let reached = sts.forward_reachable(sts.initial().clone());
        let again = sts.forward_reachable(reached.clone());

        assert_eq!(reached, again);
    }

    #[test]
    fn test_forward_reachable_contains_seed() {
        let sts = line();
        let reached = sts.forward_reachable(sts.initial().clone());

        assert!(!sts.initial().and(&reached.not()).satisfiable());
    }

    #[test]
    fn test_overflow_is_a_runtime_error() {
        let sts = line();
        let finish = sts.event_by_name("finish").unwrap();
        let (_, edge) = sts.edges_of_event(finish).next().unwrap();

        let buf2 = eq(&sts, "buf", Value::Int(2));
        assert_eq!(edge.error(), Some(&buf2));

        let working = eq(&sts, "m", Value::Location("working".into()));
        assert!(!sts.apply_forward(edge, &working.and(&buf2), None).satisfiable());
    }

    #[test]
    fn test_reachable_states() {
        let sts = line();
        let reached = sts.forward_reachable(sts.initial().clone());

        // buffer 2 with the machine working can be reached
        let working = eq(&sts, "m", Value::Location("working".into()));
        let buf2 = eq(&sts, "buf", Value::Int(2));
        assert!(reached.and(&working).and(&buf2).satisfiable());

        // a filled buffer implies that the observer has seen a finish
        let unseen = eq(&sts, "seen", Value::Bool(false));
        let buf0 = eq(&sts, "buf", Value::Int(0));
        assert!(!reached.and(&unseen).and(&buf0.not()).satisfiable());
    }

    #[test]
    fn test_backward_restricted_to_uncontrollable() {
        let sts = line();
        let buf2 = eq(&sts, "buf", Value::Int(2));
        let working = eq(&sts, "m", Value::Location("working".into()));

        // states from which the uncontrollable events alone can lead to an
        // overflow attempt
        let bad = Exploration::new(&sts, Direction::Backward)
            .with_edges(EdgeSelection::Uncontrollable)
            .with_seed_as_bad(true)
            .explore(working.and(&buf2));

        let buf1 = eq(&sts, "buf", Value::Int(1));
        let buf0 = eq(&sts, "buf", Value::Int(0));
        assert!(bad.and(&working).and(&buf2).satisfiable());
        // finish from buf 1 leads to buf 2 but with an idle machine
        assert!(!bad.and(&working).and(&buf1).satisfiable());
        assert!(!bad.and(&buf0).satisfiable());
    }

    #[test]
    fn test_exists_internal_removes_observer() {
        let sts = line();
        let reached = sts.forward_reachable(sts.initial().clone());
        let abstracted = sts.exists_internal(&reached);

        assert_eq!(sts.exists_internal(&abstracted), abstracted);
        assert_eq!(sts.internal_variables().len(), 1);
    }
}
