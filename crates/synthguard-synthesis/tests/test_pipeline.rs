//! Guard synthesis from supervisor to choice guards on small activities

#[cfg(test)]
mod test_pipeline {
    use std::collections::BTreeMap;

    use synthguard_bdd::{BDD, BDDManager, Bdd};
    use synthguard_petri::{PetriNet, PetriNetBuilder, non_atomic::PatternState};
    use synthguard_sts::{
        Event, SymbolicTransitionSystem, Value, Variable,
        builder::{EdgeBuilder, SymbolicTransitionSystemBuilder},
    };
    use synthguard_synthesis::{
        GuardSynthesisPipeline, NetBinding, PipelineConfig, PipelineError,
        synthesis::{FixpointSynthesis, SupervisorSolution, SupervisorSynthesis, SynthesisError},
    };

    /// Supervisor allowing `a` exactly when `x` holds and `b` exactly when
    /// it does not
    struct AlternatingSupervisor;

    impl SupervisorSynthesis for AlternatingSupervisor {
        fn synthesize(
            &self,
            system: &mut SymbolicTransitionSystem,
        ) -> Result<SupervisorSolution, SynthesisError> {
            let x_var = system
                .variable_by_name("x")
                .ok_or_else(|| SynthesisError::Failed("no variable x".into()))?;
            let x = system
                .var_eq(x_var, &Value::Bool(true))
                .map_err(|err| SynthesisError::Failed(err.to_string()))?;
            let a = system.event_by_name("a").unwrap();
            let b = system.event_by_name("b").unwrap();

            Ok(SupervisorSolution {
                output_guards: BTreeMap::from([(a, x.clone()), (b, x.not())]),
                controlled_states: system.domain().clone(),
                initial: system.initial().clone(),
            })
        }
    }

    fn alternating_system() -> SymbolicTransitionSystem {
        SymbolicTransitionSystemBuilder::new("alternating")
            .with_variable(Variable::new_bool("x"))
            .unwrap()
            .with_events([Event::controllable("a"), Event::controllable("b")])
            .unwrap()
            .initialize(BDDManager::default())
            .with_edges([EdgeBuilder::new("a"), EdgeBuilder::new("b")])
            .unwrap()
            .build()
    }

    fn choice_net() -> PetriNet {
        PetriNetBuilder::new("choice")
            .with_places(["p", "q", "r"])
            .unwrap()
            .with_transitions(["a", "b"])
            .unwrap()
            .with_arc_to_transition("p", "a")
            .unwrap()
            .with_arc_to_transition("p", "b")
            .unwrap()
            .with_arc_to_place("a", "q")
            .unwrap()
            .with_arc_to_place("b", "r")
            .unwrap()
            .build()
    }

    #[test]
    fn test_alternating_supervisor_yields_exact_guards() {
        let mut sts = alternating_system();
        let mut net = choice_net();
        let mut binding = NetBinding::new(&sts);
        for name in ["a", "b"] {
            binding.events.insert(
                net.transition_by_name(name).unwrap(),
                sts.event_by_name(name).unwrap(),
            );
        }

        let x = sts
            .var_eq(sts.variable_by_name("x").unwrap(), &Value::Bool(true))
            .unwrap();

        let mut pipeline =
            GuardSynthesisPipeline::new(PipelineConfig::default(), AlternatingSupervisor);
        let output = pipeline.run(&mut sts, &mut net, &mut binding).unwrap();

        let guards: Vec<&BDD> = output.edge_guards.values().collect();
        assert_eq!(guards, vec![&x, &x.not()]);

        assert!(output.initial_guard.is_valid());
        assert!(output.final_guard.is_valid());
        assert!(output.synthesis.disabled_events.is_empty());

        assert_eq!(output.choice_guards.len(), 2);
        assert_eq!(output.choice_guards[0].guard, x);
        assert_eq!(output.choice_guards[1].guard, x.not());
        assert!(output.warnings.is_empty());

        // the system is unchanged
        assert!(sts.edges().all(|(_, e)| e.guard().is_valid()));
    }

    /// From `idle` the controllable `safe` finishes directly, the
    /// controllable non-atomic `fast` either finishes or breaks down
    /// uncontrollably.
    fn workshop() -> (SymbolicTransitionSystem, PetriNet, NetBinding) {
        let builder = SymbolicTransitionSystemBuilder::new("workshop")
            .with_variable(Variable::new_location(
                "stage",
                ["idle", "busy", "done", "broken"],
            ))
            .unwrap()
            .with_events([
                Event::controllable("safe"),
                Event::controllable("fast"),
                Event::uncontrollable("fast__outcome_0"),
                Event::uncontrollable("fast__outcome_1"),
            ])
            .unwrap()
            .initialize(BDDManager::default());

        let stage = |name: &str| {
            builder
                .var_eq("stage", Value::Location(name.into()))
                .unwrap()
        };
        let (idle, busy, done, broken) = (
            stage("idle"),
            stage("busy"),
            stage("done"),
            stage("broken"),
        );

        let sts = builder
            .with_edges([
                EdgeBuilder::new("safe")
                    .with_guard(idle.clone())
                    .with_assignment("stage", Value::Location("done".into())),
                EdgeBuilder::new("fast")
                    .with_guard(idle.clone())
                    .with_assignment("stage", Value::Location("busy".into())),
                EdgeBuilder::new("fast__outcome_0")
                    .with_guard(busy.clone())
                    .with_assignment("stage", Value::Location("done".into())),
                EdgeBuilder::new("fast__outcome_1")
                    .with_guard(busy.clone())
                    .with_assignment("stage", Value::Location("broken".into())),
            ])
            .unwrap()
            .with_initial_constraint(idle.clone())
            .with_marked_constraint(done.clone())
            .build();

        let net = PetriNetBuilder::new("workshop")
            .with_places(["i", "b", "d", "x"])
            .unwrap()
            .with_transitions(["safe", "fast", "fast__outcome_0", "fast__outcome_1"])
            .unwrap()
            .with_arc_to_transition("i", "safe")
            .unwrap()
            .with_arc_to_transition("i", "fast")
            .unwrap()
            .with_arc_to_place("safe", "d")
            .unwrap()
            .with_arc_to_place("fast", "b")
            .unwrap()
            .with_arc_to_transition("b", "fast__outcome_0")
            .unwrap()
            .with_arc_to_transition("b", "fast__outcome_1")
            .unwrap()
            .with_arc_to_place("fast__outcome_0", "d")
            .unwrap()
            .with_arc_to_place("fast__outcome_1", "x")
            .unwrap()
            .build();

        let mut binding = NetBinding::new(&sts);
        for name in ["safe", "fast", "fast__outcome_0", "fast__outcome_1"] {
            binding.events.insert(
                net.transition_by_name(name).unwrap(),
                sts.event_by_name(name).unwrap(),
            );
        }
        for (place, region) in [("i", idle), ("b", busy), ("d", done), ("x", broken)] {
            binding
                .regions
                .insert(net.place_by_name(place).unwrap(), region);
        }

        (sts, net, binding)
    }

    #[test]
    fn test_fixpoint_pipeline_on_workshop() {
        let (mut sts, mut net, mut binding) = workshop();
        let original_guards: Vec<BDD> = sts.edges().map(|(_, e)| e.guard().clone()).collect();

        let stage = |name: &str| {
            sts.var_eq(
                sts.variable_by_name("stage").unwrap(),
                &Value::Location(name.into()),
            )
            .unwrap()
        };
        let (idle, done, broken) = (stage("idle"), stage("done"), stage("broken"));

        let fast_start = net.transition_by_name("fast").unwrap();
        let ends = [
            net.transition_by_name("fast__outcome_0").unwrap(),
            net.transition_by_name("fast__outcome_1").unwrap(),
        ];

        let mut pipeline =
            GuardSynthesisPipeline::new(PipelineConfig::default(), FixpointSynthesis);
        let output = pipeline.run(&mut sts, &mut net, &mut binding).unwrap();

        // breaking down can not be prevented once busy, so fast is never allowed
        let fast = sts.event_by_name("fast").unwrap();
        assert_eq!(output.synthesis.disabled_events, vec![fast]);
        assert_eq!(output.behavior.controlled(), &idle.or(&done));

        let safe_edge = sts
            .edges_of_event(sts.event_by_name("safe").unwrap())
            .next()
            .unwrap()
            .0;
        let fast_edge = sts.edges_of_event(fast).next().unwrap().0;
        assert_eq!(output.edge_guards.len(), 2);
        assert!(output.edge_guards[&safe_edge].is_valid());
        assert!(!output.edge_guards[&fast_edge].satisfiable());
        assert!(output.initial_guard.is_valid());
        assert!(output.final_guard.is_valid());

        // the end transitions of fast are merged
        let rewrite = output.rewrite.as_ref().unwrap();
        assert_eq!(rewrite.patterns.len(), 1);
        assert_eq!(rewrite.patterns[0].start(), fast_start);
        assert_eq!(rewrite.patterns[0].state(), PatternState::Merged);
        assert_eq!(net.transition_name(ends[0]), "__silent_0");
        assert_eq!(net.transition_name(ends[1]), "__silent_1");
        assert_eq!(rewrite.derived_guards[&ends[0]], done);
        assert_eq!(rewrite.derived_guards[&ends[1]], broken);
        assert!(!binding.events.contains_key(&ends[0]));
        assert_eq!(
            binding.regions.get(net.place_by_name("b").unwrap()),
            Some(&done.or(&broken))
        );

        // choice at i: safe always, fast never
        let at_i: Vec<_> = output
            .choice_guards
            .iter()
            .filter(|g| g.choice == net.place_by_name("i").unwrap())
            .collect();
        assert_eq!(at_i.len(), 2);
        assert!(at_i[0].guard.is_valid());
        assert!(!at_i[1].guard.satisfiable());

        // choice at b: the outcomes keep their derived guards
        let b = net.place_by_name("b").unwrap();
        let at_b: Vec<_> = output
            .choice_guards
            .iter()
            .filter(|g| g.choice == b)
            .collect();
        assert_eq!(at_b.len(), 2);
        assert_eq!(at_b[0].transition, ends[0]);
        assert_eq!(at_b[1].transition, ends[1]);
        let context = done.or(&broken);
        assert_eq!(context.and(&at_b[0].guard), done);
        assert_eq!(context.and(&at_b[1].guard), broken);
        assert!(!at_b[0].guard.and(&at_b[1].guard).satisfiable());

        // only the disabled event is reported
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("'fast'"));

        // the system is unchanged
        let guards: Vec<BDD> = sts.edges().map(|(_, e)| e.guard().clone()).collect();
        assert_eq!(guards, original_guards);
        assert_eq!(sts.initial(), &idle);
    }

    #[test]
    fn test_disabled_phases_are_skipped() {
        let (mut sts, mut net, mut binding) = workshop();
        let config = PipelineConfig {
            merge_non_atomic: false,
            check_nondeterminism: false,
            ..PipelineConfig::default()
        };

        let mut pipeline = GuardSynthesisPipeline::new(config, FixpointSynthesis);
        let output = pipeline.run(&mut sts, &mut net, &mut binding).unwrap();

        assert!(output.rewrite.is_none());
        assert_eq!(output.warnings.len(), 1);
        assert!(net.transition_by_name("fast__outcome_0").is_some());
        // unmerged outcomes are bound to uncontrollable events without
        // output guard
        assert_eq!(output.choice_guards.len(), 4);
    }

    #[test]
    fn test_empty_supervisor_aborts() {
        let (mut sts, mut net, mut binding) = workshop();
        let idle = sts
            .var_eq(
                sts.variable_by_name("stage").unwrap(),
                &Value::Location("idle".into()),
            )
            .unwrap();
        sts.set_requirement(idle.not());

        let mut pipeline =
            GuardSynthesisPipeline::new(PipelineConfig::default(), FixpointSynthesis);
        let err = pipeline.run(&mut sts, &mut net, &mut binding).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Synthesis(SynthesisError::EmptySupervisor(_))
        ));
        // nothing was rewritten
        assert!(net.transition_by_name("fast__outcome_0").is_some());
    }
}
