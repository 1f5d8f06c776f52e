//! Derivation of guards that recreate the controlled behavior
//!
//! For an edge (or a group of edges) the derived guard is the condition
//! that, added to the original guard, enables the edge in exactly those
//! controlled states from which the supervisor allows it. Guards never refer
//! to internal variables. Both properties are checked on every computed
//! guard.

use std::{collections::BTreeMap, fmt::Display};

use log::{debug, trace};
use synthguard_bdd::{BDD, Bdd};
use synthguard_sts::{EdgeId, EventId, SymbolicTransitionSystem, VarManagerError, VariableId};

use crate::{behavior::BehaviorCache, synthesis::SynthesisResult};

/// Computes guards for the edges of a system
///
/// The guard of edges is computed inductively:
///
/// ```pseudo
///  uncontrolled_extra ← controlled ∧ ⋁ guard(e)
///  controlled_extra   ← ⋁ Pre(e with guard ∧ output_guard, controlled) ∧ controlled
///  guard ← restrict(∃internal controlled_extra, ∃internal uncontrolled_extra)
///
///  check ∃internal guard ≡ guard
///  check uncontrolled_extra ∧ guard ≡ controlled_extra
/// ```
#[derive(Debug)]
pub struct GuardComputation<'a> {
    system: &'a mut SymbolicTransitionSystem,
    output_guards: &'a BTreeMap<EventId, BDD>,
    internal: Vec<VariableId>,
}

impl<'a> GuardComputation<'a> {
    /// Create a guard computation for `system` under the supervisor
    /// `synthesis`
    ///
    /// The internal variables of the system are abstracted.
    pub fn new(system: &'a mut SymbolicTransitionSystem, synthesis: &'a SynthesisResult) -> Self {
        let internal = system.internal_variables();
        GuardComputation {
            system,
            output_guards: &synthesis.output_guards,
            internal,
        }
    }

    /// Abstract `internal` instead of the internal variables of the system
    ///
    /// Fails if one of the variables does not belong to the system.
    pub fn with_internal_variables(
        mut self,
        internal: Vec<VariableId>,
    ) -> Result<Self, GuardComputationError> {
        if let Some(unknown) = internal
            .iter()
            .find(|v| self.system.variable(**v).is_none())
        {
            return Err(GuardComputationError::Abstraction(
                VarManagerError::UnknownVariable(*unknown),
            ));
        }

        self.internal = internal;
        Ok(self)
    }

    fn exists_internal(&self, pred: &BDD) -> Result<BDD, GuardComputationError> {
        self.system
            .exists_variables(pred, &self.internal)
            .map_err(GuardComputationError::Abstraction)
    }

    /// Compute the guard turning `uncontrolled` into `controlled`
    ///
    /// Both predicates are abstracted from the internal variables, then the
    /// abstracted controlled predicate is simplified relative to the
    /// abstracted uncontrolled one.
    pub fn compute_guard(
        &self,
        uncontrolled: &BDD,
        controlled: &BDD,
    ) -> Result<BDD, GuardComputationError> {
        let abstract_uncontrolled = self.exists_internal(uncontrolled)?;
        let abstract_controlled = self.exists_internal(controlled)?;

        Ok(self
            .system
            .restrict(&abstract_controlled, &abstract_uncontrolled))
    }

    /// Compute the guard of a single edge
    pub fn edge_guard(
        &mut self,
        edge: EdgeId,
        controlled: &BDD,
    ) -> Result<BDD, GuardComputationError> {
        self.group_guard(&[edge], controlled)
    }

    /// Compute the guard of the group `edges`, taken as one transition
    pub fn group_guard(
        &mut self,
        edges: &[EdgeId],
        controlled: &BDD,
    ) -> Result<BDD, GuardComputationError> {
        let subject = self.describe(edges);

        let mut original_guards = self.system.bdd_false();
        let mut extra = Vec::with_capacity(edges.len());
        for id in edges {
            let edge = self
                .system
                .edge(*id)
                .ok_or(GuardComputationError::UnknownEdge(*id))?;
            original_guards = original_guards.or(edge.guard());
            if let Some(g) = self.output_guards.get(&edge.event()) {
                extra.push((*id, g.clone()));
            }
        }

        // states from which the edges are enabled originally
        let uncontrolled_extra = controlled.and(&original_guards);

        // states from which the supervised edges stay in the controlled states
        let controlled_extra = {
            let strengthened = self.system.strengthen_guards(extra);
            edges
                .iter()
                .filter_map(|id| strengthened.edge(*id))
                .fold(strengthened.bdd_false(), |acc, edge| {
                    acc.or(&strengthened.apply_backward(edge, controlled, Some(controlled)))
                })
        };

        let guard = self.compute_guard(&uncontrolled_extra, &controlled_extra)?;

        self.check_independence(&guard, &subject)?;
        if uncontrolled_extra.and(&guard) != controlled_extra {
            return Err(GuardComputationError::NotExact(subject));
        }

        trace!("Computed guard for {subject}");
        Ok(guard)
    }

    /// Compute the guard of a node from explicitly given uncontrolled and
    /// controlled predicates
    ///
    /// Checks that the guard is independent of internal variables and that
    /// it recreates the abstracted controlled predicate.
    pub fn node_guard(
        &self,
        node: &str,
        uncontrolled: &BDD,
        controlled: &BDD,
    ) -> Result<BDD, GuardComputationError> {
        let guard = self.compute_guard(uncontrolled, controlled)?;

        let subject = format!("node '{node}'");
        self.check_independence(&guard, &subject)?;

        let abstract_uncontrolled = self.exists_internal(uncontrolled)?;
        let abstract_controlled = self.exists_internal(controlled)?;
        if abstract_uncontrolled.and(&guard) != abstract_controlled {
            return Err(GuardComputationError::NotExact(subject));
        }

        debug!("Computed guard for node '{node}'");
        Ok(guard)
    }

    /// Guard of the initial node: restricts the initial states to the
    /// initial states admitted by the supervisor
    pub fn initial_guard(
        &self,
        restriction: Option<&BDD>,
    ) -> Result<BDD, GuardComputationError> {
        let initial = self.system.initial().clone();
        let controlled = match restriction {
            Some(r) => initial.and(r),
            None => initial.clone(),
        };
        self.node_guard("initial", &initial, &controlled)
    }

    /// Guard of the final node: the marked states of the controlled behavior
    pub fn final_guard(&self, behavior: &BehaviorCache) -> Result<BDD, GuardComputationError> {
        let marked = self.system.marked();
        let uncontrolled = behavior.uncontrolled().and(marked);
        let controlled = behavior.controlled().and(marked);
        self.node_guard("final", &uncontrolled, &controlled)
    }

    fn check_independence(&self, guard: &BDD, subject: &str) -> Result<(), GuardComputationError> {
        if &self.exists_internal(guard)? != guard {
            return Err(GuardComputationError::DependsOnInternal(subject.to_string()));
        }
        Ok(())
    }

    /// Human readable description of a group of edges
    fn describe(&self, edges: &[EdgeId]) -> String {
        let names: Vec<String> = edges
            .iter()
            .map(|id| {
                let event = self
                    .system
                    .edge(*id)
                    .and_then(|e| self.system.event(e.event()))
                    .map_or("<unknown>", |e| e.name());
                format!("{id} ({event})")
            })
            .collect();
        format!("edge(s) {}", names.join(", "))
    }
}

/// Internal consistency errors of guard computation
///
/// These errors indicate that the supervisor can not be expressed by guards
/// for the given input and are not recoverable.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardComputationError {
    /// The computed guard depends on internal variables
    DependsOnInternal(String),
    /// The computed guard does not recreate the controlled behavior
    NotExact(String),
    /// A guard was requested for an edge that does not exist
    UnknownEdge(EdgeId),
    /// The internal variables could not be abstracted
    Abstraction(VarManagerError),
}

impl std::error::Error for GuardComputationError {}

impl Display for GuardComputationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardComputationError::DependsOnInternal(subject) => write!(
                f,
                "Guard computed for {subject} depends on internal variables"
            ),
            GuardComputationError::NotExact(subject) => write!(
                f,
                "Guard computed for {subject} does not recreate the controlled behavior"
            ),
            GuardComputationError::UnknownEdge(id) => write!(f, "Unknown edge {id}"),
            GuardComputationError::Abstraction(err) => {
                write!(f, "Failed to abstract internal variables: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use synthguard_bdd::{BDD, BDDManager, Bdd};
    use synthguard_sts::{
        Event, EventId, SymbolicTransitionSystem, Value, VarManagerError, Variable,
        builder::{EdgeBuilder, SymbolicTransitionSystemBuilder},
    };

    use super::{GuardComputation, GuardComputationError};
    use crate::{behavior::BehaviorCache, synthesis::SynthesisResult};

    /// Bool `x` observable, bool `h` internal. `a` sets h, `b` clears it.
    fn system() -> SymbolicTransitionSystem {
        SymbolicTransitionSystemBuilder::new("sys")
            .with_variables([
                Variable::new_bool("x"),
                Variable::new_bool("h").into_internal(),
            ])
            .unwrap()
            .with_events([Event::controllable("a"), Event::controllable("b")])
            .unwrap()
            .initialize(BDDManager::default())
            .with_edges([
                EdgeBuilder::new("a").with_assignment("h", Value::Bool(true)),
                EdgeBuilder::new("b").with_assignment("h", Value::Bool(false)),
            ])
            .unwrap()
            .build()
    }

    fn var(sts: &SymbolicTransitionSystem, name: &str) -> BDD {
        sts.var_eq(sts.variable_by_name(name).unwrap(), &Value::Bool(true))
            .unwrap()
    }

    fn result(guards: BTreeMap<EventId, BDD>) -> SynthesisResult {
        SynthesisResult {
            output_guards: guards,
            initial_restriction: None,
            disabled_events: Vec::new(),
        }
    }

    #[test]
    fn test_edge_guard_recreates_output_guard() {
        let mut sts = system();
        let x = var(&sts, "x");
        let a = sts.event_by_name("a").unwrap();
        let synthesis = result(BTreeMap::from([(a, x.clone())]));

        let controlled = sts.domain().clone();
        let (edge_a, _) = sts.edges().next().unwrap();
        let original = sts.edge(edge_a).unwrap().clone();

        let guard = GuardComputation::new(&mut sts, &synthesis)
            .edge_guard(edge_a, &controlled)
            .unwrap();
        assert_eq!(guard, x);

        // adding the guard to the original edge yields the supervised pre-image
        let pre = sts
            .pre_update(&original, &controlled)
            .and(original.guard())
            .and(&x)
            .and(&controlled);
        assert_eq!(controlled.and(original.guard()).and(&guard), pre);

        // the original guard is back in place
        assert_eq!(sts.edge(edge_a).unwrap(), &original);
    }

    #[test]
    fn test_edge_without_output_guard_is_unrestricted() {
        let mut sts = system();
        let synthesis = result(BTreeMap::new());
        let controlled = sts.domain().clone();
        let (edge_b, _) = sts.edges().nth(1).unwrap();

        let guard = GuardComputation::new(&mut sts, &synthesis)
            .edge_guard(edge_b, &controlled)
            .unwrap();
        assert!(guard.is_valid());
    }

    #[test]
    fn test_guard_is_independent_of_internal_variables() {
        let mut sts = system();
        let x = var(&sts, "x");
        let h = var(&sts, "h");
        let a = sts.event_by_name("a").unwrap();
        let synthesis = result(BTreeMap::from([(a, x.clone())]));
        let (edge_a, _) = sts.edges().next().unwrap();

        // controlled states in which h follows x
        let controlled = x.equiv(&h);

        let mut computation = GuardComputation::new(&mut sts, &synthesis);
        let guard = computation
            .compute_guard(&controlled, &controlled.and(&x))
            .unwrap();
        assert_eq!(guard, x);

        let guard = computation.edge_guard(edge_a, &controlled).unwrap();
        assert_eq!(computation.exists_internal(&guard).unwrap(), guard);
        assert_eq!(guard, x);
    }

    #[test]
    fn test_supervisor_observing_internal_variable_is_rejected() {
        let mut sts = system();
        let h = var(&sts, "h");
        let a = sts.event_by_name("a").unwrap();
        let synthesis = result(BTreeMap::from([(a, h)]));
        let controlled = sts.domain().clone();
        let (edge_a, _) = sts.edges().next().unwrap();

        let err = GuardComputation::new(&mut sts, &synthesis)
            .edge_guard(edge_a, &controlled)
            .unwrap_err();
        assert!(matches!(err, GuardComputationError::NotExact(_)));
        assert!(err.to_string().contains("(a)"));

        // treating h as observable makes the supervisor expressible
        let guard = GuardComputation::new(&mut sts, &synthesis)
            .with_internal_variables(Vec::new())
            .unwrap()
            .edge_guard(edge_a, &controlled)
            .unwrap();
        assert_eq!(guard, var(&sts, "h"));
    }

    #[test]
    fn test_group_guard() {
        let mut sts = system();
        let x = var(&sts, "x");
        let a = sts.event_by_name("a").unwrap();
        let b = sts.event_by_name("b").unwrap();
        let synthesis = result(BTreeMap::from([(a, x.clone()), (b, x.not())]));
        let controlled = sts.domain().clone();
        let edges: Vec<_> = sts.edges().map(|(id, _)| id).collect();

        // one of the two is always allowed
        let guard = GuardComputation::new(&mut sts, &synthesis)
            .group_guard(&edges, &controlled)
            .unwrap();
        assert!(guard.is_valid());
    }

    #[test]
    fn test_group_with_repeated_edge() {
        let mut sts = system();
        let x = var(&sts, "x");
        let a = sts.event_by_name("a").unwrap();
        let synthesis = result(BTreeMap::from([(a, x.clone())]));
        let controlled = sts.domain().clone();
        let (edge_a, _) = sts.edges().next().unwrap();

        let guard = GuardComputation::new(&mut sts, &synthesis)
            .group_guard(&[edge_a, edge_a], &controlled)
            .unwrap();
        assert_eq!(guard, x);

        // the original guard is back in place
        assert!(sts.edge(edge_a).unwrap().guard().is_valid());
    }

    #[test]
    fn test_foreign_internal_variable_is_rejected() {
        let other = SymbolicTransitionSystemBuilder::new("other")
            .with_variables([
                Variable::new_bool("p"),
                Variable::new_bool("q"),
                Variable::new_bool("r"),
            ])
            .unwrap()
            .initialize(BDDManager::default())
            .build();
        let foreign = other.variable_by_name("r").unwrap();

        let mut sts = system();
        let synthesis = result(BTreeMap::new());

        let err = GuardComputation::new(&mut sts, &synthesis)
            .with_internal_variables(vec![foreign])
            .unwrap_err();
        assert_eq!(
            err,
            GuardComputationError::Abstraction(VarManagerError::UnknownVariable(foreign))
        );
    }

    #[test]
    fn test_unknown_edge() {
        let mut big = SymbolicTransitionSystemBuilder::new("big")
            .with_event(Event::controllable("c"))
            .unwrap()
            .initialize(BDDManager::default());
        for _ in 0..3 {
            big = big.with_edge(EdgeBuilder::new("c")).unwrap();
        }
        let unknown = big.build().edges().map(|(id, _)| id).last().unwrap();

        let mut sts = system();
        let synthesis = result(BTreeMap::new());
        let controlled = sts.domain().clone();

        let err = GuardComputation::new(&mut sts, &synthesis)
            .edge_guard(unknown, &controlled)
            .unwrap_err();
        assert_eq!(err, GuardComputationError::UnknownEdge(unknown));
    }

    #[test]
    fn test_initial_and_final_guards() {
        let builder = SymbolicTransitionSystemBuilder::new("counter")
            .with_variable(Variable::new_int("x", 0, 3))
            .unwrap()
            .with_event(Event::controllable("inc"))
            .unwrap()
            .initialize(BDDManager::default());
        let x0 = builder.var_eq("x", Value::Int(0)).unwrap();
        let x1 = builder.var_eq("x", Value::Int(1)).unwrap();
        let x3 = builder.var_eq("x", Value::Int(3)).unwrap();
        let x_le_1 = builder.int_where("x", |x| x <= 1).unwrap();
        let x_lt_2 = builder.int_where("x", |x| x < 2).unwrap();
        let x_ge_1 = builder.int_where("x", |x| x >= 1).unwrap();

        let mut sts = builder
            .with_edge(EdgeBuilder::new("inc").with_offset("x", 1))
            .unwrap()
            .with_initial_constraint(x_le_1.clone())
            .with_marked_constraint(x_ge_1)
            .build();
        let inc = sts.event_by_name("inc").unwrap();

        let synthesis = SynthesisResult {
            output_guards: BTreeMap::from([(inc, x_lt_2)]),
            initial_restriction: Some(x0.clone()),
            disabled_events: Vec::new(),
        };
        let behavior = BehaviorCache::compute(&mut sts, &synthesis);
        let computation = GuardComputation::new(&mut sts, &synthesis);

        // initial states 0 and 1 are restricted to 0
        let initial = computation
            .initial_guard(synthesis.initial_restriction.as_ref())
            .unwrap();
        assert_eq!(initial.and(&x_le_1), x0);

        // the controlled behavior never reaches the marked state 3
        let final_guard = computation.final_guard(&behavior).unwrap();
        assert!(!final_guard.and(&x3).satisfiable());
        assert!(final_guard.and(&x1).satisfiable());

        // without a restriction the initial guard is trivial on the initial states
        let initial = computation.initial_guard(None).unwrap();
        assert_eq!(initial.and(&x_le_1), x_le_1);
    }
}
