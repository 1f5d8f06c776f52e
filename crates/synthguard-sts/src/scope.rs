//! Scoped modifications of the predicates of a [`SymbolicTransitionSystem`]
//!
//! Procedures that temporarily change predicates of a system, e.g. to
//! explore it under strengthened guards, do so through the guards of this
//! module. The original predicates are restored when the guard is dropped,
//! including on early returns and unwinding.

use std::ops::{Deref, DerefMut};

use log::trace;
use synthguard_bdd::{BDD, Bdd};

use crate::{EdgeId, SymbolicTransitionSystem};

/// Copy of all edge, initial, marked and requirement predicates of a system
#[derive(Debug, Clone)]
pub struct PredicateSnapshot {
    edges: Vec<(BDD, BDD, Option<BDD>)>,
    initial: BDD,
    marked: BDD,
    requirement: BDD,
}

impl SymbolicTransitionSystem {
    /// Take a snapshot of all predicates of the system
    pub fn snapshot(&self) -> PredicateSnapshot {
        PredicateSnapshot {
            edges: self
                .edges
                .iter()
                .map(|e| (e.guard.clone(), e.update.clone(), e.error.clone()))
                .collect(),
            initial: self.initial.clone(),
            marked: self.marked.clone(),
            requirement: self.requirement.clone(),
        }
    }

    /// Restore the predicates of a snapshot taken from this system
    pub fn restore(&mut self, snapshot: PredicateSnapshot) {
        for (edge, (guard, update, error)) in self.edges.iter_mut().zip(snapshot.edges) {
            edge.guard = guard;
            edge.update = update;
            edge.error = error;
        }
        self.initial = snapshot.initial;
        self.marked = snapshot.marked;
        self.requirement = snapshot.requirement;
    }

    /// Borrow the system mutably; all predicates are restored once the
    /// returned scope is dropped
    pub fn predicate_scope(&mut self) -> PredicateScope<'_> {
        let snapshot = self.snapshot();
        PredicateScope {
            system: self,
            snapshot: Some(snapshot),
        }
    }

    /// Strengthen the guards of the given edges for the lifetime of the
    /// returned scope
    ///
    /// Every guard is conjoined with its additional constraint. An edge
    /// given more than once is conjoined with every constraint. Edges that
    /// do not exist are ignored.
    pub fn strengthen_guards<'s, I>(&'s mut self, extra: I) -> StrengthenedGuards<'s>
    where
        I: IntoIterator<Item = (EdgeId, BDD)>,
    {
        let mut originals = Vec::new();
        for (id, constraint) in extra {
            if let Some(edge) = self.edges_mut().get_mut(id.0) {
                let strengthened = edge.guard().and(&constraint);
                originals.push((id, edge.replace_guard(strengthened)));
            }
        }

        trace!(
            "Strengthened {} guards of '{}'",
            originals.len(),
            self.name()
        );

        StrengthenedGuards {
            system: self,
            originals,
        }
    }
}

/// Mutable access to a system whose predicates are restored on drop
#[derive(Debug)]
pub struct PredicateScope<'a> {
    system: &'a mut SymbolicTransitionSystem,
    snapshot: Option<PredicateSnapshot>,
}

impl Deref for PredicateScope<'_> {
    type Target = SymbolicTransitionSystem;

    fn deref(&self) -> &Self::Target {
        self.system
    }
}

impl DerefMut for PredicateScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.system
    }
}

impl Drop for PredicateScope<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.system.restore(snapshot);
        }
    }
}

/// Read access to a system with strengthened guards
///
/// The original guards are put back when the value is dropped.
#[derive(Debug)]
pub struct StrengthenedGuards<'a> {
    system: &'a mut SymbolicTransitionSystem,
    originals: Vec<(EdgeId, BDD)>,
}

impl Deref for StrengthenedGuards<'_> {
    type Target = SymbolicTransitionSystem;

    fn deref(&self) -> &Self::Target {
        self.system
    }
}

impl Drop for StrengthenedGuards<'_> {
    fn drop(&mut self) {
        // an edge strengthened twice must end up with its first original
        for (id, guard) in self.originals.drain(..).rev() {
            if let Some(edge) = self.system.edges_mut().get_mut(id.0) {
                edge.replace_guard(guard);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use synthguard_bdd::{BDDManager, Bdd};

    use crate::{
        EdgeId, Event, SymbolicTransitionSystem, Value, Variable,
        builder::{EdgeBuilder, SymbolicTransitionSystemBuilder},
    };

    fn system() -> SymbolicTransitionSystem {
        SymbolicTransitionSystemBuilder::new("toggle")
            .with_variable(Variable::new_bool("b"))
            .unwrap()
            .with_events([Event::controllable("on"), Event::controllable("off")])
            .unwrap()
            .initialize(BDDManager::default())
            .with_edges([
                EdgeBuilder::new("on").with_assignment("b", Value::Bool(true)),
                EdgeBuilder::new("off").with_assignment("b", Value::Bool(false)),
            ])
            .unwrap()
            .build()
    }

    fn b(sts: &SymbolicTransitionSystem) -> synthguard_bdd::BDD {
        let var = sts.variable_by_name("b").unwrap();
        sts.var_eq(var, &Value::Bool(true)).unwrap()
    }

    #[test]
    fn test_strengthened_guards_are_restored() {
        let mut sts = system();
        let b = b(&sts);

        {
            let strengthened =
                sts.strengthen_guards([(EdgeId(0), b.not()), (EdgeId(7), b.clone())]);
            let (_, on) = strengthened.edges().next().unwrap();
            assert_eq!(on.guard(), &b.not());

            // `on` is only enabled if b is false
            let reached = strengthened.forward_reachable(b.clone());
            assert_eq!(reached, strengthened.domain().clone());
        }

        let (_, on) = sts.edges().next().unwrap();
        assert!(on.guard().is_valid());
    }

    #[test]
    fn test_edge_strengthened_twice_is_restored() {
        let mut sts = system();
        let b = b(&sts);

        {
            let strengthened =
                sts.strengthen_guards([(EdgeId(1), b.clone()), (EdgeId(1), b.not())]);
            let (_, off) = strengthened.edges().nth(1).unwrap();
            assert!(!off.guard().satisfiable());
        }

        let (_, off) = sts.edges().nth(1).unwrap();
        assert!(off.guard().is_valid());
    }

    #[test]
    fn test_predicate_scope_restores_everything() {
        let mut sts = system();
        let b = b(&sts);

        {
            let mut scope = sts.predicate_scope();
            scope.set_initial(b.clone());
            scope.set_marked(b.not());
            scope.set_requirement(b.clone());
            scope.edges_mut()[1].replace_guard(b.clone());
            assert_eq!(scope.initial(), &b);
        }

        assert_eq!(sts.initial(), sts.domain());
        assert_eq!(sts.marked(), sts.domain());
        assert!(sts.requirement().is_valid());
        assert!(sts.edges().all(|(_, e)| e.guard().is_valid()));
    }

    #[test]
    fn test_snapshot_restore_on_early_return() {
        fn failing(sts: &mut SymbolicTransitionSystem, b: &synthguard_bdd::BDD) -> Result<(), ()> {
            let mut scope = sts.predicate_scope();
            scope.set_initial(b.clone());
            Err(())
        }

        let mut sts = system();
        let b = b(&sts);
        assert!(failing(&mut sts, &b).is_err());
        assert_eq!(sts.initial(), sts.domain());
    }
}
