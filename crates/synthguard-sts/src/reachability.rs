//! Fixed point exploration of the state space of a
//! [`SymbolicTransitionSystem`]
//!
//! An [`Exploration`] computes the least fixed point of taking one more step
//! via any selected edge, starting from a seed predicate. Exploring never
//! changes the system: images only borrow the predicates of the edges.

use log::{debug, trace};
use synthguard_bdd::{BDD, Bdd};

use crate::{Edge, SymbolicTransitionSystem};

/// Direction of an exploration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply edges from current to next state
    Forward,
    /// Apply edges from next to current state (pre-image)
    Backward,
}

/// Edges taken into account by an exploration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeSelection {
    /// Every edge of the system
    #[default]
    All,
    /// Only edges of controllable events
    Controllable,
    /// Only edges of uncontrollable events
    Uncontrollable,
}

/// Configuration of a single fixed point exploration
///
/// ```
/// use synthguard_bdd::BDDManager;
/// use synthguard_sts::{Event, Value, Variable};
/// use synthguard_sts::builder::{EdgeBuilder, SymbolicTransitionSystemBuilder};
/// use synthguard_sts::reachability::{Direction, Exploration};
///
/// let builder = SymbolicTransitionSystemBuilder::new("counter")
///     .with_variable(Variable::new_int("x", 0, 3)).unwrap()
///     .with_event(Event::controllable("inc")).unwrap()
///     .initialize(BDDManager::default());
/// let x0 = builder.var_eq("x", Value::Int(0)).unwrap();
/// let sts = builder
///     .with_edge(EdgeBuilder::new("inc").with_offset("x", 1)).unwrap()
///     .build();
///
/// let reached = Exploration::new(&sts, Direction::Forward).explore(x0);
/// assert_eq!(&reached, sts.domain());
/// ```
#[derive(Debug, Clone)]
pub struct Exploration<'a> {
    system: &'a SymbolicTransitionSystem,
    direction: Direction,
    restriction: Option<BDD>,
    seed_is_bad: bool,
    selection: EdgeSelection,
}

impl<'a> Exploration<'a> {
    /// Create a new unrestricted exploration over all edges of `system`
    pub fn new(system: &'a SymbolicTransitionSystem, direction: Direction) -> Self {
        Exploration {
            system,
            direction,
            restriction: None,
            seed_is_bad: false,
            selection: EdgeSelection::All,
        }
    }

    /// Restrict every step of the exploration to `restriction`
    pub fn with_restriction(mut self, restriction: BDD) -> Self {
        self.restriction = Some(restriction);
        self
    }

    /// Interpret the seed and the reached states as bad states
    ///
    /// Only affects diagnostics, not the result.
    pub fn with_seed_as_bad(mut self, seed_is_bad: bool) -> Self {
        self.seed_is_bad = seed_is_bad;
        self
    }

    /// Only take the selected edges
    pub fn with_edges(mut self, selection: EdgeSelection) -> Self {
        self.selection = selection;
        self
    }

    fn is_selected(&self, edge: &Edge) -> bool {
        match self.selection {
            EdgeSelection::All => true,
            EdgeSelection::Controllable => self.system.is_controllable(edge.event()),
            EdgeSelection::Uncontrollable => !self.system.is_controllable(edge.event()),
        }
    }

    fn image(&self, edge: &Edge, states: &BDD) -> BDD {
        let restriction = self.restriction.as_ref();
        match self.direction {
            Direction::Forward => self.system.apply_forward(edge, states, restriction),
            Direction::Backward => self.system.apply_backward(edge, states, restriction),
        }
    }

    /// Compute all states reachable from `seed`
    ///
    /// # Pseudocode
    ///
    /// ```pseudo
    ///  reached ← seed ∧ restriction
    ///  frontier ← reached
    ///  loop {
    ///     // 1. one step from the frontier via any selected edge
    ///     step ← ⋁_{edge} image(edge, frontier) ∧ restriction
    ///
    ///     // 2. fixed point reached if nothing new was found
    ///     if (reached ∨ step) ≡ reached { break }
    ///
    ///     // 3. continue from the new states only
    ///     frontier ← step ∧ ¬reached
    ///     reached ← reached ∨ step
    ///  }
    /// ```
    pub fn explore(&self, seed: BDD) -> BDD {
        let kind = if self.seed_is_bad { "bad" } else { "good" };

        let mut reached = match &self.restriction {
            Some(r) => seed.and(r),
            None => seed,
        };
        let mut frontier = reached.clone();
        let mut iterations = 0_usize;

        loop {
            iterations += 1;

            // 1. one step from the frontier via any selected edge
            let step = self
                .system
                .edges()
                .map(|(_, edge)| edge)
                .filter(|edge| self.is_selected(edge))
                .fold(self.system.bdd_false(), |acc, edge| {
                    acc.or(&self.image(edge, &frontier))
                });

            // 2. fixed point reached if nothing new was found
            let extended = reached.or(&step);
            if extended == reached {
                break;
            }

            trace!(
                "{:?} exploration of '{}' found new {kind} states in iteration {iterations}",
                self.direction,
                self.system.name()
            );

            // 3. continue from the new states only
            frontier = step.and(&reached.not());
            reached = extended;
        }

        debug!(
            "{:?} exploration of {kind} states of '{}' ({:?} edges) reached a fixed point after {iterations} iterations",
            self.direction,
            self.system.name(),
            self.selection
        );

        reached
    }
}

impl SymbolicTransitionSystem {
    /// Explore the system from `seed` in `direction` over all edges
    ///
    /// Every step is restricted to `restriction` if given.
    /// `seed_is_bad` only changes how the result is reported in the log.
    pub fn explore(
        &self,
        direction: Direction,
        seed: BDD,
        restriction: Option<&BDD>,
        seed_is_bad: bool,
    ) -> BDD {
        let mut exploration = Exploration::new(self, direction).with_seed_as_bad(seed_is_bad);
        if let Some(r) = restriction {
            exploration = exploration.with_restriction(r.clone());
        }
        exploration.explore(seed)
    }

    /// All states reachable from `seed` over all edges
    pub fn forward_reachable(&self, seed: BDD) -> BDD {
        Exploration::new(self, Direction::Forward).explore(seed)
    }

    /// All states from which `target` is reachable over all edges
    pub fn backward_reachable(&self, target: BDD) -> BDD {
        Exploration::new(self, Direction::Backward).explore(target)
    }
}
