//! Supervisory controller synthesis
//!
//! A [`SupervisorSynthesis`] computes, for every controllable event, the
//! condition under which a supervisor allows it. The
//! [`SynthesisAdapter`] runs any such procedure on a system without
//! permanently changing the system and condenses the solution into a
//! [`SynthesisResult`].
//!
//! [`FixpointSynthesis`] is the built-in nonblocking and controllable
//! synthesis procedure.

use std::{collections::BTreeMap, fmt::Display};

use log::{debug, info, warn};
use synthguard_bdd::{BDD, Bdd};
use synthguard_sts::{
    EventId, SymbolicTransitionSystem,
    reachability::{Direction, EdgeSelection, Exploration},
};

/// Raw solution of a synthesis procedure
#[derive(Debug, Clone)]
pub struct SupervisorSolution {
    /// Condition under which the supervisor allows a controllable event.
    /// Controllable events without an entry are always allowed.
    pub output_guards: BTreeMap<EventId, BDD>,
    /// States the supervisor keeps the system in
    pub controlled_states: BDD,
    /// Initial states the supervisor admits
    pub initial: BDD,
}

/// Interface of a supervisory controller synthesis procedure
///
/// Implementations may change the guards, the initial, marked and required
/// states of the system while computing the solution.
pub trait SupervisorSynthesis {
    /// Compute a supervisor for `system`
    fn synthesize(
        &self,
        system: &mut SymbolicTransitionSystem,
    ) -> Result<SupervisorSolution, SynthesisError>;
}

/// Synthesis result as consumed by guard computation
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Output guard of every controllable event
    pub output_guards: BTreeMap<EventId, BDD>,
    /// Restriction of the initial states, if the supervisor restricts them
    pub initial_restriction: Option<BDD>,
    /// Controllable events the supervisor never allows
    pub disabled_events: Vec<EventId>,
}

impl SynthesisResult {
    /// Output guard of `event`, `None` if the event is not restricted
    pub fn output_guard(&self, event: EventId) -> Option<&BDD> {
        self.output_guards.get(&event)
    }
}

/// Runs a synthesis procedure and restores the system afterwards
#[derive(Debug, Clone, Default)]
pub struct SynthesisAdapter<S> {
    synthesis: S,
}

impl<S: SupervisorSynthesis> SynthesisAdapter<S> {
    /// Create an adapter for the synthesis procedure `synthesis`
    pub fn new(synthesis: S) -> Self {
        SynthesisAdapter { synthesis }
    }

    /// Synthesize a supervisor for `system`
    ///
    /// All predicates of the system are restored before this function
    /// returns, including when the synthesis fails.
    ///
    /// Controllable events whose guards can never be taken under the
    /// supervisor are reported in [`SynthesisResult::disabled_events`]; this
    /// is not an error.
    pub fn synthesize(
        &self,
        system: &mut SymbolicTransitionSystem,
    ) -> Result<SynthesisResult, SynthesisError> {
        let solution = {
            let mut scope = system.predicate_scope();
            self.synthesis.synthesize(&mut scope)?
        };

        let disabled_events = Self::disabled_events(system, &solution);

        let initial_restriction = if system
            .initial()
            .and(&solution.initial.not())
            .satisfiable()
        {
            Some(solution.initial.clone())
        } else {
            None
        };

        info!(
            "Synthesized supervisor for '{}' with {} output guards ({} disabled events, initial states {})",
            system.name(),
            solution.output_guards.len(),
            disabled_events.len(),
            if initial_restriction.is_some() {
                "restricted"
            } else {
                "unrestricted"
            }
        );

        Ok(SynthesisResult {
            output_guards: solution.output_guards,
            initial_restriction,
            disabled_events,
        })
    }

    /// Controllable events none of whose edges is enabled in a controlled
    /// state under its output guard
    fn disabled_events(
        system: &SymbolicTransitionSystem,
        solution: &SupervisorSolution,
    ) -> Vec<EventId> {
        let mut disabled = Vec::new();

        for (event, e) in system.events().filter(|(_, e)| e.is_controllable()) {
            let output = solution.output_guards.get(&event);
            let enabled = system.edges_of_event(event).any(|(_, edge)| {
                let mut enabled = edge.guard().and(&solution.controlled_states);
                if let Some(g) = output {
                    enabled = enabled.and(g);
                }
                enabled.satisfiable()
            });

            if !enabled {
                warn!("No guard could be computed for controllable event '{e}': it is never allowed by the supervisor");
                disabled.push(event);
            }
        }

        disabled
    }
}

/// Nonblocking and controllable supervisor synthesis by backward fixed
/// points
///
/// The synthesized supervisor keeps the system in states that satisfy the
/// requirement, from which a marked state can always be reached, and from
/// which no uncontrollable event leads out of these states or into a runtime
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixpointSynthesis;

impl FixpointSynthesis {
    /// States from which uncontrollable edges run into a runtime error
    fn uncontrollable_error_states(system: &SymbolicTransitionSystem) -> BDD {
        system
            .edges()
            .filter(|(_, edge)| !system.is_controllable(edge.event()))
            .filter_map(|(_, edge)| edge.error().map(|err| err.and(edge.guard())))
            .fold(system.bdd_false(), |acc, err| acc.or(&err))
    }

    /// Compute the largest nonblocking and controllable set of good states
    ///
    /// # Pseudocode
    ///
    /// ```pseudo
    ///  good ← requirement ∧ domain
    ///  loop {
    ///     // 1. nonblocking: a marked state can be reached within good
    ///     nonblocking ← BackwardReach(marked ∧ good) restricted to good
    ///
    ///     // 2. controllable: no uncontrollable path to a bad state
    ///     bad ← BackwardReach_uncontrollable(¬nonblocking ∨ error_uncontrollable)
    ///
    ///     next ← nonblocking ∧ ¬bad
    ///     if next ≡ good { return good }
    ///     good ← next
    ///  }
    /// ```
    pub fn controlled_states(&self, system: &SymbolicTransitionSystem) -> BDD {
        let domain = system.domain().clone();
        let uncontrollable_errors = Self::uncontrollable_error_states(system);

        let mut good = system.requirement().and(&domain);
        let mut rounds = 0_usize;

        loop {
            rounds += 1;

            // 1. nonblocking
            let nonblocking = Exploration::new(system, Direction::Backward)
                .with_restriction(good.clone())
                .explore(system.marked().and(&good));

            // 2. controllable
            let bad_seed = nonblocking.not().and(&domain).or(&uncontrollable_errors);
            let bad = Exploration::new(system, Direction::Backward)
                .with_restriction(domain.clone())
                .with_edges(EdgeSelection::Uncontrollable)
                .with_seed_as_bad(true)
                .explore(bad_seed);

            let next = nonblocking.and(&bad.not());
            if next == good {
                break;
            }
            good = next;
        }

        debug!(
            "Controlled states of '{}' stable after {rounds} rounds",
            system.name()
        );

        good
    }

    /// Output guard of `event` keeping the system in `good`
    ///
    /// `⋀_{edges of event} (¬guard ∨ (¬error ∧ pre_update(good)))`
    pub fn output_guard(
        &self,
        system: &SymbolicTransitionSystem,
        event: EventId,
        good: &BDD,
    ) -> BDD {
        system
            .edges_of_event(event)
            .fold(system.bdd_true(), |acc, (_, edge)| {
                let mut safe = system.pre_update(edge, good);
                if let Some(err) = edge.error() {
                    safe = safe.and(&err.not());
                }
                acc.and(&edge.guard().not().or(&safe))
            })
    }
}

impl SupervisorSynthesis for FixpointSynthesis {
    fn synthesize(
        &self,
        system: &mut SymbolicTransitionSystem,
    ) -> Result<SupervisorSolution, SynthesisError> {
        let good = self.controlled_states(system);

        if !system.initial().and(&good).satisfiable() {
            return Err(SynthesisError::EmptySupervisor(system.name().to_string()));
        }

        let controllable: Vec<EventId> = system
            .events()
            .filter(|(_, e)| e.is_controllable())
            .map(|(id, _)| id)
            .collect();

        let output_guards: BTreeMap<EventId, BDD> = controllable
            .into_iter()
            .map(|event| (event, self.output_guard(system, event, &good)))
            .collect();

        // apply the supervisor to the system
        let strengthened: Vec<_> = system
            .edges()
            .filter_map(|(id, edge)| {
                output_guards
                    .get(&edge.event())
                    .map(|g| (id, edge.guard().and(g)))
            })
            .collect();
        for (id, guard) in strengthened {
            system.set_guard(id, guard);
        }
        let initial = system.initial().and(&good);
        system.set_initial(initial.clone());

        Ok(SupervisorSolution {
            output_guards,
            controlled_states: good,
            initial,
        })
    }
}

/// Errors of a synthesis procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// No initial state is part of the controlled behavior of the system
    EmptySupervisor(String),
    /// The synthesis procedure failed
    Failed(String),
}

impl std::error::Error for SynthesisError {}

impl Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisError::EmptySupervisor(name) => write!(
                f,
                "Synthesis of '{name}' resulted in an empty supervisor: no initial state is controllable and nonblocking"
            ),
            SynthesisError::Failed(msg) => write!(f, "Synthesis failed: {msg}"),
        }
    }
}
