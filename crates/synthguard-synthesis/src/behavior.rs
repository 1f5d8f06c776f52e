//! Uncontrolled and controlled behavior of a system

use log::debug;
use synthguard_bdd::{BDD, Bdd};
use synthguard_sts::{EdgeId, SymbolicTransitionSystem};

use crate::synthesis::SynthesisResult;

/// Reachable states of a system with and without its supervisor
///
/// Both sets are computed once per synthesis result and reused by all guard
/// computations.
#[derive(Debug, Clone)]
pub struct BehaviorCache {
    uncontrolled: BDD,
    controlled: BDD,
}

impl BehaviorCache {
    /// Compute the behavior of `system` with and without the supervisor
    /// described by `synthesis`
    ///
    /// The uncontrolled behavior is reachable from the initial states under
    /// the original guards. The controlled behavior is reachable from the
    /// restricted initial states with the guard of every controllable edge
    /// strengthened by the output guard of its event. The guards of `system`
    /// are restored before this function returns.
    pub fn compute(system: &mut SymbolicTransitionSystem, synthesis: &SynthesisResult) -> Self {
        let uncontrolled = system.forward_reachable(system.initial().clone());

        let controlled_initial = match &synthesis.initial_restriction {
            Some(r) => system.initial().and(r),
            None => system.initial().clone(),
        };

        let extra: Vec<(EdgeId, BDD)> = system
            .edges()
            .filter(|(_, edge)| system.is_controllable(edge.event()))
            .filter_map(|(id, edge)| {
                synthesis
                    .output_guard(edge.event())
                    .map(|g| (id, g.clone()))
            })
            .collect();

        let controlled = {
            let strengthened = system.strengthen_guards(extra);
            strengthened.forward_reachable(controlled_initial)
        };

        debug!(
            "Computed uncontrolled and controlled behavior of '{}'",
            system.name()
        );

        BehaviorCache {
            uncontrolled,
            controlled,
        }
    }

    /// States reachable under the original guards
    pub fn uncontrolled(&self) -> &BDD {
        &self.uncontrolled
    }

    /// States reachable under the supervisor
    pub fn controlled(&self) -> &BDD {
        &self.controlled
    }
}
