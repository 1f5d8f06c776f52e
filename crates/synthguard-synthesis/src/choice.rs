//! Guards disambiguating the outgoing transitions of choice places

use std::collections::BTreeMap;

use log::{debug, trace};
use synthguard_bdd::{BDD, Bdd};
use synthguard_petri::{PetriNet, PlaceId, TransitionId, region::StateRegionMap};
use synthguard_sts::{EventId, SymbolicTransitionSystem};

use crate::synthesis::SynthesisResult;

/// Guard of one outgoing transition of a choice place
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceGuard {
    /// Choice place
    pub choice: PlaceId,
    /// Outgoing transition of the choice place
    pub transition: TransitionId,
    /// Guard under which the transition is taken
    pub guard: BDD,
}

/// Compute the guards of all outgoing transitions of all choice places of
/// `net`
///
/// For an outgoing transition `t` bound to event `e` the guard is
///
/// ```pseudo
///  synthesized ← output guard of e, or true
///  original    ← ⋁ guards of the edges of e
///  context     ← ⋁ regions of the places reachable from the choice place
///  guard       ← restrict(restrict(synthesized, original), context)
/// ```
///
/// Transitions without an event, such as silent transitions created by the
/// non-atomic rewrite, take their derived guard from `derived_guards` in
/// place of the synthesized guard, or `true` if there is none. Their
/// original guard is `true`. If no reachable place carries a region, the
/// guard is only restricted to the original guard.
///
/// The result does not depend on the order in which choice places are
/// visited; it is ordered by choice place and transition id.
pub fn compute_choice_guards(
    system: &SymbolicTransitionSystem,
    net: &PetriNet,
    events: &BTreeMap<TransitionId, EventId>,
    regions: &StateRegionMap,
    synthesis: &SynthesisResult,
    derived_guards: &BTreeMap<TransitionId, BDD>,
) -> Vec<ChoiceGuard> {
    let mut guards = Vec::new();

    for (choice, place) in net.choice_places() {
        let reachable = net.reachable_places(choice);
        let context = if reachable.iter().any(|p| regions.contains(*p)) {
            regions.disjunction(&reachable)
        } else {
            system.bdd_true()
        };

        for transition in place.outgoing() {
            let (synthesized, original) = match events.get(transition) {
                Some(event) => (
                    synthesis
                        .output_guard(*event)
                        .cloned()
                        .unwrap_or_else(|| system.bdd_true()),
                    system
                        .edges_of_event(*event)
                        .fold(system.bdd_false(), |acc, (_, edge)| acc.or(edge.guard())),
                ),
                None => (
                    derived_guards
                        .get(transition)
                        .cloned()
                        .unwrap_or_else(|| system.bdd_true()),
                    system.bdd_true(),
                ),
            };

            let guard = system.restrict(&system.restrict(&synthesized, &original), &context);
            trace!(
                "Choice guard of '{}' at '{}' computed",
                net.transition_name(*transition),
                net.place_name(choice)
            );

            guards.push(ChoiceGuard {
                choice,
                transition: *transition,
                guard,
            });
        }
    }

    guards.sort_by_key(|g| (g.choice, g.transition));
    debug!(
        "Computed {} choice guards for net '{}'",
        guards.len(),
        net.name()
    );

    guards
}
