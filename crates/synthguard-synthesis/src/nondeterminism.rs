//! Detection of overlapping guards at choice places
//!
//! The check is advisory. Every finding is logged and returned as a warning
//! message, nothing is rejected.

use std::collections::BTreeMap;

use log::warn;
use synthguard_bdd::{BDD, Bdd};
use synthguard_petri::{PetriNet, PlaceId, TransitionId};

use crate::choice::ChoiceGuard;

/// Check the outgoing branches of one choice place
///
/// Every branch is a label and its guard. Returns a message naming the first
/// two branches whose guards overlap, or `None` if all guards are pairwise
/// disjoint. Further overlaps at the same choice are not reported.
pub fn check_branches(choice: &str, branches: &[(String, BDD)]) -> Option<String> {
    let mut seen: Vec<&(String, BDD)> = Vec::with_capacity(branches.len());

    for branch in branches {
        if let Some(other) = seen.iter().find(|(_, g)| g.and(&branch.1).satisfiable()) {
            let msg = format!(
                "Non-deterministic choice at '{choice}': guards of {} and {} can hold at the same time",
                other.0, branch.0
            );
            warn!("{msg}");
            return Some(msg);
        }
        seen.push(branch);
    }

    None
}

/// Check all choice places of `net` for overlapping outgoing guards
///
/// `guards` are the choice guards computed for `net`. Branches are labeled
/// by the transition name and its target places. Returns one message per
/// non-deterministic choice place.
pub fn check_net(net: &PetriNet, guards: &[ChoiceGuard]) -> Vec<String> {
    let mut by_choice: BTreeMap<PlaceId, Vec<(TransitionId, &BDD)>> = BTreeMap::new();
    for g in guards {
        by_choice
            .entry(g.choice)
            .or_default()
            .push((g.transition, &g.guard));
    }

    by_choice
        .into_iter()
        .filter_map(|(choice, branches)| {
            let labeled: Vec<(String, BDD)> = branches
                .into_iter()
                .map(|(t, guard)| (describe_branch(net, t), guard.clone()))
                .collect();
            check_branches(net.place_name(choice), &labeled)
        })
        .collect()
}

/// `'name' (to 'p1', 'p2')`
fn describe_branch(net: &PetriNet, transition: TransitionId) -> String {
    let targets = net
        .transition(transition)
        .map(|t| {
            t.outgoing()
                .iter()
                .map(|p| format!("'{}'", net.place_name(*p)))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!("'{}' (to {targets})", net.transition_name(transition))
}
