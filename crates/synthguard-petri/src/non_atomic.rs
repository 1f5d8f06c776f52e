//! Merging of non-atomic actions
//!
//! A non-atomic action is modeled by a start transition `S` followed by one
//! of several end transitions `S__outcome_0`, `S__outcome_1`, .... The start
//! transition has a single arc into an intermediate place, which is the only
//! predecessor of every end transition:
//!
//! ```text
//!  -- S --> (intermediate) -- S__outcome_0 --> ...
//!                          -- S__outcome_1 --> ...
//! ```
//!
//! The [`NonAtomicRewriter`] relabels all end transitions with fresh silent
//! labels and recomputes the state information of the intermediate place and
//! the guards of the relabeled transitions from the state regions of their
//! successors.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
};

use log::{debug, info, warn};
use synthguard_bdd::BDD;

use crate::{PetriNet, PlaceId, TransitionId, region::StateRegionMap};

/// Infix separating the name of the start transition from the outcome index
/// in the names of end transitions
pub const OUTCOME_SEPARATOR: &str = "__outcome_";

/// Prefix of the labels of silent transitions
pub const SILENT_PREFIX: &str = "__silent_";

/// Progress of a detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    /// Detected, end transitions still carry their original names
    Unmerged,
    /// End transitions relabeled as silent transitions
    Merged,
}

/// Start transition, intermediate place and end transitions of a non-atomic
/// action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonAtomicPattern {
    start: TransitionId,
    intermediate: PlaceId,
    /// Ordered by outcome index
    ends: Vec<TransitionId>,
    state: PatternState,
}

impl NonAtomicPattern {
    /// Start transition of the action
    pub fn start(&self) -> TransitionId {
        self.start
    }

    /// Place between the start and the end transitions
    pub fn intermediate(&self) -> PlaceId {
        self.intermediate
    }

    /// End transitions, ordered by outcome index
    pub fn ends(&self) -> &[TransitionId] {
        &self.ends
    }

    /// Current state of the pattern
    pub fn state(&self) -> PatternState {
        self.state
    }
}

/// Result of merging all non-atomic patterns of a net
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// Original name of every relabeled transition mapped to its silent label
    pub renamed: BTreeMap<String, String>,
    /// Derived guard of every relabeled transition
    pub derived_guards: BTreeMap<TransitionId, BDD>,
    /// Merged patterns
    pub patterns: Vec<NonAtomicPattern>,
    /// Patterns that were detected but not merged
    pub warnings: Vec<String>,
}

/// Detects and merges non-atomic patterns
///
/// The rewriter owns the counter for silent labels. Reusing a rewriter for
/// several nets keeps the labels unique across all of them.
#[derive(Debug, Clone, Default)]
pub struct NonAtomicRewriter {
    next_silent: usize,
}

impl NonAtomicRewriter {
    /// Create a new rewriter whose first silent label is `__silent_0`
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_silent_label(&mut self) -> String {
        let label = format!("{SILENT_PREFIX}{}", self.next_silent);
        self.next_silent += 1;
        label
    }

    /// Outcome index of `name` if it is an end transition of `start`
    fn outcome_index(start: &str, name: &str) -> Option<u64> {
        let suffix = name.strip_prefix(start)?.strip_prefix(OUTCOME_SEPARATOR)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }

    /// Find all non-atomic patterns of `net`
    ///
    /// Returns the patterns with at least two end transitions and a warning
    /// for every pattern with fewer ends. Structural violations and end
    /// transitions whose names do not match the structure are errors.
    pub fn detect(
        &self,
        net: &PetriNet,
    ) -> Result<(Vec<NonAtomicPattern>, Vec<String>), RewriteError> {
        let mut patterns = Vec::new();
        let mut warnings = Vec::new();

        for (start, start_t) in net.transitions() {
            // end transitions inferred from the naming convention
            let mut named: Vec<(u64, TransitionId)> = net
                .transitions()
                .filter_map(|(id, t)| {
                    Self::outcome_index(start_t.name(), t.name()).map(|n| (n, id))
                })
                .collect();
            if named.is_empty() {
                continue;
            }
            named.sort();

            let malformed = |reason: &str| RewriteError::MalformedPattern {
                start: start_t.name().to_string(),
                reason: reason.to_string(),
            };

            let [intermediate] = start_t.outgoing() else {
                return Err(malformed(
                    "the start transition must have exactly one outgoing arc",
                ));
            };
            let Some(place) = net.place(*intermediate) else {
                return Err(malformed("the intermediate place does not exist"));
            };
            if place.incoming().len() != 1 {
                return Err(malformed(
                    "the intermediate place must have exactly one incoming arc",
                ));
            }

            // end transitions found in the structure
            let found: BTreeSet<TransitionId> = place.outgoing().iter().copied().collect();
            for end in &found {
                if net.transition(*end).map(|t| t.incoming().len()) != Some(1) {
                    return Err(malformed(
                        "every end transition must have exactly one incoming arc",
                    ));
                }
            }

            let expected: BTreeSet<TransitionId> = named.iter().map(|(_, id)| *id).collect();
            if expected != found {
                let names = |ids: &BTreeSet<TransitionId>| -> Vec<String> {
                    ids.iter()
                        .map(|id| net.transition_name(*id).to_string())
                        .collect()
                };
                return Err(RewriteError::EndTransitionMismatch {
                    start: start_t.name().to_string(),
                    expected: names(&expected),
                    found: names(&found),
                });
            }

            if named.len() < 2 {
                let msg = format!(
                    "Non-atomic action '{}' has only {} end transition(s) and is not merged",
                    start_t.name(),
                    named.len()
                );
                warn!("{msg}");
                warnings.push(msg);
                continue;
            }

            debug!(
                "Detected non-atomic action '{}' with {} end transitions",
                start_t.name(),
                named.len()
            );
            patterns.push(NonAtomicPattern {
                start,
                intermediate: *intermediate,
                ends: named.into_iter().map(|(_, id)| id).collect(),
                state: PatternState::Unmerged,
            });
        }

        Ok((patterns, warnings))
    }

    /// Merge all non-atomic patterns of `net`
    ///
    /// For every pattern:
    /// 1. every end transition is relabeled with a fresh silent label
    /// 2. every relabeled transition gets the disjunction of the regions of
    ///    its own successor places as derived guard
    /// 3. the region of the intermediate place becomes the disjunction of the
    ///    regions of all successors of all end transitions
    pub fn rewrite(
        &mut self,
        net: &mut PetriNet,
        regions: &mut StateRegionMap,
    ) -> Result<RewriteOutcome, RewriteError> {
        let (mut patterns, warnings) = self.detect(net)?;

        let mut renamed = BTreeMap::new();
        let mut derived_guards = BTreeMap::new();

        for pattern in patterns.iter_mut() {
            let mut successors = BTreeSet::new();

            for end in &pattern.ends {
                let outgoing = net
                    .transition(*end)
                    .map(|t| t.outgoing().to_vec())
                    .unwrap_or_default();

                // 2. derived guard from the own successors
                derived_guards.insert(*end, regions.disjunction(&outgoing));
                successors.extend(outgoing);

                // 1. relabel
                let label = self.fresh_silent_label();
                renamed.insert(net.transition_name(*end).to_string(), label.clone());
                net.rename_transition(*end, label);
            }

            // 3. region of the intermediate place
            let merged_region = regions.disjunction(&successors);
            regions.insert(pattern.intermediate, merged_region);
            pattern.state = PatternState::Merged;

            info!(
                "Merged {} end transitions of non-atomic action '{}'",
                pattern.ends.len(),
                net.transition_name(pattern.start)
            );
        }

        Ok(RewriteOutcome {
            renamed,
            derived_guards,
            patterns,
            warnings,
        })
    }
}

/// Error raised for a net violating the structure of non-atomic actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The arcs around a start transition violate the pattern
    MalformedPattern {
        /// Name of the start transition
        start: String,
        /// Violated constraint
        reason: String,
    },
    /// End transitions found by name differ from those found by structure
    EndTransitionMismatch {
        /// Name of the start transition
        start: String,
        /// End transitions by name
        expected: Vec<String>,
        /// End transitions following the intermediate place
        found: Vec<String>,
    },
}

impl std::error::Error for RewriteError {}

impl Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::MalformedPattern { start, reason } => {
                write!(f, "Malformed non-atomic action '{start}': {reason}")
            }
            RewriteError::EndTransitionMismatch {
                start,
                expected,
                found,
            } => write!(
                f,
                "End transitions of non-atomic action '{start}' do not match: expected [{}] but found [{}]",
                expected.join(", "),
                found.join(", ")
            ),
        }
    }
}
