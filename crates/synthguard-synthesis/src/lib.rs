//! Derivation of guards from a synthesized supervisor
//!
//! Given a [`SymbolicTransitionSystem`] and the Petri net of the activity it
//! was generated from, the [`GuardSynthesisPipeline`] synthesizes a
//! supervisor and expresses it as guards on the observable state:
//!
//! 1. [`synthesis`]: supervisor synthesis, with the system restored afterwards
//! 2. [`behavior`]: uncontrolled and controlled reachable states
//! 3. [`guards`]: guards of the controllable edges, the initial node and the
//!    final node, checked for exactness
//! 4. [`synthguard_petri::non_atomic`]: merging of non-atomic actions
//! 5. [`choice`]: guards of the outgoing transitions of choice places
//! 6. [`nondeterminism`]: advisory check for overlapping choice guards
//!
//! All steps can also be used on their own.

use std::{collections::BTreeMap, fmt::Display};

use log::info;
use synthguard_bdd::{BDD, BDDManager, BDDManagerConfig};
use synthguard_petri::{
    PetriNet, TransitionId,
    non_atomic::{NonAtomicRewriter, RewriteError, RewriteOutcome},
    region::StateRegionMap,
};
use synthguard_sts::{EdgeId, EventId, SymbolicTransitionSystem};

#[cfg(feature = "config_deserialize")]
use serde::Deserialize;

use crate::{
    behavior::BehaviorCache,
    choice::{ChoiceGuard, compute_choice_guards},
    guards::{GuardComputation, GuardComputationError},
    synthesis::{SupervisorSynthesis, SynthesisAdapter, SynthesisError, SynthesisResult},
};

pub mod behavior;
pub mod choice;
pub mod guards;
pub mod nondeterminism;
pub mod synthesis;

/// Configuration of a [`GuardSynthesisPipeline`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config_deserialize", derive(Deserialize))]
#[cfg_attr(feature = "config_deserialize", serde(default))]
pub struct PipelineConfig {
    /// Configuration of the BDD manager used to build systems, backend
    /// default if not set
    pub bdd: Option<BDDManagerConfig>,
    /// Merge the end transitions of non-atomic actions
    pub merge_non_atomic: bool,
    /// Check choice guards for overlaps
    pub check_nondeterminism: bool,
}

impl PipelineConfig {
    /// Create a BDD manager according to the configuration
    pub fn bdd_manager(&self) -> BDDManager {
        match &self.bdd {
            Some(cfg) => BDDManager::new(cfg),
            None => BDDManager::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            bdd: None,
            merge_non_atomic: true,
            check_nondeterminism: true,
        }
    }
}

/// Connection between a Petri net and a symbolic transition system
#[derive(Debug, Clone)]
pub struct NetBinding {
    /// Event of the system every transition corresponds to. Transitions
    /// without an entry are silent.
    pub events: BTreeMap<TransitionId, EventId>,
    /// States of the system every place corresponds to
    pub regions: StateRegionMap,
}

impl NetBinding {
    /// Create a binding without any transitions and regions
    pub fn new(system: &SymbolicTransitionSystem) -> Self {
        NetBinding {
            events: BTreeMap::new(),
            regions: StateRegionMap::new(system.bdd_false()),
        }
    }
}

/// Products of a [`GuardSynthesisPipeline`] run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Synthesized supervisor
    pub synthesis: SynthesisResult,
    /// Uncontrolled and controlled behavior
    pub behavior: BehaviorCache,
    /// Guard of every controllable edge
    pub edge_guards: BTreeMap<EdgeId, BDD>,
    /// Guard of the initial node
    pub initial_guard: BDD,
    /// Guard of the final node
    pub final_guard: BDD,
    /// Result of merging non-atomic actions, if enabled
    pub rewrite: Option<RewriteOutcome>,
    /// Guards of the outgoing transitions of choice places
    pub choice_guards: Vec<ChoiceGuard>,
    /// Advisory findings
    pub warnings: Vec<String>,
}

/// Runs all steps of guard synthesis in order
#[derive(Debug, Clone)]
pub struct GuardSynthesisPipeline<S> {
    config: PipelineConfig,
    adapter: SynthesisAdapter<S>,
    rewriter: NonAtomicRewriter,
}

impl<S: SupervisorSynthesis> GuardSynthesisPipeline<S> {
    /// Create a pipeline running `synthesis`
    pub fn new(config: PipelineConfig, synthesis: S) -> Self {
        GuardSynthesisPipeline {
            config,
            adapter: SynthesisAdapter::new(synthesis),
            rewriter: NonAtomicRewriter::new(),
        }
    }

    /// Configuration of the pipeline
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on `system` and the net `net` bound to it by
    /// `binding`
    ///
    /// The predicates of `system` are unchanged afterwards. If non-atomic
    /// actions are merged, `net` is relabeled, the regions in `binding` are
    /// updated and the relabeled transitions are removed from the events of
    /// `binding`.
    pub fn run(
        &mut self,
        system: &mut SymbolicTransitionSystem,
        net: &mut PetriNet,
        binding: &mut NetBinding,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut warnings = Vec::new();

        info!("Synthesizing supervisor for '{}'", system.name());
        let synthesis = self.adapter.synthesize(system)?;
        for event in &synthesis.disabled_events {
            let name = system.event(*event).map_or("<unknown>", |e| e.name());
            warnings.push(format!(
                "Controllable event '{name}' is never allowed by the supervisor"
            ));
        }

        info!("Computing controlled and uncontrolled behavior");
        let behavior = BehaviorCache::compute(system, &synthesis);

        info!("Computing guards");
        let controllable: Vec<EdgeId> = system
            .edges()
            .filter(|(_, edge)| system.is_controllable(edge.event()))
            .map(|(id, _)| id)
            .collect();

        let mut computation = GuardComputation::new(system, &synthesis);
        let mut edge_guards = BTreeMap::new();
        for id in controllable {
            let guard = computation.edge_guard(id, behavior.controlled())?;
            edge_guards.insert(id, guard);
        }
        let initial_guard = computation.initial_guard(synthesis.initial_restriction.as_ref())?;
        let final_guard = computation.final_guard(&behavior)?;

        let rewrite = if self.config.merge_non_atomic {
            info!("Merging non-atomic actions of net '{}'", net.name());
            let outcome = self.rewriter.rewrite(net, &mut binding.regions)?;
            for t in outcome.derived_guards.keys() {
                binding.events.remove(t);
            }
            warnings.extend(outcome.warnings.iter().cloned());
            Some(outcome)
        } else {
            None
        };

        info!("Computing choice guards of net '{}'", net.name());
        let no_derived_guards = BTreeMap::new();
        let choice_guards = compute_choice_guards(
            system,
            net,
            &binding.events,
            &binding.regions,
            &synthesis,
            rewrite
                .as_ref()
                .map_or(&no_derived_guards, |r| &r.derived_guards),
        );

        if self.config.check_nondeterminism {
            info!("Checking choice guards for non-determinism");
            warnings.extend(nondeterminism::check_net(net, &choice_guards));
        }

        info!(
            "Guard synthesis for '{}' finished with {} warnings",
            system.name(),
            warnings.len()
        );

        Ok(PipelineOutput {
            synthesis,
            behavior,
            edge_guards,
            initial_guard,
            final_guard,
            rewrite,
            choice_guards,
            warnings,
        })
    }
}

/// Error aborting a [`GuardSynthesisPipeline`] run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Supervisor synthesis failed
    Synthesis(SynthesisError),
    /// A computed guard failed its checks
    Guard(GuardComputationError),
    /// The net violates the structure of non-atomic actions
    Rewrite(RewriteError),
}

impl std::error::Error for PipelineError {}

impl Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Synthesis(err) => write!(f, "Synthesis failed: {err}"),
            PipelineError::Guard(err) => write!(f, "Guard computation failed: {err}"),
            PipelineError::Rewrite(err) => write!(f, "Malformed non-atomic action: {err}"),
        }
    }
}

impl From<SynthesisError> for PipelineError {
    fn from(err: SynthesisError) -> Self {
        PipelineError::Synthesis(err)
    }
}

impl From<GuardComputationError> for PipelineError {
    fn from(err: GuardComputationError) -> Self {
        PipelineError::Guard(err)
    }
}

impl From<RewriteError> for PipelineError {
    fn from(err: RewriteError) -> Self {
        PipelineError::Rewrite(err)
    }
}
