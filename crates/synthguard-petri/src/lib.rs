//! Structural representation of activities as Petri nets
//!
//! Places and transitions are stored in an arena and addressed by
//! [`PlaceId`] and [`TransitionId`]. Arcs are kept as index lists on both
//! endpoints, so the net can be traversed in both directions without
//! reference cycles.
//!
//! The crate further contains the [`region::StateRegionMap`], which maps
//! places to the system states they correspond to, and the
//! [`non_atomic::NonAtomicRewriter`] merging the end transitions of
//! non-atomic actions.

use std::{
    collections::{BTreeSet, VecDeque},
    fmt::{self, Display},
};

pub mod non_atomic;
pub mod region;

/// Index of a place in a [`PetriNet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(usize);

/// Index of a transition in a [`PetriNet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(usize);

/// Place of a [`PetriNet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    name: String,
    /// Transitions with an arc into this place
    incoming: Vec<TransitionId>,
    /// Transitions with an arc from this place
    outgoing: Vec<TransitionId>,
}

impl Place {
    /// Name of the place
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transitions with an arc into the place
    pub fn incoming(&self) -> &[TransitionId] {
        &self.incoming
    }

    /// Transitions with an arc out of the place
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    /// Whether the place is a choice, i.e., has more than one outgoing
    /// transition
    pub fn is_choice(&self) -> bool {
        self.outgoing.len() > 1
    }
}

/// Transition of a [`PetriNet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    name: String,
    /// Places with an arc into this transition
    incoming: Vec<PlaceId>,
    /// Places with an arc from this transition
    outgoing: Vec<PlaceId>,
}

impl Transition {
    /// Name (label) of the transition
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Places with an arc into the transition
    pub fn incoming(&self) -> &[PlaceId] {
        &self.incoming
    }

    /// Places with an arc out of the transition
    pub fn outgoing(&self) -> &[PlaceId] {
        &self.outgoing
    }
}

/// Petri net with labeled transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetriNet {
    name: String,
    places: Vec<Place>,
    transitions: Vec<Transition>,
}

impl PetriNet {
    /// Name of the net
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterator over the places and their ids
    pub fn places(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places.iter().enumerate().map(|(i, p)| (PlaceId(i), p))
    }

    /// Iterator over the transitions and their ids
    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .map(|(i, t)| (TransitionId(i), t))
    }

    /// Place with id `id`
    pub fn place(&self, id: PlaceId) -> Option<&Place> {
        self.places.get(id.0)
    }

    /// Transition with id `id`
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.0)
    }

    /// Id of the place named `name`
    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.places.iter().position(|p| p.name == name).map(PlaceId)
    }

    /// Id of the transition named `name`
    pub fn transition_by_name(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter()
            .position(|t| t.name == name)
            .map(TransitionId)
    }

    /// Name of the place with id `id`, or a placeholder for unknown ids
    pub fn place_name(&self, id: PlaceId) -> &str {
        self.place(id).map_or("<unknown place>", Place::name)
    }

    /// Name of the transition with id `id`, or a placeholder for unknown ids
    pub fn transition_name(&self, id: TransitionId) -> &str {
        self.transition(id)
            .map_or("<unknown transition>", Transition::name)
    }

    /// Places with more than one outgoing transition
    pub fn choice_places(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places().filter(|(_, p)| p.is_choice())
    }

    /// All places reachable from `from` by firing at least one transition
    ///
    /// Tokens are not taken into account: a place is reachable if there is a
    /// path of arcs to it. The result is sorted by id. `from` is only
    /// contained if it lies on a cycle.
    pub fn reachable_places(&self, from: PlaceId) -> Vec<PlaceId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([from]);

        while let Some(place) = queue.pop_front() {
            let Some(place) = self.place(place) else {
                continue;
            };
            for t in &place.outgoing {
                for succ in &self.transitions[t.0].outgoing {
                    if visited.insert(*succ) {
                        queue.push_back(*succ);
                    }
                }
            }
        }

        visited.into_iter().collect()
    }

    /// Relabel the transition `id`
    pub(crate) fn rename_transition(&mut self, id: TransitionId, name: String) {
        if let Some(t) = self.transitions.get_mut(id.0) {
            t.name = name;
        }
    }
}

impl Display for PetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "net {} {{", self.name)?;
        for t in &self.transitions {
            let pre: Vec<_> = t.incoming.iter().map(|p| self.place_name(*p)).collect();
            let post: Vec<_> = t.outgoing.iter().map(|p| self.place_name(*p)).collect();
            writeln!(
                f,
                "  {{{}}} -- {} --> {{{}}}",
                pre.join(", "),
                t.name,
                post.join(", ")
            )?;
        }
        write!(f, "}}")
    }
}

/// Builder for a [`PetriNet`]
///
/// ```
/// use synthguard_petri::PetriNetBuilder;
///
/// let net = PetriNetBuilder::new("activity")
///     .with_places(["p0", "p1"]).unwrap()
///     .with_transition("a").unwrap()
///     .with_arc_to_transition("p0", "a").unwrap()
///     .with_arc_to_place("a", "p1").unwrap()
///     .build();
///
/// let p0 = net.place_by_name("p0").unwrap();
/// assert_eq!(net.reachable_places(p0), vec![net.place_by_name("p1").unwrap()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetriNetBuilder {
    net: PetriNet,
}

impl PetriNetBuilder {
    /// Create a builder for an empty net
    pub fn new(name: impl ToString) -> Self {
        PetriNetBuilder {
            net: PetriNet {
                name: name.to_string(),
                places: Vec::new(),
                transitions: Vec::new(),
            },
        }
    }

    /// Add a place
    pub fn with_place(mut self, name: impl ToString) -> Result<Self, NetError> {
        let name = name.to_string();
        if self.net.place_by_name(&name).is_some() {
            return Err(NetError::DuplicatePlace(name));
        }
        if self.net.transition_by_name(&name).is_some() {
            return Err(NetError::NameClash(name));
        }

        self.net.places.push(Place {
            name,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        Ok(self)
    }

    /// Add multiple places
    pub fn with_places<S: ToString>(
        self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self, NetError> {
        let mut res = self;
        for name in names {
            res = res.with_place(name)?;
        }
        Ok(res)
    }

    /// Add a transition
    pub fn with_transition(mut self, name: impl ToString) -> Result<Self, NetError> {
        let name = name.to_string();
        if self.net.transition_by_name(&name).is_some() {
            return Err(NetError::DuplicateTransition(name));
        }
        if self.net.place_by_name(&name).is_some() {
            return Err(NetError::NameClash(name));
        }

        self.net.transitions.push(Transition {
            name,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        Ok(self)
    }

    /// Add multiple transitions
    pub fn with_transitions<S: ToString>(
        self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self, NetError> {
        let mut res = self;
        for name in names {
            res = res.with_transition(name)?;
        }
        Ok(res)
    }

    fn lookup(&self, place: &str, transition: &str) -> Result<(PlaceId, TransitionId), NetError> {
        let p = self
            .net
            .place_by_name(place)
            .ok_or_else(|| NetError::UnknownPlace(place.to_string()))?;
        let t = self
            .net
            .transition_by_name(transition)
            .ok_or_else(|| NetError::UnknownTransition(transition.to_string()))?;
        Ok((p, t))
    }

    /// Add an arc from place `place` to transition `transition`
    pub fn with_arc_to_transition(
        mut self,
        place: &str,
        transition: &str,
    ) -> Result<Self, NetError> {
        let (p, t) = self.lookup(place, transition)?;
        if self.net.places[p.0].outgoing.contains(&t) {
            return Err(NetError::DuplicateArc(
                place.to_string(),
                transition.to_string(),
            ));
        }

        self.net.places[p.0].outgoing.push(t);
        self.net.transitions[t.0].incoming.push(p);
        Ok(self)
    }

    /// Add an arc from transition `transition` to place `place`
    pub fn with_arc_to_place(mut self, transition: &str, place: &str) -> Result<Self, NetError> {
        let (p, t) = self.lookup(place, transition)?;
        if self.net.transitions[t.0].outgoing.contains(&p) {
            return Err(NetError::DuplicateArc(
                transition.to_string(),
                place.to_string(),
            ));
        }

        self.net.transitions[t.0].outgoing.push(p);
        self.net.places[p.0].incoming.push(t);
        Ok(self)
    }

    /// Complete the construction of the net
    pub fn build(self) -> PetriNet {
        self.net
    }
}

/// Errors that can occur during the construction of a Petri net
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// A place with the same name was added multiple times
    DuplicatePlace(String),
    /// A transition with the same name was added multiple times
    DuplicateTransition(String),
    /// A place and a transition share a name
    NameClash(String),
    /// An arc refers to an unknown place
    UnknownPlace(String),
    /// An arc refers to an unknown transition
    UnknownTransition(String),
    /// The same arc was added twice
    DuplicateArc(String, String),
}

impl std::error::Error for NetError {}

impl Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::DuplicatePlace(p) => write!(f, "Duplicate place: {p}"),
            NetError::DuplicateTransition(t) => write!(f, "Duplicate transition: {t}"),
            NetError::NameClash(name) => write!(f, "Name {name} already taken"),
            NetError::UnknownPlace(p) => write!(f, "Unknown place: {p}"),
            NetError::UnknownTransition(t) => write!(f, "Unknown transition: {t}"),
            NetError::DuplicateArc(from, to) => {
                write!(f, "Duplicate arc from {from} to {to}")
            }
        }
    }
}
