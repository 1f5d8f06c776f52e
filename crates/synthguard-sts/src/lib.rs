//! Symbolic transition systems over BDD predicates
//!
//! A [`SymbolicTransitionSystem`] consists of finite-domain variables, a set
//! of events that are either controllable or uncontrollable, and symbolic
//! edges. Every edge belongs to one event and carries a guard over the
//! current state, an update relation over current and next state, and
//! optionally a predicate of states in which taking the edge would be a
//! runtime error.
//!
//! All predicates are [`BDD`]s created by one shared [`BDDManager`]. Systems
//! are constructed with the [`builder::SymbolicTransitionSystemBuilder`],
//! explored with the functions of the [`reachability`] module, and
//! temporarily modified through the RAII guards of the [`scope`] module.

use std::fmt::{self, Display};

use synthguard_bdd::{BDD, Bdd};

pub mod builder;
pub mod reachability;
pub mod scope;
mod var_manager;

pub use var_manager::{BddVarManager, VarManagerError};

/// Index of a variable in a [`SymbolicTransitionSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub(crate) usize);

/// Index of an event in a [`SymbolicTransitionSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) usize);

/// Index of an edge in a [`SymbolicTransitionSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge{}", self.0)
    }
}

/// Domain of a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    /// Boolean variable
    Bool,
    /// Integer variable ranging over `lower..=upper`
    Int {
        /// Smallest value
        lower: i64,
        /// Largest value
        upper: i64,
    },
    /// Location pointer of an automaton, ranging over the named locations
    Location {
        /// Names of the locations, in encoding order
        locations: Vec<String>,
    },
}

/// Value a variable can hold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Name of a location
    Location(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Location(loc) => write!(f, "{loc}"),
        }
    }
}

/// Variable of a symbolic transition system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    kind: VariableKind,
    /// Internal variables are introduced by the encoding of a model and must
    /// not occur in guards handed back to the model
    internal: bool,
}

impl Variable {
    /// Create a new boolean variable
    pub fn new_bool(name: impl Into<String>) -> Self {
        Self::new(name, VariableKind::Bool)
    }

    /// Create a new integer variable ranging over `lower..=upper`
    pub fn new_int(name: impl Into<String>, lower: i64, upper: i64) -> Self {
        Self::new(name, VariableKind::Int { lower, upper })
    }

    /// Create a new location pointer over the given location names
    pub fn new_location<S: Into<String>>(
        name: impl Into<String>,
        locations: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            VariableKind::Location {
                locations: locations.into_iter().map(Into::into).collect(),
            },
        )
    }

    fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Variable {
            name: name.into(),
            kind,
            internal: false,
        }
    }

    /// Mark the variable as internal
    pub fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Name of the variable
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain of the variable
    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    /// Whether the variable is internal to the encoding
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// Number of values of the variable
    ///
    /// Returns 0 for an empty domain. The builder rejects such variables.
    pub fn domain_size(&self) -> u64 {
        match &self.kind {
            VariableKind::Bool => 2,
            VariableKind::Int { lower, upper } => {
                if lower > upper {
                    0
                } else {
                    upper.abs_diff(*lower) + 1
                }
            }
            VariableKind::Location { locations } => locations.len() as u64,
        }
    }

    /// Encoding index of `value`, or `None` if the variable can not hold it
    pub fn value_index(&self, value: &Value) -> Option<u64> {
        match (&self.kind, value) {
            (VariableKind::Bool, Value::Bool(b)) => Some(u64::from(*b)),
            (VariableKind::Int { lower, upper }, Value::Int(i)) => {
                (lower <= i && i <= upper).then(|| i.abs_diff(*lower))
            }
            (VariableKind::Location { locations }, Value::Location(loc)) => locations
                .iter()
                .position(|l| l == loc)
                .map(|pos| pos as u64),
            _ => None,
        }
    }

    /// Value with encoding index `index`
    pub fn value_at(&self, index: u64) -> Option<Value> {
        if index >= self.domain_size() {
            return None;
        }
        match &self.kind {
            VariableKind::Bool => Some(Value::Bool(index == 1)),
            VariableKind::Int { lower, .. } => {
                i64::try_from(index).ok().map(|i| Value::Int(lower + i))
            }
            VariableKind::Location { locations } => usize::try_from(index)
                .ok()
                .and_then(|i| locations.get(i))
                .map(|loc| Value::Location(loc.clone())),
        }
    }

    /// Iterator over all values of the variable, in encoding order
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.domain_size()).filter_map(|index| self.value_at(index))
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Event of a symbolic transition system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    name: String,
    controllable: bool,
}

impl Event {
    /// Create a new controllable event
    pub fn controllable(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            controllable: true,
        }
    }

    /// Create a new uncontrollable event
    pub fn uncontrollable(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            controllable: false,
        }
    }

    /// Name of the event
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a supervisor may disable the event
    pub fn is_controllable(&self) -> bool {
        self.controllable
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Symbolic edge of a transition system
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    event: EventId,
    /// Predicate over the current state
    guard: BDD,
    /// Relation over current and next state
    update: BDD,
    /// States in which the update is undefined
    error: Option<BDD>,
}

impl Edge {
    /// Create a new edge
    pub fn new(event: EventId, guard: BDD, update: BDD, error: Option<BDD>) -> Self {
        Edge {
            event,
            guard,
            update,
            error,
        }
    }

    /// Event the edge belongs to
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Guard of the edge
    pub fn guard(&self) -> &BDD {
        &self.guard
    }

    /// Update relation of the edge
    pub fn update(&self) -> &BDD {
        &self.update
    }

    /// Runtime error predicate of the edge, if the update can fail
    pub fn error(&self) -> Option<&BDD> {
        self.error.as_ref()
    }

    /// Replace the guard, returning the previous one
    pub(crate) fn replace_guard(&mut self, guard: BDD) -> BDD {
        std::mem::replace(&mut self.guard, guard)
    }
}

/// Symbolic transition system
#[derive(Debug, Clone)]
pub struct SymbolicTransitionSystem {
    /// Name of the system
    name: String,
    /// BDD variables of the system
    vars: BddVarManager,
    /// Variables of the system, indexed by [`VariableId`]
    variables: Vec<Variable>,
    /// Events of the system, indexed by [`EventId`]
    events: Vec<Event>,
    /// Edges of the system, indexed by [`EdgeId`]
    edges: Vec<Edge>,
    /// Initial states
    initial: BDD,
    /// Marked states
    marked: BDD,
    /// State requirement a supervisor has to enforce
    requirement: BDD,
}

impl SymbolicTransitionSystem {
    /// Name of the system
    pub fn name(&self) -> &str {
        &self.name
    }

    /// BDD variable manager of the system
    pub fn var_manager(&self) -> &BddVarManager {
        &self.vars
    }

    /// Constant true predicate
    pub fn bdd_true(&self) -> BDD {
        self.vars.get_bdd_true()
    }

    /// Constant false predicate
    pub fn bdd_false(&self) -> BDD {
        self.vars.get_bdd_false()
    }

    /// States in which every variable holds a value of its domain
    pub fn domain(&self) -> &BDD {
        self.vars.domain()
    }

    /// Iterator over the variables and their ids
    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId(i), v))
    }

    /// Variable with id `id`
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    /// Id of the variable named `name`
    pub fn variable_by_name(&self, name: &str) -> Option<VariableId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VariableId)
    }

    /// Ids of all internal variables
    pub fn internal_variables(&self) -> Vec<VariableId> {
        self.variables()
            .filter(|(_, v)| v.is_internal())
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterator over the events and their ids
    pub fn events(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    /// Event with id `id`
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.0)
    }

    /// Id of the event named `name`
    pub fn event_by_name(&self, name: &str) -> Option<EventId> {
        self.events
            .iter()
            .position(|e| e.name == name)
            .map(EventId)
    }

    /// Whether the event with id `id` is controllable
    ///
    /// Unknown events are treated as uncontrollable.
    pub fn is_controllable(&self, id: EventId) -> bool {
        self.event(id).is_some_and(Event::is_controllable)
    }

    /// Iterator over the edges and their ids
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().map(|(i, e)| (EdgeId(i), e))
    }

    /// Edge with id `id`
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// Iterator over the edges of event `event`
    pub fn edges_of_event(&self, event: EventId) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges().filter(move |(_, e)| e.event == event)
    }

    /// Initial states
    pub fn initial(&self) -> &BDD {
        &self.initial
    }

    /// Marked states
    pub fn marked(&self) -> &BDD {
        &self.marked
    }

    /// State requirement
    pub fn requirement(&self) -> &BDD {
        &self.requirement
    }

    /// Replace the initial states of the system
    pub fn set_initial(&mut self, initial: BDD) {
        self.initial = initial;
    }

    /// Replace the marked states of the system
    pub fn set_marked(&mut self, marked: BDD) {
        self.marked = marked;
    }

    /// Replace the state requirement of the system
    pub fn set_requirement(&mut self, requirement: BDD) {
        self.requirement = requirement;
    }

    /// Replace the guard of edge `id`, returning the previous guard
    ///
    /// Returns `None` and leaves the system unchanged if the edge does not
    /// exist.
    pub fn set_guard(&mut self, id: EdgeId, guard: BDD) -> Option<BDD> {
        self.edges
            .get_mut(id.0)
            .map(|edge| edge.replace_guard(guard))
    }

    /// Predicate stating that variable `var` holds `value`
    pub fn var_eq(&self, var: VariableId, value: &Value) -> Result<BDD, VarManagerError> {
        let variable = self
            .variable(var)
            .ok_or(VarManagerError::UnknownVariable(var))?;
        let index = variable.value_index(value).ok_or_else(|| {
            VarManagerError::ValueOutOfDomain(variable.name.clone(), value.clone())
        })?;

        self.vars.get_value_bdd(var, index)
    }

    /// Predicate stating that the integer variable `var` holds a value
    /// satisfying `pred`
    ///
    /// For a non-integer variable the predicate is evaluated on nothing and
    /// the result is false.
    pub fn int_where(
        &self,
        var: VariableId,
        pred: impl Fn(i64) -> bool,
    ) -> Result<BDD, VarManagerError> {
        let variable = self
            .variable(var)
            .ok_or(VarManagerError::UnknownVariable(var))?;

        let mut result = self.bdd_false();
        for (index, value) in variable.values().enumerate() {
            if let Value::Int(i) = value {
                if pred(i) {
                    result = result.or(&self.vars.get_value_bdd(var, index as u64)?);
                }
            }
        }
        Ok(result)
    }

    /// Existentially quantify the variables `vars` in `pred`
    pub fn exists_variables(
        &self,
        pred: &BDD,
        vars: &[VariableId],
    ) -> Result<BDD, VarManagerError> {
        self.vars.exists_variables(pred, vars)
    }

    /// Existentially quantify all internal variables in `pred`
    pub fn exists_internal(&self, pred: &BDD) -> BDD {
        let internal = self.internal_variables();
        // ids come from the system itself
        self.vars
            .exists_variables(pred, &internal)
            .unwrap_or_else(|_| pred.clone())
    }

    /// Simplify `pred` relative to the care predicate `care` over all state
    /// variables of the system
    pub fn restrict(&self, pred: &BDD, care: &BDD) -> BDD {
        pred.restrict(care, self.vars.unprimed_vars())
    }

    /// Compute the states reached from `pred` by taking `edge`, restricted to
    /// `restriction`
    ///
    /// `∃cur (pred ∧ guard ∧ update)` with next renamed to current.
    pub fn apply_forward(&self, edge: &Edge, pred: &BDD, restriction: Option<&BDD>) -> BDD {
        // intersect states with the enabled part of the edge
        let mut succ = pred.and(&edge.guard).and(&edge.update);
        // abstract unprimed variables
        succ = self.vars.exists_unprimed(&succ);
        // unprime all bdd variables in `succ`
        succ = self.vars.swap_unprimed_primed_bdd_vars(&succ);
        succ = succ.and(self.vars.domain());

        match restriction {
            Some(r) => succ.and(r),
            None => succ,
        }
    }

    /// Compute the states from which taking `edge` reaches `pred`, restricted
    /// to `restriction`
    ///
    /// `∃next (pred' ∧ update) ∧ guard` where `pred'` is `pred` over the next
    /// state.
    pub fn apply_backward(&self, edge: &Edge, pred: &BDD, restriction: Option<&BDD>) -> BDD {
        let primed = self.vars.swap_unprimed_primed_bdd_vars(pred);
        let mut pre = self.vars.exists_primed(&primed.and(&edge.update));
        pre = pre.and(&edge.guard);

        match restriction {
            Some(r) => pre.and(r),
            None => pre,
        }
    }

    /// Compute the states from which taking the update of `edge`, ignoring
    /// its guard, reaches `pred`
    pub fn pre_update(&self, edge: &Edge, pred: &BDD) -> BDD {
        let primed = self.vars.swap_unprimed_primed_bdd_vars(pred);
        self.vars.exists_primed(&primed.and(&edge.update))
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }
}
