//! Factory methods for building a valid [`SymbolicTransitionSystem`]
//!
//! The builder has two stages: In the first stage, variables and events are
//! declared. This stage is completed by calling
//! [`SymbolicTransitionSystemBuilder::initialize`], which allocates the BDD
//! variables and transforms the builder into an
//! [`InitializedSymbolicTransitionSystemBuilder`].
//!
//! In the second stage, edges, initial and marked state constraints and the
//! state requirement are added. Predicates for these can be obtained from the
//! initialized builder by variable name. The system is then constructed by
//! calling [`InitializedSymbolicTransitionSystemBuilder::build`].
//!
//! # Example
//!
//! ```
//! use synthguard_bdd::BDDManager;
//! use synthguard_sts::{Event, Value, Variable};
//! use synthguard_sts::builder::{EdgeBuilder, SymbolicTransitionSystemBuilder};
//!
//! let builder = SymbolicTransitionSystemBuilder::new("machine")
//!     .with_variable(Variable::new_location("m", ["idle", "busy"])).unwrap()
//!     .with_events([Event::controllable("start"), Event::uncontrollable("done")]).unwrap()
//!     .initialize(BDDManager::default());
//!
//! let idle = builder.var_eq("m", Value::Location("idle".into())).unwrap();
//! let busy = builder.var_eq("m", Value::Location("busy".into())).unwrap();
//!
//! let sts = builder
//!     .with_edge(
//!         EdgeBuilder::new("start")
//!             .with_guard(idle.clone())
//!             .with_assignment("m", Value::Location("busy".into())),
//!     ).unwrap()
//!     .with_edge(
//!         EdgeBuilder::new("done")
//!             .with_guard(busy)
//!             .with_assignment("m", Value::Location("idle".into())),
//!     ).unwrap()
//!     .with_initial_constraint(idle.clone())
//!     .with_marked_constraint(idle)
//!     .build();
//!
//! assert_eq!(sts.edges().count(), 2);
//! ```

use std::fmt::Display;

use synthguard_bdd::{BDD, BDDManager, Bdd};

use crate::{
    BddVarManager, Edge, Event, SymbolicTransitionSystem, Value, VarManagerError, Variable,
    VariableId, VariableKind,
};

/// Builder for constructing a [`SymbolicTransitionSystem`]
///
/// First stage: declare variables and events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicTransitionSystemBuilder {
    name: String,
    variables: Vec<Variable>,
    events: Vec<Event>,
}

impl SymbolicTransitionSystemBuilder {
    /// Create a new builder for a system named `name`
    pub fn new(name: impl ToString) -> Self {
        SymbolicTransitionSystemBuilder {
            name: name.to_string(),
            variables: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Checks whether a name is already taken by a variable or an event
    fn check_for_name_clash(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name() == name)
            || self.events.iter().any(|e| e.name() == name)
    }

    /// Adds a variable to the system
    ///
    /// Returns an error if a variable with the same name exists, an event has
    /// the same name, or the domain of the variable is empty.
    pub fn with_variable(mut self, var: Variable) -> Result<Self, BuilderError> {
        if self.variables.iter().any(|v| v.name() == var.name()) {
            return Err(BuilderError::DuplicateVariable(var.name().to_string()));
        }

        if self.check_for_name_clash(var.name()) {
            return Err(BuilderError::NameClash(var.name().to_string()));
        }

        if var.domain_size() == 0 {
            return Err(BuilderError::EmptyDomain(var.name().to_string()));
        }

        self.variables.push(var);
        Ok(self)
    }

    /// Adds multiple variables to the system
    pub fn with_variables(
        self,
        vars: impl IntoIterator<Item = Variable>,
    ) -> Result<Self, BuilderError> {
        let mut res = self;
        for var in vars {
            res = res.with_variable(var)?;
        }
        Ok(res)
    }

    /// Adds an event to the system
    ///
    /// Returns an error if an event with the same name exists or a variable
    /// has the same name.
    pub fn with_event(mut self, event: Event) -> Result<Self, BuilderError> {
        if self.events.iter().any(|e| e.name() == event.name()) {
            return Err(BuilderError::DuplicateEvent(event.name().to_string()));
        }

        if self.check_for_name_clash(event.name()) {
            return Err(BuilderError::NameClash(event.name().to_string()));
        }

        self.events.push(event);
        Ok(self)
    }

    /// Adds multiple events to the system
    pub fn with_events(
        self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<Self, BuilderError> {
        let mut res = self;
        for event in events {
            res = res.with_event(event)?;
        }
        Ok(res)
    }

    /// Complete the declaration stage and allocate the BDD variables in `mgr`
    pub fn initialize(self, mgr: BDDManager) -> InitializedSymbolicTransitionSystemBuilder {
        let vars = BddVarManager::new(mgr, &self.variables);
        let domain = vars.domain().clone();

        InitializedSymbolicTransitionSystemBuilder {
            sts: SymbolicTransitionSystem {
                name: self.name,
                requirement: vars.get_bdd_true(),
                initial: domain.clone(),
                marked: domain,
                vars,
                variables: self.variables,
                events: self.events,
                edges: Vec::new(),
            },
        }
    }
}

/// Builder for constructing a [`SymbolicTransitionSystem`]
///
/// Second stage: add edges, initial and marked constraints and requirements.
/// Initial and marked states default to all states, the requirement defaults
/// to true. Every added constraint is conjoined with the current one.
#[derive(Debug, Clone)]
pub struct InitializedSymbolicTransitionSystemBuilder {
    sts: SymbolicTransitionSystem,
}

impl InitializedSymbolicTransitionSystemBuilder {
    fn lookup_variable(&self, name: &str) -> Result<VariableId, BuilderError> {
        self.sts
            .variable_by_name(name)
            .ok_or_else(|| BuilderError::UnknownComponent(name.to_string()))
    }

    /// Constant true predicate
    pub fn bdd_true(&self) -> BDD {
        self.sts.bdd_true()
    }

    /// Constant false predicate
    pub fn bdd_false(&self) -> BDD {
        self.sts.bdd_false()
    }

    /// Predicate stating that the variable `name` holds `value`
    pub fn var_eq(&self, name: &str, value: Value) -> Result<BDD, BuilderError> {
        let var = self.lookup_variable(name)?;
        Ok(self.sts.var_eq(var, &value)?)
    }

    /// Predicate stating that the integer variable `name` holds a value
    /// satisfying `pred`
    pub fn int_where(&self, name: &str, pred: impl Fn(i64) -> bool) -> Result<BDD, BuilderError> {
        let var = self.lookup_variable(name)?;
        Ok(self.sts.int_where(var, pred)?)
    }

    /// Whether a variable with name `name` was declared
    pub fn has_variable(&self, name: &str) -> bool {
        self.sts.variable_by_name(name).is_some()
    }

    /// Whether an event with name `name` was declared
    pub fn has_event(&self, name: &str) -> bool {
        self.sts.event_by_name(name).is_some()
    }

    /// Add an edge to the system
    ///
    /// Returns an error if the event of the edge is unknown, an assignment
    /// refers to an unknown variable, assigns a value outside of the domain of
    /// the variable, or the same variable is assigned twice.
    pub fn with_edge(mut self, edge: EdgeBuilder) -> Result<Self, BuilderError> {
        let edge = self.build_edge(edge)?;
        self.sts.edges.push(edge);
        Ok(self)
    }

    /// Add multiple edges to the system
    pub fn with_edges(
        self,
        edges: impl IntoIterator<Item = EdgeBuilder>,
    ) -> Result<Self, BuilderError> {
        let mut res = self;
        for edge in edges {
            res = res.with_edge(edge)?;
        }
        Ok(res)
    }

    /// Restrict the initial states to `constraint`
    pub fn with_initial_constraint(mut self, constraint: BDD) -> Self {
        self.sts.initial = self.sts.initial.and(&constraint);
        self
    }

    /// Restrict the marked states to `constraint`
    pub fn with_marked_constraint(mut self, constraint: BDD) -> Self {
        self.sts.marked = self.sts.marked.and(&constraint);
        self
    }

    /// Add a state requirement a supervisor has to enforce
    pub fn with_requirement(mut self, requirement: BDD) -> Self {
        self.sts.requirement = self.sts.requirement.and(&requirement);
        self
    }

    /// Complete the construction of the system
    pub fn build(self) -> SymbolicTransitionSystem {
        self.sts
    }

    /// Encodes an edge
    ///
    /// 1. resolve the event
    /// 2. encode every assignment and collect runtime error states
    /// 3. conjoin the explicit update relation
    /// 4. keep every variable not assigned unchanged
    fn build_edge(&self, edge: EdgeBuilder) -> Result<Edge, BuilderError> {
        // 1. resolve the event
        let event = self
            .sts
            .event_by_name(&edge.event)
            .ok_or_else(|| BuilderError::UnknownEvent(edge.event.clone()))?;

        let mut assigned: Vec<VariableId> = Vec::new();
        let mut update = self.bdd_true();
        let mut error = self.bdd_false();

        // 2. encode every assignment
        for (name, assignment) in &edge.assignments {
            let var = self.lookup_variable(name)?;
            if assigned.contains(&var) {
                return Err(BuilderError::DuplicateAssignment {
                    event: edge.event.clone(),
                    variable: name.clone(),
                });
            }
            assigned.push(var);

            match assignment {
                Assignment::Constant(value) => {
                    update = update.and(&self.encode_constant(var, value)?);
                }
                Assignment::Offset(offset) => {
                    let (relation, overflow) = self.encode_offset(var, *offset)?;
                    update = update.and(&relation);
                    error = error.or(&overflow);
                }
            }
        }

        // 3. conjoin the explicit update relation
        if let Some((relation, names)) = &edge.relation {
            for name in names {
                let var = self.lookup_variable(name)?;
                if assigned.contains(&var) {
                    return Err(BuilderError::DuplicateAssignment {
                        event: edge.event.clone(),
                        variable: name.clone(),
                    });
                }
                assigned.push(var);
            }
            update = update.and(relation);
        }

        // 4. keep every variable not assigned unchanged
        for (var, _) in self.sts.variables() {
            if !assigned.contains(&var) {
                update = update.and(&self.sts.vars.get_unchanged_bdd(var)?);
            }
        }

        let guard = edge.guard.unwrap_or_else(|| self.bdd_true());
        let error = error.satisfiable().then_some(error);

        Ok(Edge::new(event, guard, update, error))
    }

    /// Encodes the assignment of constant `value` to `var`
    fn encode_constant(&self, var: VariableId, value: &Value) -> Result<BDD, BuilderError> {
        let variable = &self.sts.variables[var.0];
        let index = variable.value_index(value).ok_or_else(|| {
            BuilderError::ValueOutOfDomain(variable.name().to_string(), value.clone())
        })?;

        Ok(self.sts.vars.get_primed_value_bdd(var, index)?)
    }

    /// Encodes `var := var + offset`
    ///
    /// Returns the update relation and the states in which the new value
    /// would leave the domain of `var`.
    fn encode_offset(&self, var: VariableId, offset: i64) -> Result<(BDD, BDD), BuilderError> {
        let variable = &self.sts.variables[var.0];
        if !matches!(variable.kind(), VariableKind::Int { .. }) {
            return Err(BuilderError::MalformedAssignment(
                variable.name().to_string(),
                "offsets can only be assigned to integer variables".into(),
            ));
        }

        let mut relation = self.bdd_false();
        let mut overflow = self.bdd_false();

        for (index, value) in variable.values().enumerate() {
            let cur = self.sts.vars.get_value_bdd(var, index as u64)?;

            let target = match value {
                Value::Int(i) => i.checked_add(offset).map(Value::Int),
                _ => None,
            };

            match target.and_then(|t| variable.value_index(&t)) {
                Some(target_index) => {
                    let next = self.sts.vars.get_primed_value_bdd(var, target_index)?;
                    relation = relation.or(&cur.and(&next));
                }
                None => overflow = overflow.or(&cur),
            }
        }

        Ok((relation, overflow))
    }
}

/// Right hand side of an assignment on an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Assign a constant value
    Constant(Value),
    /// Add a constant to an integer variable
    Offset(i64),
}

/// Builder for an edge of a [`SymbolicTransitionSystem`]
///
/// The edge is validated and encoded when it is added to an
/// [`InitializedSymbolicTransitionSystemBuilder`].
#[derive(Debug, Clone)]
pub struct EdgeBuilder {
    event: String,
    guard: Option<BDD>,
    assignments: Vec<(String, Assignment)>,
    /// Explicit update relation and the names of the variables it constrains
    relation: Option<(BDD, Vec<String>)>,
}

impl EdgeBuilder {
    /// Create a new edge of event `event` with guard true and no assignments
    pub fn new(event: impl ToString) -> Self {
        EdgeBuilder {
            event: event.to_string(),
            guard: None,
            assignments: Vec::new(),
            relation: None,
        }
    }

    /// Add a guard to the edge. Multiple guards are conjoined.
    pub fn with_guard(mut self, guard: BDD) -> Self {
        self.guard = Some(match self.guard {
            Some(g) => g.and(&guard),
            None => guard,
        });
        self
    }

    /// Assign constant `value` to variable `var`
    pub fn with_assignment(mut self, var: impl ToString, value: Value) -> Self {
        self.assignments
            .push((var.to_string(), Assignment::Constant(value)));
        self
    }

    /// Add `offset` to the integer variable `var`
    ///
    /// States in which the result leaves the domain of `var` become the
    /// runtime error states of the edge.
    pub fn with_offset(mut self, var: impl ToString, offset: i64) -> Self {
        self.assignments
            .push((var.to_string(), Assignment::Offset(offset)));
        self
    }

    /// Use an explicit update relation over current and next state for the
    /// variables `vars`
    ///
    /// Every variable not assigned by the relation or an assignment keeps its
    /// value. Next state predicates can be obtained by swapping current state
    /// predicates with [`BddVarManager::swap_unprimed_primed_bdd_vars`].
    pub fn with_update_relation<S: ToString>(
        mut self,
        relation: BDD,
        vars: impl IntoIterator<Item = S>,
    ) -> Self {
        let vars = vars.into_iter().map(|v| v.to_string()).collect();
        self.relation = Some((relation, vars));
        self
    }
}

/// Errors that can occur during the construction of a symbolic transition
/// system
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderError {
    /// A variable with the same name was declared multiple times
    DuplicateVariable(String),
    /// An event with the same name was declared multiple times
    DuplicateEvent(String),
    /// The same name was used for a variable and an event
    NameClash(String),
    /// The domain of a variable is empty
    EmptyDomain(String),
    /// An unknown variable was used
    UnknownComponent(String),
    /// An edge refers to an undeclared event
    UnknownEvent(String),
    /// A variable is assigned a value it can not hold
    ValueOutOfDomain(String, Value),
    /// A variable is assigned twice on the same edge
    DuplicateAssignment {
        /// Event of the edge
        event: String,
        /// Name of the variable
        variable: String,
    },
    /// An assignment is not applicable to the variable
    MalformedAssignment(String, String),
    /// A predicate could not be encoded
    Encoding(VarManagerError),
}

impl From<VarManagerError> for BuilderError {
    fn from(err: VarManagerError) -> Self {
        BuilderError::Encoding(err)
    }
}

impl std::error::Error for BuilderError {}

impl Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::DuplicateVariable(var) => write!(f, "Duplicate variable: {var}"),
            BuilderError::DuplicateEvent(event) => write!(f, "Duplicate event: {event}"),
            BuilderError::NameClash(name) => write!(f, "Name {name} already taken"),
            BuilderError::EmptyDomain(var) => {
                write!(f, "Variable {var} has an empty domain")
            }
            BuilderError::UnknownComponent(c) => write!(f, "Unknown component: {c}"),
            BuilderError::UnknownEvent(event) => write!(f, "Unknown event: {event}"),
            BuilderError::ValueOutOfDomain(var, value) => {
                write!(f, "Value {value} is outside of the domain of variable {var}")
            }
            BuilderError::DuplicateAssignment { event, variable } => write!(
                f,
                "Variable {variable} is assigned multiple times on an edge of event {event}"
            ),
            BuilderError::MalformedAssignment(var, msg) => {
                write!(f, "Malformed assignment to {var}: {msg}")
            }
            BuilderError::Encoding(err) => write!(f, "Failed to encode predicate: {err}"),
        }
    }
}
